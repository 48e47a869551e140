// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

use crate::datasource::Datasource;
use crate::events::EventsApi;

/// Default API host; regional workspaces pass their own via [`Client::with_host`].
pub const DEFAULT_API_URL: &str = "https://api.tinybird.co";

/// Holds the workspace token and provides factory methods for the ingestion
/// endpoints. All handles created from one client share one HTTP connection
/// pool.
#[derive(Clone)]
pub struct Client {
    host: String,
    token: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_host(token, DEFAULT_API_URL)
    }

    pub fn with_host(token: impl Into<String>, host: impl Into<String>) -> Self {
        Client {
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Handle to a named datasource for CSV/NDJSON appends.
    pub fn datasource(&self, name: &str) -> Datasource {
        Datasource::new(self.http.clone(), &self.host, &self.token, name)
    }

    /// Client for the high-frequency events endpoint.
    pub fn events(&self) -> EventsApi {
        EventsApi::new(self.http.clone(), &self.host, &self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_host() {
        let client = Client::with_host("token", "https://api.example.dev/");
        assert_eq!(client.host, "https://api.example.dev");
    }

    #[test]
    fn default_host_is_tinybird_api() {
        let client = Client::new("token");
        assert_eq!(client.host, DEFAULT_API_URL);
    }
}
