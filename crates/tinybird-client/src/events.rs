// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! High-frequency ingest: `POST /v0/events` with NDJSON documents.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datasource::ndjson_body;
use crate::sink::SinkError;

const ENDPOINT: &str = "/v0/events";

/// Per-request options for [`EventsApi::send`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Wait until the write is acknowledged by the database. Makes database
    /// errors retryable at the cost of latency; recommended when data loss
    /// avoidance is critical.
    pub wait: bool,
    /// Gzip-compress the request body.
    pub compress: bool,
}

/// Acknowledgement from the events endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub successful_rows: u64,
    #[serde(default)]
    pub quarantined_rows: u64,
}

/// Client for the low-latency events ingestion endpoint.
pub struct EventsApi {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl EventsApi {
    pub(crate) fn new(client: reqwest::Client, host: &str, token: &str) -> Self {
        EventsApi {
            url: format!("{}{}", host.trim_end_matches('/'), ENDPOINT),
            token: token.to_string(),
            client,
        }
    }

    /// Sends JSON documents to the named datasource as NDJSON.
    ///
    /// Returns the per-row acknowledgement, including the number of rows the
    /// service routed to quarantine instead of rejecting the request.
    pub async fn send<T: Serialize>(
        &self,
        name: &str,
        records: &[T],
        options: SendOptions,
    ) -> Result<EventsResponse, SinkError> {
        let data = ndjson_body(records)?;

        let mut query = vec![("name", name)];
        if options.wait {
            query.push(("wait", "true"));
        }

        debug!(
            "sending {} ndjson records to {} via {}",
            records.len(),
            name,
            self.url
        );

        let mut request = self
            .client
            .post(&self.url)
            .query(&query)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .bearer_auth(&self.token);

        request = if options.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data.as_bytes())?;
            request
                .header(CONTENT_ENCODING, "gzip")
                .body(encoder.finish()?)
        } else {
            request.body(data)
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(SinkError::api(status, &text));
        }

        Ok(serde_json::from_str(&text)?)
    }
}
