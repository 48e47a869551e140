// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! Classic datasource ingestion: `POST /v0/datasources?mode=append`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::record::{to_csv, Record};
use crate::sink::{AppendAck, RecordSink, SinkError};

const ENDPOINT: &str = "/v0/datasources";

/// Additional attempts after a rate-limited response.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wait before retrying when the service does not say how long to back off.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(12);

/// Safety margin added on top of the `Retry-After` value so the retry lands
/// inside the next rate-limit window.
const RETRY_AFTER_MARGIN: Duration = Duration::from_millis(500);

/// Handle to a named Tinybird datasource that rows can be appended to.
///
/// The handle retries rate-limited appends itself (bounded by `max_retries`,
/// honoring the `Retry-After` response header); every other failure surfaces
/// after a single attempt so callers decide what fault tolerance they want.
pub struct Datasource {
    name: String,
    canonical: String,
    url: String,
    token: String,
    delimiter: char,
    max_retries: u32,
    default_retry_after: Duration,
    client: reqwest::Client,
}

impl Datasource {
    pub(crate) fn new(client: reqwest::Client, host: &str, token: &str, name: &str) -> Self {
        Datasource {
            name: name.to_string(),
            canonical: name.to_string(),
            url: format!("{}{}", host.trim_end_matches('/'), ENDPOINT),
            token: token.to_string(),
            delimiter: ',',
            max_retries: DEFAULT_MAX_RETRIES,
            default_retry_after: DEFAULT_RETRY_AFTER,
            client,
        }
    }

    /// Pins the handle to a specific datasource version (`name__v{n}`).
    pub fn with_version(mut self, version: u32) -> Self {
        self.canonical = format!("{}__v{}", self.name, version);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_default_retry_after(mut self, default_retry_after: Duration) -> Self {
        self.default_retry_after = default_retry_after;
        self
    }

    /// The versioned name the service knows this datasource by.
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    /// Appends CSV-encoded rows, waiting out rate-limit responses.
    pub async fn append_csv(&self, records: &[Record]) -> Result<AppendAck, SinkError> {
        let delimiter = self.delimiter.to_string();
        let body = to_csv(records, self.delimiter);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            debug!(
                "appending {} csv records to {} via {}",
                records.len(),
                self.canonical,
                self.url
            );

            let response = self
                .client
                .post(&self.url)
                .query(&[
                    ("name", self.canonical.as_str()),
                    ("mode", "append"),
                    ("format", "csv"),
                    ("dialect_delimiter", delimiter.as_str()),
                ])
                .header(CONTENT_TYPE, "text/html; charset=utf-8")
                .bearer_auth(&self.token)
                .body(body.clone())
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(AppendAck {
                    rows: records.len(),
                    quarantined_rows: 0,
                });
            }

            let wait = retry_after(&response);
            let text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS && attempts <= self.max_retries {
                let wait = wait.unwrap_or(self.default_retry_after);
                debug!(
                    "rate limited by API, keeping {} records safe for {:?}: {}",
                    records.len(),
                    wait,
                    text
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            warn!(
                "unhandled error {} while appending to datasource {}: {}",
                status, self.canonical, text
            );
            return Err(SinkError::api(status, &text));
        }
    }

    /// Appends JSON documents in NDJSON format (`format=ndjson`).
    pub async fn append_ndjson<T: Serialize>(&self, records: &[T]) -> Result<AppendAck, SinkError> {
        let body = ndjson_body(records)?;

        debug!(
            "appending {} ndjson records to {} via {}",
            records.len(),
            self.canonical,
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("name", self.canonical.as_str()),
                ("mode", "append"),
                ("format", "ndjson"),
            ])
            .header(CONTENT_TYPE, "application/x-ndjson; charset=utf-8")
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(AppendAck {
                rows: records.len(),
                quarantined_rows: 0,
            });
        }

        let text = response.text().await.unwrap_or_default();
        Err(SinkError::api(status, &text))
    }
}

#[async_trait]
impl RecordSink for Datasource {
    fn name(&self) -> &str {
        &self.canonical
    }

    async fn append(&self, records: &[Record]) -> Result<AppendAck, SinkError> {
        self.append_csv(records).await
    }
}

/// Encodes documents as newline-delimited JSON.
pub(crate) fn ndjson_body<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let docs = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs.join("\n"))
}

fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    let seconds = value.trim().parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds) + RETRY_AFTER_MARGIN)
}
