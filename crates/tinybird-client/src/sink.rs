// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! The seam between the queuing appender and the ingestion transports.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::record::{to_csv, Record};

/// Acknowledgement returned by a sink for one accepted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendAck {
    /// Number of rows the destination accepted.
    pub rows: usize,
    /// Number of rows the service routed to quarantine for review. Zero when
    /// the endpoint does not report quarantine counts.
    pub quarantined_rows: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Builds an [`SinkError::Api`] from a non-2xx response body, preferring
    /// the service's `error` field when the body is JSON.
    pub(crate) fn api(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|doc| doc.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.to_string()
                }
            });

        SinkError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Destination for batches of records.
///
/// Implementations are expected to deliver the batch in order and may retry
/// internally; the appender itself calls [`RecordSink::append`] exactly once
/// per batch and drops the batch afterwards, success or failure.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Destination identity used in logs.
    fn name(&self) -> &str;

    /// Appends the ordered batch to the destination.
    async fn append(&self, records: &[Record]) -> Result<AppendAck, SinkError>;
}

/// Sink that appends CSV rows to a local file. Development aid for inspecting
/// what an appender would ship without a workspace token.
pub struct FileSink {
    path: PathBuf,
    name: String,
    delimiter: char,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        FileSink {
            path,
            name,
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[async_trait]
impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, records: &[Record]) -> Result<AppendAck, SinkError> {
        if records.is_empty() {
            return Ok(AppendAck::default());
        }

        let data = to_csv(records, self.delimiter);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(data.as_bytes()).await?;
        file.flush().await?;

        Ok(AppendAck {
            rows: records.len(),
            quarantined_rows: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_prefers_service_error_field() {
        let err = SinkError::api(
            StatusCode::BAD_REQUEST,
            r#"{"error": "invalid delimiter", "documentation": "https://docs.example"}"#,
        );

        assert_eq!(
            err.to_string(),
            "API error (400): invalid delimiter"
        );
    }

    #[test]
    fn api_error_falls_back_to_body_text() {
        let err = SinkError::api(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn api_error_falls_back_to_status_reason() {
        let err = SinkError::api(StatusCode::FORBIDDEN, "");
        assert_eq!(err.to_string(), "API error (403): Forbidden");
    }

    #[tokio::test]
    async fn file_sink_appends_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("myfile.csv");
        let sink = FileSink::new(&path);

        sink.append(&[
            vec![json!("a"), json!("1"), json!("{}")],
            vec![json!("b"), json!("2"), json!(r#"{"foo":"bar","baz":"ed"}"#)],
        ])
        .await
        .unwrap();

        let ack = sink.append(&[vec![json!("c"), json!("3"), json!("{}")]]).await.unwrap();
        assert_eq!(ack.rows, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "a,1,{}\nb,2,\"{\"\"foo\"\":\"\"bar\"\",\"\"baz\"\":\"\"ed\"\"}\"\nc,3,{}\n"
        );
    }

    #[tokio::test]
    async fn file_sink_ignores_empty_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let sink = FileSink::new(&path);

        let ack = sink.append(&[]).await.unwrap();

        assert_eq!(ack, AppendAck::default());
        assert!(!path.exists());
    }
}
