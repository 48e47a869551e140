// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! Forwards delimiter-separated rows from stdin to a Tinybird datasource
//! through the queuing appender. One record per input line.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::time::Duration;

use serde_json::Value;
use tinybird_client::appender::QueuingAppender;
use tinybird_client::client::{Client, DEFAULT_API_URL};
use tinybird_client::config::AppenderConfig;
use tinybird_client::record::Record;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const QUEUE_CAPACITY: usize = 4096;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("TB_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(token) = env::var("TB_TOKEN").ok().filter(|val| !val.is_empty()) else {
        error!("TB_TOKEN not set, shutting down");
        return;
    };
    let Some(datasource_name) = env::var("TB_DATASOURCE").ok().filter(|val| !val.is_empty())
    else {
        error!("TB_DATASOURCE not set, shutting down");
        return;
    };

    let host = env::var("TB_HOST").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let delimiter = env::var("TB_DELIMITER")
        .ok()
        .and_then(|val| val.chars().next())
        .unwrap_or(',');
    let datasource_version = env::var("TB_DATASOURCE_VERSION")
        .ok()
        .and_then(|val| val.parse::<u32>().ok());

    let mut appender_config = AppenderConfig::default();
    if let Some(max_batch_size) = env::var("TB_MAX_BATCH_SIZE")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
    {
        appender_config.max_batch_size = max_batch_size;
    }
    if let Some(max_wait_ms) = env::var("TB_MAX_WAIT_MS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
    {
        appender_config.max_wait = Duration::from_millis(max_wait_ms);
    }
    if let Some(min_interval_ms) = env::var("TB_MIN_INTERVAL_MS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
    {
        appender_config.min_interval = Duration::from_millis(min_interval_ms);
    }

    let client = Client::with_host(token, host);
    let mut datasource = client.datasource(&datasource_name).with_delimiter(delimiter);
    if let Some(version) = datasource_version {
        datasource = datasource.with_version(version);
    }

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

    let appender = match QueuingAppender::new(rx, datasource, appender_config, shutdown.clone()) {
        Ok(appender) => appender,
        Err(e) => {
            error!("Error creating appender on forwarder startup: {e}");
            return;
        }
    };
    let worker = tokio::spawn(appender.run());

    info!("forwarding stdin to datasource {datasource_name}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, flushing buffered records");
                interrupted = true;
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    let record: Record = line
                        .split(delimiter)
                        .map(|field| Value::String(field.to_string()))
                        .collect();
                    if tx.send(record).await.is_err() {
                        error!("appender stopped, no longer accepting records");
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, draining queue");
                    break;
                }
                Err(e) => {
                    error!("failed to read stdin: {e}");
                    break;
                }
            },
        }
    }

    // Dropping the sender lets the appender drain the queue; an interrupt
    // additionally cancels so only the buffered partial batch is flushed.
    drop(tx);
    if interrupted {
        shutdown.cancel();
    }

    if let Err(e) = worker.await {
        error!("appender task failed: {e}");
    }
}
