// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! Background worker that drains a queue of records into bounded,
//! rate-limited batches and ships them to a [`RecordSink`].
//!
//! Producers push individual records into an mpsc channel from any task;
//! the appender is the single consumer. A batch is dispatched when it
//! reaches `max_batch_size`, when `max_wait` has elapsed since its first
//! record, or when the appender is stopped with records still buffered.
//! Dispatches never start closer together than `min_interval`.
//!
//! Delivery is best-effort: a batch is handed to the sink exactly once and
//! dropped afterwards. A failed dispatch is logged and the loop keeps
//! running; fault tolerance beyond that belongs to the sink or the caller.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{AppenderConfig, ConfigError};
use crate::record::Record;
use crate::sink::RecordSink;

pub struct QueuingAppender<S> {
    source: mpsc::Receiver<Record>,
    destination: S,
    config: AppenderConfig,
    shutdown: CancellationToken,
}

impl<S: RecordSink> QueuingAppender<S> {
    /// Creates an appender draining `source` into `destination`.
    ///
    /// Fails fast when the configuration is unusable (zero batch size or
    /// zero waits). The `shutdown` token stops the worker cooperatively:
    /// the current partial batch is flushed before [`run`](Self::run)
    /// returns, records still in the channel are not.
    pub fn new(
        source: mpsc::Receiver<Record>,
        destination: S,
        config: AppenderConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(QueuingAppender {
            source,
            destination,
            config,
            shutdown,
        })
    }

    /// Runs the drain loop until the shutdown token fires or every producer
    /// has dropped its sender and the channel is empty.
    pub async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        let mut batch: Vec<Record> = Vec::with_capacity(self.config.max_batch_size);
        // Instant the current batch must be flushed by, set by its first record.
        let mut deadline: Option<Instant> = None;
        let mut last_flush: Option<Instant> = None;
        let mut stopping = false;

        debug!("appender for {} started", self.destination.name());

        loop {
            // Never sleep past the batch deadline.
            let wait = match deadline {
                Some(at) => self
                    .config
                    .dequeue_timeout
                    .min(at.saturating_duration_since(Instant::now())),
                None => self.config.dequeue_timeout,
            };

            tokio::select! {
                _ = shutdown.cancelled() => stopping = true,
                dequeued = timeout(wait, self.source.recv()) => match dequeued {
                    Ok(Some(record)) => {
                        if batch.is_empty() {
                            deadline = Some(Instant::now() + self.config.max_wait);
                        }
                        batch.push(record);
                    }
                    // All producers dropped their senders; the channel is drained.
                    Ok(None) => stopping = true,
                    // No data yet, loop again.
                    Err(_) => {}
                },
            }

            let full = batch.len() >= self.config.max_batch_size;
            let expired = deadline.is_some_and(|at| Instant::now() >= at);

            if !batch.is_empty() && (full || expired || stopping) {
                last_flush = Some(self.flush(&mut batch, last_flush).await);
                deadline = None;
            }

            if stopping {
                break;
            }
        }

        info!(
            "shutting down appender for {}, {} records left in queue",
            self.destination.name(),
            self.source.len()
        );
    }

    /// Waits out the rate limit, dispatches the batch and clears it whatever
    /// the outcome. Returns the instant the flush started.
    async fn flush(&self, batch: &mut Vec<Record>, last_flush: Option<Instant>) -> Instant {
        if let Some(last) = last_flush {
            if !self.config.min_interval.is_zero() {
                sleep_until(last + self.config.min_interval).await;
            }
        }

        let started = Instant::now();
        let size = batch.len();

        match self.destination.append(batch.as_slice()).await {
            Ok(ack) => debug!(
                "appended {} records to {} ({} quarantined)",
                ack.rows,
                self.destination.name(),
                ack.quarantined_rows
            ),
            Err(err) => error!(
                "failed to append batch of {} records to {}, records dropped: {}",
                size,
                self.destination.name(),
                err
            ),
        }

        batch.clear();
        started
    }
}
