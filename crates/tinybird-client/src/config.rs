// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors raised when an appender is constructed with unusable settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Tuning knobs for the queuing appender.
#[derive(Debug, Clone)]
pub struct AppenderConfig {
    /// Maximum number of records per flush.
    pub max_batch_size: usize,
    /// Maximum time from a batch's first record until the batch is flushed
    /// even if it has not filled up.
    pub max_wait: Duration,
    /// Minimum time between the starts of consecutive flush attempts.
    /// Zero disables rate limiting.
    pub min_interval: Duration,
    /// Upper bound on a single dequeue attempt before it is treated as
    /// "no data yet".
    pub dequeue_timeout: Duration,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            max_wait: Duration::from_secs(10),
            min_interval: Duration::from_secs(5),
            dequeue_timeout: Duration::from_millis(250),
        }
    }
}

impl AppenderConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.max_wait.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "max_wait must be greater than zero".to_string(),
            ));
        }

        if self.dequeue_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "dequeue_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
