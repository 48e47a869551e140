// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! Client library for the Tinybird ingestion API.
//!
//! The library covers two ways of getting rows into a Tinybird datasource:
//! direct calls against the classic CSV append endpoint ([`datasource`]) or
//! the high-frequency NDJSON events endpoint ([`events`]), and a background
//! [`appender`] that continuously drains a producer-fed queue into bounded,
//! rate-limited batches and ships them to any [`sink::RecordSink`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod appender;
pub mod client;
pub mod config;
pub mod datasource;
pub mod events;
pub mod record;
pub mod sink;

pub use appender::QueuingAppender;
pub use client::Client;
pub use config::AppenderConfig;
pub use record::{Record, Records};
pub use sink::{AppendAck, RecordSink, SinkError};
