//! # snapbots-nats
//!
//! NATS plumbing shared by snapbots services:
//! - per-operation client traits ([`RequestClient`], [`PublishClient`],
//!   [`FlushClient`]) so components depend only on what they use and tests
//!   can substitute mocks
//! - connection config from the environment and [`connect`] with reconnect
//!   backoff
//! - [`request_with_timeout`] and [`publish`]: JSON over NATS with
//!   OpenTelemetry trace context in the message headers
//! - mock clients for tests (with the `test-support` feature)
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use snapbots_nats::{NatsConfig, connect, request_with_timeout};
//! use snapbots_std::SystemEnv;
//!
//! # #[derive(serde::Serialize)] struct Ping;
//! # #[derive(serde::Deserialize)] struct Pong;
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = connect(&NatsConfig::from_env(&SystemEnv)).await?;
//! let _pong: Pong =
//!     request_with_timeout(&client, "v1.ping", &Ping, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connect;
pub mod error;
pub mod messaging;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use client::{Bus, FlushClient, PublishClient, RequestClient};
pub use config::{NatsAuth, NatsConfig};
pub use connect::{ConnectError, connect};
pub use error::{BusError, BusErrorKind};
pub use messaging::{headers_with_trace_context, inject_trace_context, publish, request_with_timeout};

#[cfg(any(test, feature = "test-support"))]
pub use mocks::{AdvancedMockNatsClient, MockError, MockNatsClient, RecordedMessage};
