//! # snapbots-core
//!
//! Synchronous request/reply over NATS for snapbots HTTP services.
//!
//! ```text
//! HTTP request
//!   → authorize            mint request id, consume check on `v1.consumer.consume`
//!       denied → 401, error → 500
//!   → handler              may call JobGateway (`v1.job.*`)
//!   → confirm_transaction  publish `v1.transaction.confirmed {request_id}`
//! ```
//!
//! [`Gateway`] wires all of it to one bus connection:
//!
//! ```rust,no_run
//! use axum::{Router, routing::post};
//! use snapbots_core::{Gateway, GatewayConfig};
//! use snapbots_nats::connect;
//! use snapbots_std::SystemEnv;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env(&SystemEnv)?;
//! let gateway = Gateway::new(connect(config.nats()).await?, &config);
//! let app: Router = gateway.with_metering(Router::new().route("/render", post(|| async { "done" })));
//! # let _ = app;
//! gateway.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod authorizer;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod messages;
pub mod notifier;
pub mod response;
pub mod server;
pub mod signal;
pub mod subjects;
pub mod telemetry;

pub use authorizer::{Authorizer, Verdict, authorize};
pub use config::{BotId, ConfigError, GatewayConfig};
pub use context::{RequestContext, RequestId};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use jobs::{JOB_TIMEOUT, JobGateway};
pub use messages::{AuthDecision, AuthRequest, Job};
pub use notifier::{TransactionNotifier, confirm_transaction};
pub use response::ApiResponse;
