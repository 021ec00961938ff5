//! snapbots gateway binary.
//!
//! # Environment variables
//!
//! | Variable                   | Default          | Description                              |
//! |----------------------------|------------------|------------------------------------------|
//! | `NATS_URL`                 | `localhost:4222` | NATS server address(es)                  |
//! | `NATS_CREDS` / `NATS_NKEY` / `NATS_USER`+`NATS_PASSWORD` / `NATS_TOKEN` | none | NATS auth |
//! | `SNAPBOTS_BOT_ID`          | required         | Bot identity sent with every consume check |
//! | `SNAPBOTS_AUTH_TIMEOUT_MS` | `3000`           | Consume check timeout                    |
//! | `SNAPBOTS_SUBJECT_PREFIX`  | `v1`             | NATS subject prefix                      |
//! | `SNAPBOTS_PORT`            | `8080`           | TCP port to listen on                    |
//! | `SNAPBOTS_MAX_BODY_BYTES`  | `2097152`        | Largest body accepted by the gate        |
//! | `RUST_LOG`                 | `info`           | Log filter (tracing-subscriber)          |

use snapbots_core::{Gateway, GatewayConfig, server, telemetry};
use snapbots_nats::connect;
use snapbots_std::SystemEnv;

const SERVICE_NAME: &str = "snapbots-gateway";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init(SERVICE_NAME);

    let config = GatewayConfig::from_env(&SystemEnv)?;
    tracing::info!(
        servers = ?config.nats().servers,
        auth = config.nats().auth.description(),
        bot_id = %config.bot_id(),
        subject_prefix = config.subject_prefix(),
        auth_timeout_ms = config.auth_timeout().as_millis() as u64,
        "Connecting to NATS"
    );

    let nats = connect(config.nats()).await?;
    let gateway = Gateway::new(nats, &config);

    server::serve(gateway, config.port()).await?;

    telemetry::shutdown();
    Ok(())
}
