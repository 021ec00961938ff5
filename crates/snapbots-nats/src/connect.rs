use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{NatsAuth, NatsConfig};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to load NATS credentials file: {0}")]
    InvalidCredentials(#[source] std::io::Error),

    #[error("failed to connect to NATS servers {servers:?}: {source}")]
    ConnectionFailed {
        servers: Vec<String>,
        #[source]
        source: async_nats::ConnectError,
    },
}

/// Exponential backoff, 1s doubling up to 30s.
fn reconnect_delay(attempts: usize) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    let secs = 2u64
        .saturating_pow(exp)
        .min(MAX_RECONNECT_DELAY.as_secs());
    let delay = Duration::from_secs(secs);
    info!(attempts, delay_secs = delay.as_secs(), "NATS reconnect delay");
    delay
}

async fn handle_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected, reconnecting"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        Event::SlowConsumer(sid) => warn!(sid, "NATS slow consumer"),
        Event::LameDuckMode => warn!("NATS server entering lame duck mode"),
        Event::Closed => info!("NATS connection closed"),
        Event::Draining => info!("NATS connection draining"),
    }
}

async fn base_options(auth: &NatsAuth) -> Result<ConnectOptions, ConnectError> {
    let opts = match auth {
        NatsAuth::Credentials(path) => {
            info!(path = %path.display(), "Using NATS credentials file");
            ConnectOptions::with_credentials_file(path.clone())
                .await
                .map_err(ConnectError::InvalidCredentials)?
        }
        NatsAuth::NKey(seed) => ConnectOptions::with_nkey(seed.clone()),
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };
    Ok(opts)
}

/// Connects once at process start. The returned client is the single shared
/// bus handle; clone it into every component that needs the bus.
///
/// The client-level request timeout is disabled: every round trip carries its
/// own budget through [`request_with_timeout`](crate::request_with_timeout).
#[instrument(
    name = "nats.connect",
    skip(config),
    fields(servers = ?config.servers, auth = %config.auth.description())
)]
pub async fn connect(config: &NatsConfig) -> Result<Client, ConnectError> {
    let opts = base_options(&config.auth)
        .await?
        .retry_on_initial_connect()
        .connection_timeout(CONNECTION_TIMEOUT)
        .request_timeout(None)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { handle_event(event).await });

    match opts.connect(&config.servers).await {
        Ok(client) => {
            info!("Connected to NATS");
            Ok(client)
        }
        Err(source) => {
            warn!(error = %source, "Failed to connect to NATS");
            Err(ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                source,
            })
        }
    }
}
