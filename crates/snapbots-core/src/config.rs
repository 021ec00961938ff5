//! Gateway configuration, resolved once at startup and read-only afterwards.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use snapbots_nats::NatsConfig;
use snapbots_std::env::ReadEnv;
use thiserror::Error;

use crate::subjects::Subjects;

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_SUBJECT_PREFIX: &str = "v1";
pub const DEFAULT_PORT: u16 = 8080;
/// Same as axum's default body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const ENV_BOT_ID: &str = "SNAPBOTS_BOT_ID";
const ENV_AUTH_TIMEOUT_MS: &str = "SNAPBOTS_AUTH_TIMEOUT_MS";
const ENV_SUBJECT_PREFIX: &str = "SNAPBOTS_SUBJECT_PREFIX";
const ENV_PORT: &str = "SNAPBOTS_PORT";
const ENV_MAX_BODY_BYTES: &str = "SNAPBOTS_MAX_BODY_BYTES";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SNAPBOTS_BOT_ID is required")]
    MissingBotId,

    #[error("bot id {0:?} cannot be sent as an HTTP header value")]
    InvalidBotId(String),
}

/// The identity this process authorizes requests as.
///
/// Validated on construction so it can always be echoed in the `x-bot-id`
/// response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotId {
    name: Arc<str>,
    header: HeaderValue,
}

impl BotId {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingBotId);
        }
        let header =
            HeaderValue::from_str(trimmed).map_err(|_| ConfigError::InvalidBotId(name.clone()))?;
        Ok(Self {
            name: Arc::from(trimmed),
            header,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl std::fmt::Display for BotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolved from environment variables:
/// - `SNAPBOTS_BOT_ID`: bot identity sent with every authorization (required)
/// - `SNAPBOTS_AUTH_TIMEOUT_MS`: authorization round-trip budget (default 3000)
/// - `SNAPBOTS_SUBJECT_PREFIX`: NATS subject prefix (default `v1`)
/// - `SNAPBOTS_PORT`: HTTP listen port (default 8080)
/// - `SNAPBOTS_MAX_BODY_BYTES`: largest body the authorization gate accepts
///   (default 2 MiB)
/// - Standard `NATS_*` variables (see [`NatsConfig::from_env`])
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    nats: NatsConfig,
    bot_id: BotId,
    auth_timeout: Duration,
    subject_prefix: String,
    port: u16,
    max_body_bytes: usize,
}

impl GatewayConfig {
    pub fn new(bot_id: BotId, nats: NatsConfig) -> Self {
        Self {
            nats,
            bot_id,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let bot_id = BotId::new(env.var(ENV_BOT_ID).unwrap_or_default())?;
        let mut config = Self::new(bot_id, NatsConfig::from_env(env));

        if let Some(ms) = env.parsed::<u64>(ENV_AUTH_TIMEOUT_MS).filter(|ms| *ms > 0) {
            config.auth_timeout = Duration::from_millis(ms);
        }
        if let Ok(prefix) = env.var(ENV_SUBJECT_PREFIX) {
            config.subject_prefix = prefix.trim().trim_end_matches('.').to_string();
        }
        if let Some(port) = env.parsed::<u16>(ENV_PORT) {
            config.port = port;
        }
        if let Some(limit) = env.parsed::<usize>(ENV_MAX_BODY_BYTES) {
            config.max_body_bytes = limit;
        }
        Ok(config)
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn nats(&self) -> &NatsConfig {
        &self.nats
    }

    pub fn bot_id(&self) -> &BotId {
        &self.bot_id
    }

    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }

    pub fn subjects(&self) -> Subjects {
        Subjects::new(&self.subject_prefix)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}
