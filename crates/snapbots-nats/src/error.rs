//! Failures of a single bus operation.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to serialize message for '{subject}': {source}")]
    Serialize {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    /// The reply arrived but does not have the expected shape.
    #[error("malformed reply from '{subject}': {source}")]
    Deserialize {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to '{subject}' failed: {error}")]
    Transport { subject: String, error: String },

    #[error("request to '{subject}' timed out after {}ms", .timeout.as_millis())]
    Timeout { subject: String, timeout: Duration },

    #[error("publish to '{subject}' failed: {error}")]
    Publish { subject: String, error: String },
}

/// Coarse classification used when translating bus failures for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    Serialization,
    Transport,
    Timeout,
}

impl BusError {
    pub fn subject(&self) -> &str {
        match self {
            Self::Serialize { subject, .. }
            | Self::Deserialize { subject, .. }
            | Self::Transport { subject, .. }
            | Self::Timeout { subject, .. }
            | Self::Publish { subject, .. } => subject,
        }
    }

    pub fn kind(&self) -> BusErrorKind {
        match self {
            Self::Serialize { .. } | Self::Deserialize { .. } => BusErrorKind::Serialization,
            Self::Transport { .. } | Self::Publish { .. } => BusErrorKind::Transport,
            Self::Timeout { .. } => BusErrorKind::Timeout,
        }
    }
}
