use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snapbots_nats::{BusError, BusErrorKind};
use thiserror::Error;

use crate::response::ApiResponse;

/// Everything that can end a gateway operation without the expected result.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The consume check answered with `authorized = false`.
    #[error("request not authorized")]
    Unauthorized,

    /// The job service answered with an envelope whose `success` is false.
    #[error("job service rejected the request ({code}): {message}")]
    JobRejected { code: u16, message: String },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The transaction notifier or a handler ran without the authorizer in
    /// front of it.
    #[error("Request ID not found.")]
    MissingRequestId,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::JobRejected { code, .. } => StatusCode::from_u16(*code)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Bus(_) | Self::ProtocolViolation(_) | Self::MissingRequestId | Self::ReadBody(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short message for the response body. Internal details only go to the log.
    pub fn public_message(&self) -> String {
        let message = match self {
            Self::Bus(BusError::Serialize { .. }) => "Failed to encode upstream request",
            Self::Bus(BusError::Deserialize { .. }) | Self::ProtocolViolation(_) => {
                "Invalid upstream response"
            }
            Self::Bus(e) if e.kind() == BusErrorKind::Timeout => "Upstream request timed out",
            Self::Bus(_) => "Upstream service unavailable",
            Self::Unauthorized => "Unauthorized",
            Self::JobRejected { message, .. } => return message.clone(),
            Self::MissingRequestId => "Request ID not found.",
            Self::InvalidRequest(detail) => return format!("Invalid request: {}", detail),
            Self::ReadBody(_) => "Failed to read request body",
            Self::PayloadTooLarge { .. } => "Request body too large",
        };
        message.to_string()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Gateway error");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        ApiResponse::failure(status, self.public_message()).into_response()
    }
}
