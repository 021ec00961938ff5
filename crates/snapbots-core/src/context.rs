//! Per-request correlation carried through the middleware pipeline.
//!
//! The authorizer inserts a [`RequestContext`] into the request extensions;
//! handlers and the transaction notifier read the same value back. Handlers
//! take it as an extractor, which rejects with
//! [`GatewayError::MissingRequestId`] when no authorizer ran.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::HeaderValue;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BotId;
use crate::error::GatewayError;

/// Correlation id minted once per inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn header_value(&self) -> HeaderValue {
        let mut buf = Uuid::encode_buffer();
        let encoded: &str = self.0.hyphenated().encode_lower(&mut buf);
        HeaderValue::from_str(encoded).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: RequestId,
    bot_id: BotId,
}

impl RequestContext {
    pub fn new(request_id: RequestId, bot_id: BotId) -> Self {
        Self { request_id, bot_id }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn bot_id(&self) -> &BotId {
        &self.bot_id
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or(GatewayError::MissingRequestId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn context() -> RequestContext {
        RequestContext::new(RequestId::generate(), BotId::new("video-thumbnail").unwrap())
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn id_serializes_as_hyphenated_string() {
        let id: RequestId = "9b2f8a4e-1f0c-4c58-9d1e-0a3c5b7d9e11".parse().unwrap();

        assert_eq!(
            serde_json::to_value(id).unwrap(),
            serde_json::json!("9b2f8a4e-1f0c-4c58-9d1e-0a3c5b7d9e11")
        );
        assert_eq!(id.to_string(), "9b2f8a4e-1f0c-4c58-9d1e-0a3c5b7d9e11");
        assert_eq!(id.header_value(), "9b2f8a4e-1f0c-4c58-9d1e-0a3c5b7d9e11");
    }

    #[tokio::test]
    async fn extractor_reads_the_extension() {
        let ctx = context();
        let mut req = Request::new(());
        req.extensions_mut().insert(ctx.clone());
        let (mut parts, ()) = req.into_parts();

        let extracted = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(extracted, ctx);
    }

    #[tokio::test]
    async fn extractor_rejects_without_authorizer() {
        let (mut parts, ()) = Request::new(()).into_parts();

        let err = RequestContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::MissingRequestId));
    }
}
