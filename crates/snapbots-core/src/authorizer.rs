//! Authorization gate: asks the consumer service whether the caller may spend
//! fuel on this request before the handler runs.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use snapbots_nats::{RequestClient, request_with_timeout};
use tracing::{Span, debug, field, info, instrument};

use crate::config::{BotId, DEFAULT_MAX_BODY_BYTES};
use crate::context::{RequestContext, RequestId};
use crate::error::GatewayError;
use crate::messages::{AuthDecision, AuthRequest};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const BOT_ID_HEADER: &str = "x-bot-id";
pub const FUEL_CONSUMED_HEADER: &str = "x-fuel-consumed";
pub const FUEL_AVAILABLE_HEADER: &str = "x-fuel-available";

/// Outcome of a consume check that got an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Authorized(AuthDecision),
    Denied(AuthDecision),
}

impl From<AuthDecision> for Verdict {
    fn from(decision: AuthDecision) -> Self {
        if decision.authorized {
            Self::Authorized(decision)
        } else {
            Self::Denied(decision)
        }
    }
}

#[derive(Clone)]
pub struct Authorizer<N> {
    nats: N,
    bot_id: BotId,
    subject: Arc<str>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl<N> Authorizer<N> {
    pub fn new(nats: N, bot_id: BotId, subject: impl Into<Arc<str>>, timeout: Duration) -> Self {
        Self {
            nats,
            bot_id,
            subject: subject.into(),
            timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Bodies larger than `limit` are refused with 413 before the consume
    /// check.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn bot_id(&self) -> &BotId {
        &self.bot_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

impl<N: RequestClient> Authorizer<N> {
    /// One round trip on the consume subject. Transport, timeout and decoding
    /// failures are errors, never a default verdict.
    pub async fn check(&self, request: &AuthRequest) -> Result<Verdict, GatewayError> {
        let decision: AuthDecision =
            request_with_timeout(&self.nats, &self.subject, request, self.timeout).await?;
        debug!(
            authorized = decision.authorized,
            fuel_required = decision.fuel_required,
            fuel_available = decision.fuel_available,
            "Consume check answered"
        );
        Ok(decision.into())
    }
}

/// Middleware for [`axum::middleware::from_fn_with_state`].
///
/// Mints the request id, stores the [`RequestContext`] in the request
/// extensions, and only calls the inner service on an authorized verdict.
/// The context is attached to the response extensions on every path.
///
/// The metering headers are filled in after the handler returns, and only
/// where the handler left them unset, so a handler can override them.
#[instrument(
    name = "gate.authorize",
    skip_all,
    fields(
        method = %request.method(),
        path = %request.uri().path(),
        request_id = field::Empty,
    )
)]
pub async fn authorize<N: RequestClient>(
    State(authorizer): State<Authorizer<N>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::generate();
    Span::current().record("request_id", field::display(request_id));

    let context = RequestContext::new(request_id, authorizer.bot_id.clone());
    request.extensions_mut().insert(context.clone());

    let mut response = match admit(&authorizer, request, next, request_id).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    response.extensions_mut().insert(context);
    response
}

async fn admit<N: RequestClient>(
    authorizer: &Authorizer<N>,
    request: Request,
    next: Next,
    request_id: RequestId,
) -> Result<Response, GatewayError> {
    let (request, bytes) = measure_body(request, authorizer.max_body_bytes).await?;
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let auth = AuthRequest {
        bot_id: authorizer.bot_id.as_str().to_string(),
        api_key,
        bytes,
        request_id,
    };

    match authorizer.check(&auth).await? {
        Verdict::Denied(decision) => {
            info!(
                fuel_required = decision.fuel_required,
                fuel_available = decision.fuel_available,
                "Consumption denied"
            );
            Err(GatewayError::Unauthorized)
        }
        Verdict::Authorized(decision) => {
            let mut response = next.run(request).await;
            fill_metering_headers(
                response.headers_mut(),
                request_id,
                &authorizer.bot_id,
                &decision,
            );
            Ok(response)
        }
    }
}

/// Body length in bytes: the exact size hint when the body knows it,
/// otherwise the body is buffered, at most `limit` bytes of it, and handed on
/// as a full body.
async fn measure_body(request: Request, limit: usize) -> Result<(Request, u64), GatewayError> {
    if let Some(len) = request.body().size_hint().exact() {
        if len > limit as u64 {
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        return Ok((request, len));
    }

    let (parts, body) = request.into_parts();
    let mut stream = body.into_data_stream();
    let mut buffered = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GatewayError::ReadBody(e.to_string()))?;
        if buffered.len() + chunk.len() > limit {
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        buffered.extend_from_slice(&chunk);
    }
    let len = buffered.len() as u64;
    Ok((Request::from_parts(parts, Body::from(buffered)), len))
}

/// Headers the handler already set win.
fn fill_metering_headers(
    headers: &mut HeaderMap,
    request_id: RequestId,
    bot_id: &BotId,
    decision: &AuthDecision,
) {
    let values = [
        (REQUEST_ID_HEADER, request_id.header_value()),
        (BOT_ID_HEADER, bot_id.header_value().clone()),
        (FUEL_CONSUMED_HEADER, HeaderValue::from(decision.fuel_required)),
        (FUEL_AVAILABLE_HEADER, HeaderValue::from(decision.fuel_available)),
    ];
    for (name, value) in values {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert(value);
    }
}
