//! Transaction notifier: tells upstream that a metered request completed so
//! the reserved fuel can be settled.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use snapbots_nats::{PublishClient, publish};
use tracing::{debug, instrument};

use crate::context::{RequestContext, RequestId};
use crate::error::GatewayError;
use crate::messages::TransactionConfirmation;

#[derive(Clone)]
pub struct TransactionNotifier<N> {
    nats: N,
    subject: Arc<str>,
}

impl<N> TransactionNotifier<N> {
    pub fn new(nats: N, subject: impl Into<Arc<str>>) -> Self {
        Self {
            nats,
            subject: subject.into(),
        }
    }
}

impl<N: PublishClient> TransactionNotifier<N> {
    pub async fn confirm(&self, request_id: RequestId) -> Result<(), GatewayError> {
        publish(&self.nats, &self.subject, &TransactionConfirmation { request_id }).await?;
        debug!(subject = %self.subject, "Transaction confirmation published");
        Ok(())
    }
}

/// Middleware for [`axum::middleware::from_fn_with_state`]. Must sit inside
/// the authorization gate, which provides the [`RequestContext`].
///
/// The confirmation goes out after the handler whatever status it returned.
#[instrument(name = "gate.confirm", skip_all, fields(request_id = tracing::field::Empty))]
pub async fn confirm_transaction<N: PublishClient>(
    State(notifier): State<TransactionNotifier<N>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(context) = request.extensions().get::<RequestContext>().cloned() else {
        return GatewayError::MissingRequestId.into_response();
    };
    let request_id = context.request_id();
    tracing::Span::current().record("request_id", tracing::field::display(request_id));

    let response = next.run(request).await;

    match notifier.confirm(request_id).await {
        Ok(()) => response,
        Err(err) => err.into_response(),
    }
}
