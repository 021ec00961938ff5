//! Wires the components to one shared bus connection.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use snapbots_nats::{FlushClient, PublishClient, RequestClient};
use tracing::{info, instrument};

use crate::authorizer::{Authorizer, authorize};
use crate::config::{BotId, GatewayConfig};
use crate::jobs::JobGateway;
use crate::notifier::{TransactionNotifier, confirm_transaction};

/// Owns the bus handle and hands out the job gateway, the authorization gate
/// and the transaction notifier, all sharing that handle.
#[derive(Clone)]
pub struct Gateway<N> {
    nats: N,
    jobs: JobGateway<N>,
    authorizer: Authorizer<N>,
    notifier: TransactionNotifier<N>,
}

impl<N: Clone> Gateway<N> {
    pub fn new(nats: N, config: &GatewayConfig) -> Self {
        let subjects = Arc::new(config.subjects());
        Self {
            jobs: JobGateway::new(nats.clone(), subjects.clone()),
            authorizer: Authorizer::new(
                nats.clone(),
                config.bot_id().clone(),
                subjects.consumer_consume.as_str(),
                config.auth_timeout(),
            )
            .with_max_body_bytes(config.max_body_bytes()),
            notifier: TransactionNotifier::new(nats.clone(), subjects.transaction_confirmed.as_str()),
            nats,
        }
    }

    pub fn jobs(&self) -> &JobGateway<N> {
        &self.jobs
    }

    pub fn authorizer(&self) -> &Authorizer<N> {
        &self.authorizer
    }

    pub fn notifier(&self) -> &TransactionNotifier<N> {
        &self.notifier
    }

    pub fn bot_id(&self) -> &BotId {
        self.authorizer.bot_id()
    }
}

impl<N: RequestClient> Gateway<N> {
    /// Every route of `router` goes through the authorization gate.
    pub fn with_authorization<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(self.authorizer.clone(), authorize::<N>))
    }
}

impl<N: PublishClient> Gateway<N> {
    /// Publishes a transaction confirmation after every route of `router`.
    /// Only meaningful behind [`Gateway::with_authorization`].
    pub fn with_transaction_confirmation<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(
            self.notifier.clone(),
            confirm_transaction::<N>,
        ))
    }
}

impl<N: RequestClient + PublishClient> Gateway<N> {
    /// Gate outside, notifier inside: the notifier sees the gate's context
    /// and only runs for authorized requests.
    pub fn with_metering<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.with_authorization(self.with_transaction_confirmation(router))
    }
}

impl<N: FlushClient> Gateway<N> {
    /// Flushes pending publishes (transaction confirmations, job updates).
    #[instrument(name = "gateway.shutdown", skip_all)]
    pub async fn shutdown(self) -> Result<(), N::FlushError> {
        self.nats.flush().await?;
        info!("Bus connection flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::REQUEST_ID_HEADER;
    use crate::context::RequestContext;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;
    use snapbots_nats::{AdvancedMockNatsClient, NatsConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    fn config() -> GatewayConfig {
        GatewayConfig::new(BotId::new("bot1").unwrap(), NatsConfig::from_url("nats://unused:4222"))
            .with_auth_timeout(Duration::from_millis(500))
            .with_max_body_bytes(64)
    }

    fn allow(mock: &AdvancedMockNatsClient) {
        mock.set_json_response(
            "v1.consumer.consume",
            &json!({"authorized": true, "fuel_required": 2, "fuel_available": 8}),
        );
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn components_share_gate_settings() {
        let gateway = Gateway::new(AdvancedMockNatsClient::new(), &config());

        assert_eq!(gateway.bot_id().as_str(), "bot1");
        assert_eq!(gateway.authorizer().timeout(), Duration::from_millis(500));
        assert_eq!(gateway.authorizer().max_body_bytes(), 64);
    }

    #[tokio::test]
    async fn metering_confirms_with_the_gate_request_id() {
        let mock = AdvancedMockNatsClient::new();
        allow(&mock);
        let gateway = Gateway::new(mock.clone(), &config());
        let app = gateway.with_metering(Router::new().route(
            "/",
            get(|context: RequestContext| async move { context.request_id().to_string() }),
        ));

        let response = app.oneshot(request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        let auth_id = mock.requests()[0].json()["request_id"].clone();
        let confirmed = mock.published()[0].json()["request_id"].clone();
        assert_eq!(auth_id, json!(header));
        assert_eq!(confirmed, json!(header));
        assert_eq!(mock.published_subjects(), vec!["v1.transaction.confirmed"]);
    }

    #[tokio::test]
    async fn authorization_alone_does_not_confirm() {
        let mock = AdvancedMockNatsClient::new();
        allow(&mock);
        let gateway = Gateway::new(mock.clone(), &config());
        let app = gateway.with_authorization(Router::new().route("/", get(|| async { "ok" })));

        let response = app.oneshot(request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(mock.published().is_empty());
    }

    #[tokio::test]
    async fn shutdown_flushes_the_connection() {
        let mock = AdvancedMockNatsClient::new();
        let gateway = Gateway::new(mock.clone(), &config());

        gateway.shutdown().await.unwrap();

        assert_eq!(mock.flush_count(), 1);
    }
}
