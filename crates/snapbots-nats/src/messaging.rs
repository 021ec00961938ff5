use std::time::Duration;

use async_nats::HeaderMap;
use opentelemetry::propagation::Injector;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::client::{PublishClient, RequestClient};
use crate::error::BusError;

struct HeaderMapCarrier<'a>(&'a mut HeaderMap);

impl Injector for HeaderMapCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

/// Writes the current span's trace context into `headers` using the globally
/// installed propagator. A no-op when no propagator is installed.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderMapCarrier(headers));
    });
}

pub fn headers_with_trace_context() -> HeaderMap {
    let mut headers = HeaderMap::new();
    inject_trace_context(&mut headers);
    headers
}

/// Sends `request` as JSON on `subject` and waits up to `timeout` for the reply.
///
/// Exactly one outcome per call: the decoded reply, or one of
/// [`BusError::Serialize`], [`BusError::Transport`], [`BusError::Timeout`],
/// [`BusError::Deserialize`]. Nothing is retried. Dropping the returned future
/// abandons the wait.
pub async fn request_with_timeout<N, Req, Res>(
    client: &N,
    subject: &str,
    request: &Req,
    timeout: Duration,
) -> Result<Res, BusError>
where
    N: RequestClient,
    Req: Serialize,
    Res: DeserializeOwned,
{
    let payload = serde_json::to_vec(request).map_err(|source| BusError::Serialize {
        subject: subject.to_string(),
        source,
    })?;

    let reply = tokio::time::timeout(
        timeout,
        client.request_with_headers(
            subject.to_string(),
            headers_with_trace_context(),
            payload.into(),
        ),
    )
    .await
    .map_err(|_| BusError::Timeout {
        subject: subject.to_string(),
        timeout,
    })?
    .map_err(|e| BusError::Transport {
        subject: subject.to_string(),
        error: e.to_string(),
    })?;

    tracing::debug!(subject, bytes = reply.payload.len(), "Received NATS reply");

    serde_json::from_slice(&reply.payload).map_err(|source| {
        tracing::warn!(subject, error = %source, "Malformed NATS reply");
        BusError::Deserialize {
            subject: subject.to_string(),
            source,
        }
    })
}

/// Publishes `message` as JSON on `subject` without waiting for anyone to
/// receive it.
pub async fn publish<N, Msg>(client: &N, subject: &str, message: &Msg) -> Result<(), BusError>
where
    N: PublishClient,
    Msg: Serialize,
{
    let payload = serde_json::to_vec(message).map_err(|source| BusError::Serialize {
        subject: subject.to_string(),
        source,
    })?;

    client
        .publish_with_headers(subject.to_string(), headers_with_trace_context(), payload.into())
        .await
        .map_err(|e| BusError::Publish {
            subject: subject.to_string(),
            error: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{AdvancedMockNatsClient, MockNatsClient};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Ping {
        id: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        id: String,
        ok: bool,
    }

    fn ping() -> Ping {
        Ping { id: "req-1".into() }
    }

    #[tokio::test]
    async fn request_decodes_reply() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_response("v1.ping", r#"{"id":"req-1","ok":true,"extra":1}"#.into());

        let pong: Pong = request_with_timeout(&mock, "v1.ping", &ping(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(
            pong,
            Pong {
                id: "req-1".into(),
                ok: true
            }
        );
        assert_eq!(mock.requests()[0].json()["id"], "req-1");
    }

    #[tokio::test]
    async fn request_rejects_missing_fields() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_response("v1.ping", r#"{"id":"req-1"}"#.into());

        let result: Result<Pong, _> =
            request_with_timeout(&mock, "v1.ping", &ping(), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(BusError::Deserialize { .. })));
    }

    #[tokio::test]
    async fn request_rejects_non_json() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_response("v1.ping", "not json".into());

        let result: Result<Pong, _> =
            request_with_timeout(&mock, "v1.ping", &ping(), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(BusError::Deserialize { subject, .. }) if subject == "v1.ping"));
    }

    #[tokio::test]
    async fn request_maps_transport_failure() {
        let mock = AdvancedMockNatsClient::new();
        mock.fail_next_request();

        let result: Result<Pong, _> =
            request_with_timeout(&mock, "v1.ping", &ping(), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(BusError::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn request_times_out() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_response("v1.ping", r#"{"id":"req-1","ok":true}"#.into());
        mock.set_delay("v1.ping", Duration::from_secs(5));

        let result: Result<Pong, _> =
            request_with_timeout(&mock, "v1.ping", &ping(), Duration::from_secs(3)).await;

        match result {
            Err(BusError::Timeout { subject, timeout }) => {
                assert_eq!(subject, "v1.ping");
                assert_eq!(timeout, Duration::from_secs(3));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_fails_on_unserializable_request() {
        // JSON object keys must be strings.
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], "x");
        let mock = AdvancedMockNatsClient::new();

        let result: Result<Pong, _> =
            request_with_timeout(&mock, "v1.ping", &bad, Duration::from_secs(1)).await;

        assert!(matches!(result, Err(BusError::Serialize { .. })));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn publish_hands_off_json() {
        let mock = MockNatsClient::new();

        publish(&mock, "v1.transaction.confirmed", &ping()).await.unwrap();

        let published = mock.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].subject, "v1.transaction.confirmed");
        assert_eq!(published[0].json()["id"], "req-1");
    }

    #[tokio::test]
    async fn publish_maps_transport_failure() {
        let mock = AdvancedMockNatsClient::new();
        mock.fail_next_publish();

        let err = publish(&mock, "v1.job.update", &ping()).await.unwrap_err();

        assert!(matches!(err, BusError::Publish { .. }));
        assert!(mock.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publish_does_not_wait_on_request_latency() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_delay("v1.job.update", Duration::from_secs(60));
        let started = tokio::time::Instant::now();

        publish(&mock, "v1.job.update", &ping()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn trace_headers_without_propagator() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        let _ = headers_with_trace_context();
    }
}
