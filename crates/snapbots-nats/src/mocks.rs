//! In-process stand-ins for a NATS connection.
//!
//! [`MockNatsClient`] records publishes and fails every request.
//! [`AdvancedMockNatsClient`] additionally serves canned replies per subject,
//! can delay replies and can fail the next request or publishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_nats::subject::ToSubject;
use async_nats::{HeaderMap, Message};
use bytes::Bytes;

use crate::client::{FlushClient, PublishClient, RequestClient};

#[derive(Debug, Clone)]
pub struct MockError(pub String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}

/// A message seen by a mock, as it would have gone over the wire.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub subject: String,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

impl RecordedMessage {
    /// Payload parsed as JSON. Panics on non-JSON payloads; meant for asserts.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).expect("recorded payload is not JSON")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Debug, Default)]
pub struct MockNatsClient {
    published: Arc<Mutex<Vec<RecordedMessage>>>,
    requests: Arc<Mutex<Vec<RecordedMessage>>>,
    flushes: Arc<Mutex<u32>>,
}

impl MockNatsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<RecordedMessage> {
        lock(&self.published).clone()
    }

    pub fn published_subjects(&self) -> Vec<String> {
        lock(&self.published)
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<RecordedMessage> {
        lock(&self.requests).clone()
    }

    pub fn flush_count(&self) -> u32 {
        *lock(&self.flushes)
    }

    fn record_request(&self, message: RecordedMessage) {
        lock(&self.requests).push(message);
    }
}

impl RequestClient for MockNatsClient {
    type RequestError = MockError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, MockError> {
        self.record_request(RecordedMessage {
            subject: subject.to_subject().to_string(),
            headers,
            payload,
        });
        Err(MockError("mock: no responders".to_string()))
    }
}

impl PublishClient for MockNatsClient {
    type PublishError = MockError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), MockError> {
        lock(&self.published).push(RecordedMessage {
            subject: subject.to_subject().to_string(),
            headers,
            payload,
        });
        Ok(())
    }
}

impl FlushClient for MockNatsClient {
    type FlushError = MockError;

    async fn flush(&self) -> Result<(), MockError> {
        *lock(&self.flushes) += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct AdvancedMockNatsClient {
    base: MockNatsClient,
    responses: Arc<Mutex<HashMap<String, Bytes>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    fail_next_request: Arc<Mutex<bool>>,
    /// Publishes left to fail before publishing succeeds again.
    publish_failures: Arc<Mutex<u32>>,
}

impl std::fmt::Debug for AdvancedMockNatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancedMockNatsClient")
            .field("base", &self.base)
            .field(
                "responses",
                &format!("{} configured responses", lock(&self.responses).len()),
            )
            .field("publish_failures", &*lock(&self.publish_failures))
            .finish()
    }
}

impl AdvancedMockNatsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` to every request on `subject`.
    pub fn set_response(&self, subject: &str, response: Bytes) {
        lock(&self.responses).insert(subject.to_string(), response);
    }

    /// Reply with `value` serialized as JSON to every request on `subject`.
    pub fn set_json_response(&self, subject: &str, value: &serde_json::Value) {
        self.set_response(subject, Bytes::from(value.to_string()));
    }

    /// Hold replies on `subject` back for `delay`.
    pub fn set_delay(&self, subject: &str, delay: Duration) {
        lock(&self.delays).insert(subject.to_string(), delay);
    }

    pub fn fail_next_request(&self) {
        *lock(&self.fail_next_request) = true;
    }

    pub fn fail_next_publish(&self) {
        self.fail_publish_count(1);
    }

    pub fn fail_publish_count(&self, n: u32) {
        *lock(&self.publish_failures) = n;
    }

    pub fn published(&self) -> Vec<RecordedMessage> {
        self.base.published()
    }

    pub fn published_subjects(&self) -> Vec<String> {
        self.base.published_subjects()
    }

    pub fn requests(&self) -> Vec<RecordedMessage> {
        self.base.requests()
    }

    pub fn flush_count(&self) -> u32 {
        self.base.flush_count()
    }
}

impl RequestClient for AdvancedMockNatsClient {
    type RequestError = MockError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, MockError> {
        let subject = subject.to_subject().to_string();
        self.base.record_request(RecordedMessage {
            subject: subject.clone(),
            headers,
            payload,
        });

        let should_fail = std::mem::take(&mut *lock(&self.fail_next_request));
        if should_fail {
            return Err(MockError("simulated request failure".to_string()));
        }

        let delay = lock(&self.delays).get(&subject).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = lock(&self.responses).get(&subject).cloned();
        match response {
            Some(payload) => Ok(Message {
                subject: subject.into(),
                reply: None,
                length: payload.len(),
                payload,
                headers: None,
                status: None,
                description: None,
            }),
            None => Err(MockError(format!(
                "no responders for subject: {}",
                subject
            ))),
        }
    }
}

impl PublishClient for AdvancedMockNatsClient {
    type PublishError = MockError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), MockError> {
        let should_fail = {
            let mut remaining = lock(&self.publish_failures);
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        };
        if should_fail {
            return Err(MockError("simulated publish failure".to_string()));
        }
        self.base.publish_with_headers(subject, headers, payload).await
    }
}

impl FlushClient for AdvancedMockNatsClient {
    type FlushError = MockError;

    async fn flush(&self) -> Result<(), MockError> {
        self.base.flush().await
    }
}
