//! One trait per NATS operation.
//!
//! Components are generic over the operations they need, so production code
//! runs against [`async_nats::Client`] and tests against the mocks without
//! dynamic dispatch.

use async_nats::subject::ToSubject;
use async_nats::{Client, HeaderMap, Message};
use bytes::Bytes;
use std::error::Error;
use std::future::Future;

/// Request/reply: publish on a subject and wait for the first reply.
pub trait RequestClient: Send + Sync + Clone + 'static {
    type RequestError: Error + Send + Sync;

    fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<Message, Self::RequestError>> + Send;
}

/// Fire-and-forget publish. Completes once the message is handed to the
/// client's outbound buffer, not when anyone receives it.
pub trait PublishClient: Send + Sync + Clone + 'static {
    type PublishError: Error + Send + Sync;

    fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), Self::PublishError>> + Send;
}

pub trait FlushClient: Send + Sync + Clone + 'static {
    type FlushError: Error + Send + Sync;

    fn flush(&self) -> impl Future<Output = Result<(), Self::FlushError>> + Send;
}

/// Everything the gateway needs from a shared bus connection.
pub trait Bus: RequestClient + PublishClient + FlushClient {}

impl<T: RequestClient + PublishClient + FlushClient> Bus for T {}

impl RequestClient for Client {
    type RequestError = async_nats::client::RequestError;

    async fn request_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<Message, Self::RequestError> {
        Client::request_with_headers(self, subject, headers, payload).await
    }
}

impl PublishClient for Client {
    type PublishError = async_nats::client::PublishError;

    async fn publish_with_headers<S: ToSubject + Send>(
        &self,
        subject: S,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), Self::PublishError> {
        Client::publish_with_headers(self, subject, headers, payload).await
    }
}

impl FlushClient for Client {
    type FlushError = async_nats::client::FlushError;

    async fn flush(&self) -> Result<(), Self::FlushError> {
        Client::flush(self).await
    }
}
