//! Wire messages exchanged with the upstream services.
//!
//! All bodies are JSON objects with named fields. Unknown reply fields are
//! ignored; missing ones fail decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RequestId;
use crate::response::ApiResponse;

/// `job.request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobRequest {
    pub bot_id: String,
    pub consumer_id: String,
    /// Upstream may deduplicate on this; the gateway does not.
    pub request_id: String,
}

/// `job.get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetJobRequest {
    pub bot_id: String,
    pub consumer_id: String,
    pub job_id: String,
}

/// `job.update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateJobRequest {
    pub consumer_id: String,
    pub request_id: String,
    pub status: String,
    pub payload: Value,
}

/// A job as reported by the job service. Passed through as received:
/// timestamps and payload are kept as the JSON values upstream sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub bot_id: String,
    pub consumer_id: String,
    pub completed_at: Value,
    pub payload: Value,
    pub request_id: String,
    pub started_at: Value,
    pub status: String,
    /// Nanoseconds.
    pub total_duration: i64,
    pub total_bytes: i64,
}

/// Reply to `job.get`: either the job itself or wrapped in the standard
/// envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GetJobReply {
    Envelope(ApiResponse<Value>),
    Job(Job),
}

/// `consumer.consume`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub bot_id: String,
    pub api_key: String,
    pub bytes: u64,
    pub request_id: RequestId,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("bot_id", &self.bot_id)
            .field("api_key", &"<redacted>")
            .field("bytes", &self.bytes)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Reply to `consumer.consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDecision {
    pub authorized: bool,
    pub fuel_required: i64,
    pub fuel_available: i64,
}

/// `transaction.confirmed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfirmation {
    pub request_id: RequestId,
}
