//! Job operations against the job service.
//!
//! `create_job` is not idempotent here: two calls send two requests. The job
//! service may deduplicate on `request_id`; callers that retry should reuse
//! theirs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use snapbots_nats::{PublishClient, RequestClient, publish, request_with_timeout};
use tracing::{info, instrument};

use crate::error::GatewayError;
use crate::messages::{GetJobReply, GetJobRequest, Job, NewJobRequest, UpdateJobRequest};
use crate::subjects::Subjects;

pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct JobGateway<N> {
    nats: N,
    subjects: Arc<Subjects>,
    timeout: Duration,
}

impl<N> JobGateway<N> {
    pub fn new(nats: N, subjects: Arc<Subjects>) -> Self {
        Self {
            nats,
            subjects,
            timeout: JOB_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<N: RequestClient> JobGateway<N> {
    #[instrument(name = "job.create", skip(self), fields(subject = %self.subjects.job_request))]
    pub async fn create_job(
        &self,
        bot_id: &str,
        consumer_id: &str,
        request_id: &str,
    ) -> Result<Job, GatewayError> {
        let request = NewJobRequest {
            bot_id: bot_id.to_string(),
            consumer_id: consumer_id.to_string(),
            request_id: request_id.to_string(),
        };

        let job: Job =
            request_with_timeout(&self.nats, &self.subjects.job_request, &request, self.timeout)
                .await?;

        info!(job_id = %job.id, status = %job.status, "Job created");
        Ok(job)
    }

    /// A `success: false` envelope becomes [`GatewayError::JobRejected`]; a
    /// successful envelope without `data` is a protocol violation.
    #[instrument(name = "job.get", skip(self), fields(subject = %self.subjects.job_get))]
    pub async fn get_job(
        &self,
        bot_id: &str,
        consumer_id: &str,
        job_id: &str,
    ) -> Result<Job, GatewayError> {
        let request = GetJobRequest {
            bot_id: bot_id.to_string(),
            consumer_id: consumer_id.to_string(),
            job_id: job_id.to_string(),
        };

        let reply: GetJobReply =
            request_with_timeout(&self.nats, &self.subjects.job_get, &request, self.timeout)
                .await?;

        match reply {
            GetJobReply::Job(job) => Ok(job),
            GetJobReply::Envelope(envelope) if !envelope.success => Err(GatewayError::JobRejected {
                code: envelope.code,
                message: envelope.message,
            }),
            GetJobReply::Envelope(envelope) => {
                let data = envelope.data.ok_or_else(|| {
                    GatewayError::ProtocolViolation(format!(
                        "successful reply on '{}' carries no job",
                        self.subjects.job_get
                    ))
                })?;
                serde_json::from_value(data).map_err(|source| {
                    snapbots_nats::BusError::Deserialize {
                        subject: self.subjects.job_get.clone(),
                        source,
                    }
                    .into()
                })
            }
        }
    }
}

impl<N: PublishClient> JobGateway<N> {
    /// Fire-and-forget. Only local encoding or send failures are reported.
    #[instrument(name = "job.update", skip(self, payload), fields(subject = %self.subjects.job_update))]
    pub async fn update_job(
        &self,
        consumer_id: &str,
        request_id: &str,
        status: &str,
        payload: Value,
    ) -> Result<(), GatewayError> {
        let update = UpdateJobRequest {
            consumer_id: consumer_id.to_string(),
            request_id: request_id.to_string(),
            status: status.to_string(),
            payload,
        };

        publish(&self.nats, &self.subjects.job_update, &update).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use snapbots_nats::{AdvancedMockNatsClient, BusError};

    fn gateway(mock: &AdvancedMockNatsClient) -> JobGateway<AdvancedMockNatsClient> {
        JobGateway::new(mock.clone(), Arc::new(Subjects::new("v1")))
    }

    fn job_json(status: &str) -> Value {
        json!({
            "id": "job-1",
            "bot_id": "bot1",
            "consumer_id": "cons1",
            "completed_at": "2024-05-01T10:00:05.12Z",
            "payload": {"url": "https://cdn.example/a.png"},
            "request_id": "req1",
            "started_at": "2024-05-01T10:00:00Z",
            "status": status,
            "total_duration": 5000000000i64,
            "total_bytes": 2048
        })
    }

    #[tokio::test]
    async fn create_job_returns_reply_verbatim() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response("v1.job.request", &job_json("completed"));

        let job = gateway(&mock).create_job("bot1", "cons1", "req1").await.unwrap();

        assert_eq!(serde_json::to_value(&job).unwrap(), job_json("completed"));

        let sent = &mock.requests()[0];
        assert_eq!(sent.subject, "v1.job.request");
        assert_eq!(
            sent.json(),
            json!({"bot_id": "bot1", "consumer_id": "cons1", "request_id": "req1"})
        );
    }

    #[tokio::test]
    async fn create_job_propagates_transport_errors() {
        let mock = AdvancedMockNatsClient::new();

        let err = gateway(&mock).create_job("bot1", "cons1", "req1").await.unwrap_err();

        assert!(matches!(err, GatewayError::Bus(BusError::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn create_job_times_out_after_ten_seconds() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response("v1.job.request", &job_json("completed"));
        mock.set_delay("v1.job.request", Duration::from_secs(11));

        let err = gateway(&mock).create_job("bot1", "cons1", "req1").await.unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Bus(BusError::Timeout { timeout, .. }) if timeout == JOB_TIMEOUT
        ));
    }

    #[tokio::test]
    async fn get_job_accepts_bare_record() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response("v1.job.get", &job_json("running"));

        let job = gateway(&mock).get_job("bot1", "cons1", "job-1").await.unwrap();

        assert_eq!(job.status, "running");
        assert_eq!(
            mock.requests()[0].json(),
            json!({"bot_id": "bot1", "consumer_id": "cons1", "job_id": "job-1"})
        );
    }

    #[tokio::test]
    async fn get_job_unwraps_successful_envelope() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response(
            "v1.job.get",
            &json!({"success": true, "code": 200, "message": "ok", "data": job_json("completed")}),
        );

        let job = gateway(&mock).get_job("bot1", "cons1", "job-1").await.unwrap();

        assert_eq!(job.id, "job-1");
    }

    #[tokio::test]
    async fn get_job_surfaces_unsuccessful_envelope() {
        let mock = AdvancedMockNatsClient::new();
        let mut zeroed = job_json("");
        zeroed["id"] = json!("");
        mock.set_json_response(
            "v1.job.get",
            &json!({"success": false, "code": 404, "message": "Job not found", "data": zeroed}),
        );

        let err = gateway(&mock).get_job("bot1", "cons1", "missing").await.unwrap_err();

        match err {
            GatewayError::JobRejected { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "Job not found");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_job_rejects_successful_envelope_without_data() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response("v1.job.get", &json!({"success": true, "code": 200, "message": "ok"}));

        let err = gateway(&mock).get_job("bot1", "cons1", "job-1").await.unwrap_err();

        assert!(matches!(err, GatewayError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn get_job_rejects_malformed_data() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response(
            "v1.job.get",
            &json!({"success": true, "code": 200, "message": "ok", "data": {"id": "job-1"}}),
        );

        let err = gateway(&mock).get_job("bot1", "cons1", "job-1").await.unwrap_err();

        assert!(matches!(err, GatewayError::Bus(BusError::Deserialize { .. })));
    }

    #[tokio::test]
    async fn update_job_publishes_without_reply() {
        let mock = AdvancedMockNatsClient::new();

        gateway(&mock)
            .update_job("cons1", "req1", "completed", json!({"frames": 3}))
            .await
            .unwrap();

        let published = mock.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].subject, "v1.job.update");
        assert_eq!(
            published[0].json(),
            json!({"consumer_id": "cons1", "request_id": "req1", "status": "completed", "payload": {"frames": 3}})
        );
        assert!(mock.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_job_does_not_wait_on_pending_requests() {
        let mock = AdvancedMockNatsClient::new();
        mock.set_json_response("v1.job.request", &job_json("completed"));
        mock.set_delay("v1.job.request", Duration::from_secs(5));
        let jobs = gateway(&mock);

        let pending = tokio::spawn({
            let jobs = jobs.clone();
            async move { jobs.create_job("bot1", "cons1", "req1").await }
        });
        tokio::task::yield_now().await;
        assert_eq!(mock.requests().len(), 1);

        let started = tokio::time::Instant::now();
        jobs.update_job("cons1", "req1", "running", Value::Null)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(!pending.is_finished());
        assert_eq!(mock.published_subjects(), vec!["v1.job.update"]);

        let job = pending.await.unwrap().unwrap();
        assert_eq!(job.status, "completed");
    }

    #[tokio::test]
    async fn update_job_reports_publish_failure() {
        let mock = AdvancedMockNatsClient::new();
        mock.fail_next_publish();

        let err = gateway(&mock)
            .update_job("cons1", "req1", "failed", Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Bus(BusError::Publish { .. })));
    }
}
