//! NATS subjects the gateway talks on.
//!
//! Every subject is `{prefix}.{name}`; the upstream services listen on the
//! `v1` prefix.

pub const JOB_REQUEST: &str = "job.request";
pub const JOB_GET: &str = "job.get";
pub const JOB_UPDATE: &str = "job.update";
pub const CONSUMER_CONSUME: &str = "consumer.consume";
pub const TRANSACTION_CONFIRMED: &str = "transaction.confirmed";

pub fn subject(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// All subjects for one prefix, rendered once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    pub job_request: String,
    pub job_get: String,
    pub job_update: String,
    pub consumer_consume: String,
    pub transaction_confirmed: String,
}

impl Subjects {
    pub fn new(prefix: &str) -> Self {
        Self {
            job_request: subject(prefix, JOB_REQUEST),
            job_get: subject(prefix, JOB_GET),
            job_update: subject(prefix, JOB_UPDATE),
            consumer_consume: subject(prefix, CONSUMER_CONSUME),
            transaction_confirmed: subject(prefix, TRANSACTION_CONFIRMED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_subjects() {
        let s = Subjects::new("v1");
        assert_eq!(s.job_request, "v1.job.request");
        assert_eq!(s.job_get, "v1.job.get");
        assert_eq!(s.job_update, "v1.job.update");
        assert_eq!(s.consumer_consume, "v1.consumer.consume");
        assert_eq!(s.transaction_confirmed, "v1.transaction.confirmed");
    }

    #[test]
    fn empty_prefix_uses_bare_names() {
        let s = Subjects::new("");
        assert_eq!(s.job_request, "job.request");
        assert_eq!(s.transaction_confirmed, "transaction.confirmed");
    }
}
