//! Attempt context: what the platform tells a worker about the current delivery.
//!
//! Handlers never look at raw headers. The HTTP adapter turns the delivery
//! headers into an [`AttemptContext`] and the probe logic only sees that value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Platform header names, App Engine spelling first, Cloud Tasks second.
pub mod headers {
    /// App Engine strips this one from external traffic; Cloud Tasks HTTP targets
    /// never see it.
    pub const APP_ENGINE_TASK_NAME: &str = "x-appengine-taskname";
    pub const TASK_NAME: [&str; 2] = ["x-appengine-taskname", "x-cloudtasks-taskname"];
    pub const QUEUE_NAME: [&str; 2] = ["x-appengine-queuename", "x-cloudtasks-queuename"];
    pub const RETRY_COUNT: [&str; 2] = ["x-appengine-taskretrycount", "x-cloudtasks-taskretrycount"];
    pub const EXECUTION_COUNT: [&str; 2] = [
        "x-appengine-taskexecutioncount",
        "x-cloudtasks-taskexecutioncount",
    ];
    pub const TASK_ETA: [&str; 2] = ["x-appengine-tasketa", "x-cloudtasks-tasketa"];

    /// Headers the local emulator sends on every delivery.
    pub const CLOUD_TASKS_TASK_NAME: &str = "X-CloudTasks-TaskName";
    pub const CLOUD_TASKS_QUEUE_NAME: &str = "X-CloudTasks-QueueName";
    pub const CLOUD_TASKS_RETRY_COUNT: &str = "X-CloudTasks-TaskRetryCount";
    pub const CLOUD_TASKS_EXECUTION_COUNT: &str = "X-CloudTasks-TaskExecutionCount";
    pub const CLOUD_TASKS_TASK_ETA: &str = "X-CloudTasks-TaskETA";
}

/// Per-delivery metadata supplied by the queue platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    /// Task name header. Its presence is what marks a request as a queue delivery.
    pub task_name: Option<String>,
    pub queue_name: Option<String>,
    /// Raw retry ordinal header value, if any.
    pub retry_count_raw: Option<String>,
    pub execution_count: Option<u32>,
    pub task_eta: Option<DateTime<Utc>>,
    /// Every delivery header, for logging.
    pub headers: Vec<(String, String)>,
}

impl AttemptContext {
    /// Context of a direct (non-queue) call.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` header pairs. Names are matched case-insensitively.
    pub fn from_header_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let raw_headers: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let lookup = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|name| {
                raw_headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.clone())
            })
        };

        Self {
            task_name: lookup(&headers::TASK_NAME).filter(|v| !v.is_empty()),
            queue_name: lookup(&headers::QUEUE_NAME),
            retry_count_raw: lookup(&headers::RETRY_COUNT),
            execution_count: lookup(&headers::EXECUTION_COUNT).and_then(|v| v.trim().parse().ok()),
            task_eta: lookup(&headers::TASK_ETA).and_then(|v| parse_eta_header(&v)),
            headers: raw_headers,
        }
    }

    /// Test/emulator helper: a queue delivery with the given name and ordinal.
    pub fn delivery(task_name: impl Into<String>, retry_count: u32) -> Self {
        Self {
            task_name: Some(task_name.into()),
            retry_count_raw: Some(retry_count.to_string()),
            ..Self::default()
        }
    }

    /// True when the platform's task-identity header is present.
    pub fn is_task_delivery(&self) -> bool {
        self.task_name.is_some()
    }

    /// Raw value of a delivery header, trimmed. Empty values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Zero-based retry ordinal. Missing or unparsable values count as the first delivery.
    pub fn retry_ordinal(&self) -> u32 {
        self.retry_count_raw
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// ETA headers are seconds since the epoch with a fractional part.
fn parse_eta_header(value: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("X-AppEngine-TaskName", "X-AppEngine-TaskRetryCount")]
    #[case("X-CloudTasks-TaskName", "X-CloudTasks-TaskRetryCount")]
    #[case("x-cloudtasks-taskname", "x-cloudtasks-taskretrycount")]
    fn reads_both_header_spellings(#[case] name_header: &str, #[case] retry_header: &str) {
        let ctx = AttemptContext::from_header_pairs([(name_header, "task-1"), (retry_header, "3")]);
        assert!(ctx.is_task_delivery());
        assert_eq!(ctx.task_name.as_deref(), Some("task-1"));
        assert_eq!(ctx.retry_ordinal(), 3);
    }

    #[test]
    fn direct_call_has_no_task_identity() {
        let ctx = AttemptContext::from_header_pairs([("Content-Type", "text/plain")]);
        assert!(!ctx.is_task_delivery());
        assert_eq!(ctx.retry_ordinal(), 0);
        assert_eq!(ctx.headers.len(), 1);
    }

    #[test]
    fn empty_task_name_is_not_a_delivery() {
        let ctx = AttemptContext::from_header_pairs([("X-AppEngine-TaskName", "")]);
        assert!(!ctx.is_task_delivery());
    }

    #[test]
    fn header_lookup_ignores_case_and_blank_values() {
        let ctx = AttemptContext::from_header_pairs([
            ("Authorization", " Bearer abc "),
            ("X-Request-Id", ""),
        ]);
        assert_eq!(ctx.header("authorization"), Some("Bearer abc"));
        assert_eq!(ctx.header("x-request-id"), None);
        assert_eq!(ctx.header(headers::APP_ENGINE_TASK_NAME), None);
    }

    #[test]
    fn unparsable_retry_count_is_first_delivery() {
        let ctx = AttemptContext::from_header_pairs([("X-AppEngine-TaskRetryCount", "many")]);
        assert_eq!(ctx.retry_ordinal(), 0);
    }

    #[test]
    fn eta_header_is_epoch_seconds() {
        let ctx = AttemptContext::from_header_pairs([("X-CloudTasks-TaskETA", "1700000000.5")]);
        let eta = ctx.task_eta.unwrap();
        assert_eq!(eta.timestamp(), 1_700_000_000);
        assert_eq!(eta.timestamp_subsec_millis(), 500);
    }
}
