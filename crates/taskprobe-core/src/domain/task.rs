use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::FormPayload;

/// A unit of work addressed to a worker endpoint, before it is enqueued.
///
/// Tasks are always delivered as `POST <path>` with the payload form-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub path: String,
    pub payload: FormPayload,
    pub queue_name: String,
    /// Earliest delivery time. `None` means "as soon as possible".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}

impl TaskRequest {
    pub fn new(path: impl Into<String>, payload: FormPayload, queue_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload,
            queue_name: queue_name.into(),
            eta: None,
        }
    }

    pub fn with_eta(mut self, eta: DateTime<Utc>) -> Self {
        self.eta = Some(eta);
        self
    }
}

/// What the queue hands back after a successful enqueue.
///
/// This is echoed verbatim (as JSON) by every trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHandle {
    /// Platform-assigned task name.
    pub name: String,
    pub path: String,
    pub queue_name: String,
    #[serde(default, skip_serializing_if = "FormPayload::is_empty")]
    pub payload: FormPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn for_request(name: impl Into<String>, request: &TaskRequest, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            path: request.path.clone(),
            queue_name: request.queue_name.clone(),
            payload: request.payload.clone(),
            eta: request.eta,
            enqueued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn handle_serializes_camel_case_without_empty_fields() {
        let request = TaskRequest::new("/protected", FormPayload::new(), "slow-queue");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let handle = TaskHandle::for_request("task-1", &request, at);

        let v = serde_json::to_value(&handle).unwrap();
        assert_eq!(v["name"], "task-1");
        assert_eq!(v["queueName"], "slow-queue");
        assert!(v.get("payload").is_none());
        assert!(v.get("eta").is_none());
    }

    #[test]
    fn handle_carries_eta_from_request() {
        let eta = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let request = TaskRequest::new("/task-with-eta", FormPayload::new(), "slow-queue").with_eta(eta);
        let handle = TaskHandle::for_request("t", &request, Utc::now());
        assert_eq!(handle.eta, Some(eta));
    }
}
