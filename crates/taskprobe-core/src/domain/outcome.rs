//! Outcome model: the result of executing one delivery.
//!
//! An outcome is what a worker *decided*; it is not an error. A `FAILURE`
//! outcome is the deliberate kind produced by failure injection and is mapped
//! to a server error so the platform's retry policy engages. Real faults
//! (bad input, transport problems) travel as [`ProbeError`](super::ProbeError).

use serde::{Deserialize, Serialize};

/// SUCCESS commits the task; FAILURE asks the platform to retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// Structured reports (ETA skew, identity) are separate return types of their
/// operations; an outcome only carries the status decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        assert_eq!(serde_json::to_string(&OutcomeKind::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(serde_json::to_string(&OutcomeKind::Failure).unwrap(), "\"FAILURE\"");
    }

    #[test]
    fn success_omits_reason() {
        let v = serde_json::to_value(Outcome::success()).unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "SUCCESS" }));

        let failure = Outcome::failure("Failure");
        assert!(!failure.is_success());
        assert_eq!(failure.reason.as_deref(), Some("Failure"));
    }
}
