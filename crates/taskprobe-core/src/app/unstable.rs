//! Failure injection keyed on the retry ordinal.
//!
//! The first `failCount` deliveries of a task fail, every later one succeeds.
//! Redelivery and backoff belong to the platform; nothing here waits or counts.

use super::probe::{Probe, paths};
use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;
use crate::domain::outcome::Outcome;
use crate::domain::payload::FormPayload;
use crate::domain::task::TaskHandle;

pub const INJECTED_FAILURE: &str = "Failure";

/// Fail count from the form. Absent or unparsable counts as zero.
pub(crate) fn parse_fail_count(raw: Option<&str>) -> i64 {
    match raw.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
        Some(n) => n,
        None => {
            tracing::info!(
                fail_count = raw.unwrap_or(""),
                "Couldn't parse failCount, setting to 0"
            );
            0
        }
    }
}

/// R < N fails, R >= N succeeds.
pub fn injected_outcome(fail_count: i64, retry_ordinal: u32) -> Outcome {
    if i64::from(retry_ordinal) < fail_count {
        Outcome::failure(INJECTED_FAILURE)
    } else {
        Outcome::success()
    }
}

impl Probe {
    /// Enqueue an `/unstable` task; `failCount` travels as given.
    pub async fn trigger_unstable(&self, form: &FormPayload) -> Result<TaskHandle, ProbeError> {
        let payload =
            FormPayload::new().with("failCount", form.first("failCount").unwrap_or_default());
        self.enqueue(paths::UNSTABLE, payload).await
    }

    pub fn unstable(&self, form: &FormPayload, attempt: &AttemptContext) -> Outcome {
        let fail_count = parse_fail_count(form.first("failCount"));
        let retry_count = attempt.retry_ordinal();

        tracing::info!(fail_count, retry_count, "unstable delivery");
        for (name, value) in &attempt.headers {
            tracing::info!(header = %name, value = %value, "delivery header");
        }

        let outcome = injected_outcome(fail_count, retry_count);
        if outcome.is_success() {
            tracing::info!("Success");
        } else {
            tracing::info!("Failing!");
        }
        outcome
    }
}
