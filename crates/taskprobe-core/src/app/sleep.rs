//! Sleep worker, its trigger, and the delayed-invocation path that ends up
//! calling it.

use std::time::Duration;

use serde::Serialize;

use super::probe::{Probe, paths};
use crate::domain::attempt::AttemptContext;
use crate::domain::duration::{format_duration, parse_duration};
use crate::domain::errors::ProbeError;
use crate::domain::outcome::Outcome;
use crate::domain::payload::FormPayload;
use crate::domain::task::TaskHandle;
use crate::typed::{InvocationCodec, SleepThenPost};

const MISSING_SLEEP: &str = "Missing sleep parameter";

/// Repeat count: unparsable or absent means once, negative means never.
pub(crate) fn parse_times(raw: Option<&str>) -> u32 {
    match raw.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
        Some(n) => n.clamp(0, i64::from(u32::MAX)) as u32,
        None => 1,
    }
}

fn required_sleep(form: &FormPayload) -> Result<(&str, Duration), ProbeError> {
    let raw = form
        .first("sleep")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProbeError::invalid_input(MISSING_SLEEP))?;
    let duration = parse_duration(raw).map_err(|e| {
        ProbeError::invalid_input(format!("invalid sleep '{raw}': {e}")).with_source(e)
    })?;
    Ok((raw, duration))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SleepReport {
    #[serde(with = "crate::domain::duration::duration_text")]
    pub sleep: Duration,
    pub times: u32,
    #[serde(with = "crate::domain::duration::duration_text")]
    pub total: Duration,
}

impl Probe {
    /// Validate `sleep` and enqueue a `/sleep` task carrying the raw values.
    pub async fn trigger_sleep(&self, form: &FormPayload) -> Result<TaskHandle, ProbeError> {
        let (raw_sleep, _) = required_sleep(form)?;
        let payload = FormPayload::new()
            .with("sleep", raw_sleep)
            .with("times", form.first("times").unwrap_or_default());
        self.enqueue(paths::SLEEP, payload).await
    }

    /// Block for `sleep × times`, one round at a time.
    pub async fn sleep(
        &self,
        form: &FormPayload,
        attempt: &AttemptContext,
    ) -> Result<SleepReport, ProbeError> {
        let (_, sleep) = required_sleep(form)?;
        let times = parse_times(form.first("times"));

        for round in 1..=times {
            tracing::info!(round, times, "Round {round} of {times}");
            tracing::info!(sleep = %format_duration(sleep), "Will sleep for {}", format_duration(sleep));
            tokio::time::sleep(sleep).await;
            tracing::info!("Waking up");
        }

        let total = sleep.saturating_mul(times);
        tracing::info!(
            task_name = attempt.task_name.as_deref().unwrap_or("-"),
            total_secs = total.as_secs_f64(),
            "Slept for {:.6} seconds",
            total.as_secs_f64()
        );
        Ok(SleepReport {
            sleep,
            times,
            total,
        })
    }

    /// Encode a `sleep-then-post` invocation and enqueue it to the delayed-call endpoint.
    pub async fn trigger_sleep_via_delay(
        &self,
        form: &FormPayload,
    ) -> Result<TaskHandle, ProbeError> {
        let (_, sleep) = required_sleep(form)?;
        let times = parse_times(form.first("times"));

        let payload = InvocationCodec::encode(&SleepThenPost { sleep, times })?;
        self.enqueue(paths::DELAYED_CALL, payload).await
    }

    /// Decode the invocation record and run it through the dispatch table.
    ///
    /// Undecodable records and unknown kinds are client errors; whatever the
    /// invocable itself fails with is passed through.
    pub async fn invoke_delayed(
        &self,
        form: &FormPayload,
        attempt: &AttemptContext,
    ) -> Result<Outcome, ProbeError> {
        let invocation = InvocationCodec::decode(form)?;
        tracing::info!(
            kind = %invocation.kind,
            retry_count = attempt.retry_ordinal(),
            "invoking delayed call"
        );
        self.registry.dispatch(invocation).await
    }
}
