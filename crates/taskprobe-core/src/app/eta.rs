//! ETA 付きの自己再投入
//!
//! 直接呼び出しでは `eta` を検証して同じエンドポイントにタスクを積み、
//! 配送時には要求時刻と実際の実行時刻の差を報告します。遅延しても失敗にはしません。

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::probe::{Probe, paths};
use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;
use crate::domain::payload::FormPayload;
use crate::domain::task::{TaskHandle, TaskRequest};

const MISSING_ETA: &str = "Missing eta";

/// Fire-time report produced on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaReport {
    /// The `eta` value exactly as the caller sent it.
    pub requested: String,
    pub requested_at: Option<DateTime<Utc>>,
    pub actual: DateTime<Utc>,
    /// `actual - requested_at`; negative when the task ran early.
    pub skew_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtaOutcome {
    Scheduled(TaskHandle),
    Fired(EtaReport),
}

fn required_eta(form: &FormPayload) -> Result<(&str, DateTime<Utc>), ProbeError> {
    let raw = form
        .first("eta")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProbeError::invalid_input(MISSING_ETA))?;
    let at = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| ProbeError::invalid_input(e.to_string()).with_source(e))?;
    Ok((raw, at.with_timezone(&Utc)))
}

impl Probe {
    pub async fn task_with_eta(
        &self,
        form: &FormPayload,
        attempt: &AttemptContext,
    ) -> Result<EtaOutcome, ProbeError> {
        if attempt.is_task_delivery() {
            return Ok(EtaOutcome::Fired(self.report_eta(form, attempt)));
        }

        let (raw, at) = required_eta(form)?;
        let request = TaskRequest::new(
            paths::TASK_WITH_ETA,
            FormPayload::new().with("eta", raw),
            self.queue_name.clone(),
        )
        .with_eta(at);
        let handle = self.submit(request).await?;
        tracing::info!(
            task_name = %handle.name,
            eta = %at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            "scheduled task with eta"
        );
        Ok(EtaOutcome::Scheduled(handle))
    }

    fn report_eta(&self, form: &FormPayload, attempt: &AttemptContext) -> EtaReport {
        let requested = form.first("eta").unwrap_or_default().to_string();
        let requested_at = DateTime::parse_from_rfc3339(&requested)
            .ok()
            .map(|at| at.with_timezone(&Utc));
        let actual = self.clock.now();
        let skew_ms = requested_at.map(|at| (actual - at).num_milliseconds());

        tracing::info!(
            task_name = attempt.task_name.as_deref().unwrap_or("-"),
            requested = %requested,
            actual = %actual.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            skew_ms = skew_ms.unwrap_or_default(),
            "Requested ETA: {requested}, actual: {}",
            actual.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        EtaReport {
            requested,
            requested_at,
            actual,
            skew_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::probe::harness::{harness, now};
    use crate::domain::errors::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(&[], "Missing eta")]
    #[case(&[("eta", "")], "Missing eta")]
    #[case(&[("eta", "tomorrow")], "invalid")]
    #[tokio::test]
    async fn direct_call_requires_valid_eta(#[case] pairs: &[(&str, &str)], #[case] message: &str) {
        let h = harness();
        let form: FormPayload = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        let err = h
            .probe
            .task_with_eta(&form, &AttemptContext::direct())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.message().contains(message), "{}", err.message());
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn direct_call_schedules_self_addressed_task() {
        let h = harness();
        let raw = "2024-06-01T12:00:30.123456789Z";
        let outcome = h
            .probe
            .task_with_eta(&FormPayload::new().with("eta", raw), &AttemptContext::direct())
            .await
            .unwrap();

        let EtaOutcome::Scheduled(handle) = outcome else {
            panic!("expected a scheduled task");
        };
        assert_eq!(handle.path, "/task-with-eta");
        assert_eq!(handle.payload.first("eta"), Some(raw));
        assert_eq!(
            handle.eta,
            Some(DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc))
        );
    }

    #[rstest]
    #[case(-3_600_000)]
    #[case(0)]
    #[case(90_000)]
    #[tokio::test]
    async fn round_trip_reports_requested_time_unchanged(#[case] offset_ms: i64) {
        let h = harness();
        let requested = (now() + chrono::Duration::milliseconds(offset_ms))
            .to_rfc3339_opts(SecondsFormat::Nanos, true);

        let EtaOutcome::Scheduled(handle) = h
            .probe
            .task_with_eta(&FormPayload::new().with("eta", requested.as_str()), &AttemptContext::direct())
            .await
            .unwrap()
        else {
            panic!("expected a scheduled task");
        };

        let delivered = AttemptContext::delivery(handle.name.clone(), 0);
        let EtaOutcome::Fired(report) = h
            .probe
            .task_with_eta(&handle.payload, &delivered)
            .await
            .unwrap()
        else {
            panic!("expected a fire report");
        };

        assert_eq!(report.requested, requested);
        assert_eq!(report.actual, now());
        assert_eq!(report.skew_ms, Some(-offset_ms));
        assert_eq!(h.queue.len(), 1);
    }

    #[tokio::test]
    async fn delivery_never_fails_on_bad_eta() {
        let h = harness();
        let outcome = h
            .probe
            .task_with_eta(&FormPayload::new(), &AttemptContext::delivery("t", 2))
            .await
            .unwrap();
        let EtaOutcome::Fired(report) = outcome else {
            panic!("expected a fire report");
        };
        assert_eq!(report.requested, "");
        assert_eq!(report.skew_ms, None);
    }
}
