//! どのサービスでタスクが実行されたか
//!
//! 直接呼び出しは呼び出し元のサービス名・ホスト・インスタンスを積み、
//! 配送時は実行側の環境を報告して、同じサービスか、別サービスか、
//! 同じサービスの別インスタンスかを判定します。

use serde::Serialize;

use super::probe::{Probe, paths};
use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;
use crate::domain::identity::{IdentitySnapshot, OriginMatch, ServiceIdentity};
use crate::domain::payload::FormPayload;
use crate::domain::task::TaskHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginReport {
    pub started_by: Option<ServiceIdentity>,
    pub executed_by: IdentitySnapshot,
    pub origin: OriginMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhichService {
    Enqueued(TaskHandle),
    Report(OriginReport),
}

impl Probe {
    pub async fn which_service(
        &self,
        form: &FormPayload,
        attempt: &AttemptContext,
    ) -> Result<WhichService, ProbeError> {
        if !attempt.is_task_delivery() {
            let started_by = self.environment.identity();
            tracing::info!(
                service = %started_by.service_name,
                host = %started_by.host_name,
                instance = %started_by.instance_id,
                "Starting task"
            );
            let handle = self
                .enqueue(paths::WHICH_SERVICE, started_by.to_payload())
                .await?;
            return Ok(WhichService::Enqueued(handle));
        }

        let started_by = ServiceIdentity::from_payload(form);
        let snapshot = self.environment.snapshot(&self.resolve_request_id(attempt));
        let origin = OriginMatch::compare(started_by.as_ref(), &snapshot.identity());

        match &started_by {
            Some(s) => tracing::info!(
                service = %s.service_name,
                host = %s.host_name,
                instance = %s.instance_id,
                "Task started by"
            ),
            None => tracing::info!("Task started by an unknown service"),
        }
        tracing::info!(app_id = %snapshot.app_id, "Application ID");
        tracing::info!(service = %snapshot.service_name, "Service name");
        tracing::info!(host = %snapshot.service_host_name, "Service host name");
        tracing::info!(host = %snapshot.default_version_host_name, "Default version host name");
        tracing::info!(version = %snapshot.version_id, "Version ID");
        tracing::info!(instance = %snapshot.instance_id, "Instance ID");
        tracing::info!(datacenter = %snapshot.datacenter, "Datacenter");
        tracing::info!(software = %snapshot.server_software, "Server software");
        tracing::info!(request_id = %snapshot.request_id, "Request ID");
        tracing::info!(is_dev = snapshot.is_dev, runtime = %snapshot.runtime_version, "Runtime");
        tracing::info!(?origin, "origin");

        Ok(WhichService::Report(OriginReport {
            started_by,
            executed_by: snapshot,
            origin,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::probe::harness::{harness, harness_with, now};
    use crate::impls::InMemoryTaskQueue;
    use crate::ports::FixedClock;
    use rstest::rstest;
    use std::sync::Arc;

    #[tokio::test]
    async fn direct_call_enqueues_caller_identity() {
        let queue = Arc::new(InMemoryTaskQueue::with_clock(Arc::new(FixedClock::new(now()))));
        let h = harness_with(queue, "subservice");
        let result = h
            .probe
            .which_service(&FormPayload::new(), &AttemptContext::direct())
            .await
            .unwrap();

        let WhichService::Enqueued(handle) = result else {
            panic!("expected an enqueued task");
        };
        assert_eq!(handle.path, "/which-service");
        assert_eq!(handle.payload.first("startedByService"), Some("subservice"));
        assert_eq!(handle.payload.first("startedByInstance"), Some("instance-1"));
        assert_eq!(
            handle.payload.first("startedByHost"),
            Some("subservice-dot-probe-project.appspot.com")
        );
        assert_eq!(h.queue.len(), 1);
    }

    #[rstest]
    #[case("default", "instance-1", OriginMatch::SameService, "same_service")]
    #[case("default", "instance-2", OriginMatch::DifferentInstance, "different_instance")]
    #[case("subservice", "instance-1", OriginMatch::DifferentService, "different_service")]
    #[tokio::test]
    async fn delivery_classifies_origin(
        #[case] service: &str,
        #[case] instance: &str,
        #[case] expected: OriginMatch,
        #[case] json_name: &str,
    ) {
        let h = harness();
        let attempt = AttemptContext::from_header_pairs([
            ("X-CloudTasks-TaskName", "task-1"),
            ("X-Request-Id", "req-abc"),
        ]);
        let form = FormPayload::new()
            .with("startedByService", service)
            .with("startedByInstance", instance);
        let result = h.probe.which_service(&form, &attempt).await.unwrap();

        let WhichService::Report(report) = result else {
            panic!("expected a report");
        };
        assert_eq!(report.origin, expected);
        assert_eq!(report.executed_by.service_name, "default");
        assert_eq!(report.executed_by.request_id, "req-abc");
        assert!(h.queue.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["startedBy"]["serviceName"], service);
        assert_eq!(json["startedBy"]["instanceId"], instance);
        assert_eq!(json["executedBy"]["appId"], "probe-project");
        assert_eq!(json["origin"], json_name);
    }

    #[tokio::test]
    async fn direct_call_payload_round_trips_to_same_service() {
        let h = harness();
        let WhichService::Enqueued(handle) = h
            .probe
            .which_service(&FormPayload::new(), &AttemptContext::direct())
            .await
            .unwrap()
        else {
            panic!("expected an enqueued task");
        };
        let WhichService::Report(report) = h
            .probe
            .which_service(&handle.payload, &AttemptContext::delivery("t", 0))
            .await
            .unwrap()
        else {
            panic!("expected a report");
        };
        assert_eq!(report.origin, OriginMatch::SameService);
        assert_eq!(
            report.started_by.map(|s| s.host_name),
            Some("default-dot-probe-project.appspot.com".to_string())
        );
    }

    #[tokio::test]
    async fn delivery_without_origin_is_unknown() {
        let h = harness();
        let result = h
            .probe
            .which_service(&FormPayload::new(), &AttemptContext::delivery("t", 0))
            .await
            .unwrap();
        let WhichService::Report(report) = result else {
            panic!("expected a report");
        };
        assert_eq!(report.origin, OriginMatch::Unknown);
        assert_eq!(report.started_by, None);
    }
}
