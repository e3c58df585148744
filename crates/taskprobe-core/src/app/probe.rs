//! Probe - トリガー / 実行エンドポイントの本体
//!
//! 各シミュレーションはトリガー（入力検証 + タスクを 1 件積む）と
//! 実行（再配送されたときに動く）の組です。HTTP には依存せず、
//! 入力はフォーム値と [`AttemptContext`] だけを受け取ります。
//!
//! 操作ごとのファイル:
//! - sleep.rs: sleep / trigger-sleep / 遅延実行
//! - unstable.rs: 失敗注入
//! - eta.rs: ETA 付きの自己再投入
//! - origin.rs: どのサービスで実行されたか
//! - gate.rs: protected / params

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;
use crate::domain::ids::RequestId;
use crate::domain::payload::FormPayload;
use crate::domain::task::{TaskHandle, TaskRequest};
use crate::ports::{Clock, DeliveryVerifier, ServiceEnvironment, TaskQueue};
use crate::typed::InvocableRegistry;

/// Worker and trigger paths.
pub mod paths {
    pub const TRIGGER_SLEEP: &str = "/trigger-sleep";
    pub const SLEEP: &str = "/sleep";
    pub const TRIGGER_SLEEP_VIA_DELAY: &str = "/trigger-sleep-via-delay";
    pub const DELAYED_CALL: &str = "/_ah/queue/delayed-call";
    pub const TRIGGER_UNSTABLE: &str = "/trigger-unstable";
    pub const UNSTABLE: &str = "/unstable";
    pub const TRIGGER_PROTECTED: &str = "/trigger-protected";
    pub const PROTECTED: &str = "/protected";
    pub const TRIGGER_PARAMS: &str = "/trigger-params";
    pub const PARAMS: &str = "/params";
    pub const WHICH_SERVICE: &str = "/which-service";
    pub const TASK_WITH_ETA: &str = "/task-with-eta";
    pub const HEALTH: &str = "/health";
}

pub struct Probe {
    pub(crate) queue: Arc<dyn TaskQueue>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) environment: Arc<dyn ServiceEnvironment>,
    pub(crate) verifier: Arc<dyn DeliveryVerifier>,
    pub(crate) registry: InvocableRegistry,
    pub(crate) queue_name: String,
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("queue", &self.queue.backend())
            .field("queue_name", &self.queue_name)
            .field("verifier", &self.verifier.name())
            .field("kinds", &self.registry.registered_kinds())
            .finish()
    }
}

impl Probe {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn registry(&self) -> &InvocableRegistry {
        &self.registry
    }

    /// Enqueue one task to `path` on the configured queue.
    pub(crate) async fn enqueue(
        &self,
        path: &str,
        payload: FormPayload,
    ) -> Result<TaskHandle, ProbeError> {
        self.submit(TaskRequest::new(path, payload, self.queue_name.clone()))
            .await
    }

    pub(crate) async fn submit(&self, request: TaskRequest) -> Result<TaskHandle, ProbeError> {
        let path = request.path.clone();
        match self.queue.enqueue(request).await {
            Ok(handle) => {
                tracing::info!(
                    task_name = %handle.name,
                    path = %path,
                    queue = %handle.queue_name,
                    backend = self.queue.backend(),
                    "added task"
                );
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "error adding task");
                Err(e.into())
            }
        }
    }

    /// Request id for identity reports: the platform trace id when there is
    /// one, then `X-Request-Id`, then a fresh id.
    pub fn resolve_request_id(&self, attempt: &AttemptContext) -> String {
        if let Some(trace) = attempt.header("x-cloud-trace-context") {
            // TRACE_ID/SPAN_ID;o=1
            let trace_id = trace.split(['/', ';']).next().unwrap_or(trace);
            if !trace_id.is_empty() {
                return trace_id.to_string();
            }
        }
        if let Some(id) = attempt.header("x-request-id") {
            return id.to_string();
        }
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        RequestId::from(Ulid::from_parts(timestamp_ms, rand::random())).to_string()
    }
}
