//! ProbeBuilder - Probe の組み立てと起動時検証
//!
//! # 学習ポイント
//! - Builder パターン
//! - 起動時検証（Fail-fast）: 必要な部品と invocable が揃っていなければ build() で失敗
//! - 配送元の確認方法は差し替え可能。既定は `X-AppEngine-TaskName` のみを信用する

use std::sync::Arc;

use super::probe::Probe;
use crate::config::DEFAULT_QUEUE_NAME;
use crate::impls::TaskHeaderVerifier;
use crate::ports::{Clock, DeliveryVerifier, ServiceEnvironment, SystemClock, TaskQueue};
use crate::typed::{Invocable, InvocableRegistry, Invoker, RegistryError};

/// ProbeBuilder は Probe を構築
///
/// # 使用例
/// ```ignore
/// let probe = ProbeBuilder::new()
///     .queue(queue)
///     .environment(environment)
///     .register::<SleepThenPost, _>(invoker)?
///     .expect_kinds(&[SleepThenPost::KIND])
///     .build()?;
/// ```
pub struct ProbeBuilder {
    queue: Option<Arc<dyn TaskQueue>>,
    clock: Arc<dyn Clock>,
    environment: Option<Arc<dyn ServiceEnvironment>>,
    verifier: Arc<dyn DeliveryVerifier>,
    queue_name: String,
    registry: InvocableRegistry,
    expected_kinds: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing invocable kinds: {0:?}. These kinds were expected but not registered.")]
    MissingInvocables(Vec<String>),

    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
}

impl ProbeBuilder {
    pub fn new() -> Self {
        Self {
            queue: None,
            clock: Arc::new(SystemClock),
            environment: None,
            verifier: Arc::new(TaskHeaderVerifier::app_engine_only()),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            registry: InvocableRegistry::new(),
            expected_kinds: None,
        }
    }

    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn environment(mut self, environment: Arc<dyn ServiceEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn delivery_verifier(mut self, verifier: Arc<dyn DeliveryVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn register<T: Invocable, I: Invoker<T> + 'static>(
        mut self,
        invoker: I,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, I>(invoker)?;
        Ok(self)
    }

    /// Kinds that must be registered before `build()` succeeds.
    pub fn expect_kinds(mut self, kinds: &[&str]) -> Self {
        self.expected_kinds = Some(kinds.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Probe, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let registered = self.registry.registered_kinds();
            let missing: Vec<String> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingInvocables(missing));
            }
        }

        let queue = self.queue.ok_or(BuildError::MissingComponent("queue"))?;
        let environment = self
            .environment
            .ok_or(BuildError::MissingComponent("environment"))?;

        Ok(Probe {
            queue,
            clock: self.clock,
            environment,
            verifier: self.verifier,
            registry: self.registry,
            queue_name: self.queue_name,
        })
    }
}

impl Default for ProbeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::probe::harness::FakeEnvironment;
    use crate::impls::InMemoryTaskQueue;
    use crate::typed::invoker::fixtures::{Count, CountInvoker, Echo, EchoInvoker};

    fn base() -> ProbeBuilder {
        ProbeBuilder::new()
            .queue(Arc::new(InMemoryTaskQueue::new()))
            .environment(Arc::new(FakeEnvironment {
                service: "default".to_string(),
            }))
    }

    #[test]
    fn build_success() {
        let probe = base()
            .register::<Echo, _>(EchoInvoker)
            .unwrap()
            .expect_kinds(&[Echo::KIND])
            .build()
            .unwrap();
        assert_eq!(probe.queue_name(), "slow-queue");
        assert_eq!(probe.registry().registered_kinds(), vec!["echo".to_string()]);
    }

    #[test]
    fn build_missing_kinds() {
        let result = base()
            .register::<Echo, _>(EchoInvoker)
            .unwrap()
            .expect_kinds(&[Echo::KIND, Count::KIND])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingInvocables(missing)) if missing == vec![Count::KIND.to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        let probe = base()
            .register::<Count, _>(CountInvoker)
            .unwrap()
            .queue_name("fast-queue")
            .build()
            .unwrap();
        assert_eq!(probe.queue_name(), "fast-queue");
    }

    #[test]
    fn duplicate_registration_fails() {
        let result = base()
            .register::<Echo, _>(EchoInvoker)
            .unwrap()
            .register::<Echo, _>(EchoInvoker);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(kind)) if kind == "echo"));
    }

    #[test]
    fn missing_queue_is_reported() {
        let result = ProbeBuilder::new()
            .environment(Arc::new(FakeEnvironment {
                service: "default".to_string(),
            }))
            .build();
        assert!(matches!(result, Err(BuildError::MissingComponent("queue"))));
    }
}
