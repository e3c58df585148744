//! InvocableRegistry - kind → Invoker の静的なディスパッチ表
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use std::collections::HashMap;
use std::sync::Arc;

use super::codec::DelayedInvocation;
use super::invocable::Invocable;
use super::invoker::{DynInvoker, Invoker, TypedInvoker};
use crate::domain::errors::ProbeError;
use crate::domain::outcome::Outcome;

/// InvocableRegistry は起動時に組み立て、以後は読み取り専用
///
/// # 使用例
/// ```ignore
/// let mut registry = InvocableRegistry::new();
/// registry.register::<SleepThenPost, _>(invoker)?;
/// let outcome = registry.dispatch(invocation).await?;
/// ```
#[derive(Default)]
pub struct InvocableRegistry {
    invokers: HashMap<String, Arc<dyn DynInvoker>>,
}

/// RegistryError は InvocableRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invoker for kind '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("no invoker registered for kind '{0}'")]
    UnknownKind(String),
}

impl From<RegistryError> for ProbeError {
    fn from(err: RegistryError) -> Self {
        match err {
            // 別デプロイのコードが積んだ未知の kind: 再試行しても直らない
            RegistryError::UnknownKind(_) => ProbeError::invalid_input(err.to_string()),
            RegistryError::AlreadyRegistered(_) => ProbeError::configuration(err.to_string()),
        }
    }
}

impl InvocableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Invocable, I: Invoker<T> + 'static>(
        &mut self,
        invoker: I,
    ) -> Result<(), RegistryError> {
        let kind = T::KIND.to_string();
        if self.invokers.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.invokers
            .insert(kind, Arc::new(TypedInvoker::<T, I>::new(invoker)));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DynInvoker>> {
        self.invokers.get(kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.invokers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Resolve `invocation.kind` and run it with the decoded arguments.
    pub async fn dispatch(&self, invocation: DelayedInvocation) -> Result<Outcome, ProbeError> {
        let invoker = self
            .get(&invocation.kind)
            .ok_or_else(|| RegistryError::UnknownKind(invocation.kind.clone()))?;
        tracing::debug!(kind = %invocation.kind, "dispatching delayed invocation");
        invoker.invoke_dyn(invocation.args).await
    }
}
