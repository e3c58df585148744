//! Invoker trait - Invocable を実行する側
//!
//! # 学習ポイント
//! - ジェネリック trait (Invoker<T>)
//! - Object-safe trait (DynInvoker)
//! - Type erasure パターン (TypedInvoker<T, I> → DynInvoker)

use std::marker::PhantomData;

use async_trait::async_trait;

use super::invocable::Invocable;
use crate::domain::errors::ProbeError;
use crate::domain::outcome::Outcome;

/// Invoker は引数 T を受け取って実行し、Outcome を返す
///
/// `Invoker<SleepThenPost>` は `SleepThenPost` しか受け取れないので、
/// kind と実装の対応はコンパイル時に決まります。
#[async_trait]
pub trait Invoker<T: Invocable>: Send + Sync {
    async fn invoke(&self, args: T) -> Result<Outcome, ProbeError>;
}

/// DynInvoker は object-safe な Invoker
///
/// 引数は JSON のまま受け取り、内部で T に戻します。
#[async_trait]
pub trait DynInvoker: Send + Sync {
    async fn invoke_dyn(&self, args: serde_json::Value) -> Result<Outcome, ProbeError>;
    fn kind(&self) -> &str;
}

pub struct TypedInvoker<T: Invocable, I: Invoker<T>> {
    invoker: I,
    _marker: PhantomData<T>,
}

impl<T: Invocable, I: Invoker<T>> TypedInvoker<T, I> {
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Invocable, I: Invoker<T>> DynInvoker for TypedInvoker<T, I> {
    async fn invoke_dyn(&self, args: serde_json::Value) -> Result<Outcome, ProbeError> {
        let args: T = serde_json::from_value(args).map_err(|e| {
            ProbeError::invalid_input(format!("bad arguments for {}: {e}", T::KIND)).with_source(e)
        })?;
        self.invoker.invoke(args).await
    }

    fn kind(&self) -> &str {
        T::KIND
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Echo {
        pub word: String,
    }

    impl Invocable for Echo {
        const KIND: &'static str = "echo";
    }

    /// Succeeds unless the word is `fail`, which comes back as the failure reason.
    pub struct EchoInvoker;

    #[async_trait]
    impl Invoker<Echo> for EchoInvoker {
        async fn invoke(&self, args: Echo) -> Result<Outcome, ProbeError> {
            if args.word == "fail" {
                return Ok(Outcome::failure(args.word));
            }
            Ok(Outcome::success())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Count {
        pub n: u32,
    }

    impl Invocable for Count {
        const KIND: &'static str = "count";
    }

    pub struct CountInvoker;

    #[async_trait]
    impl Invoker<Count> for CountInvoker {
        async fn invoke(&self, _args: Count) -> Result<Outcome, ProbeError> {
            Ok(Outcome::success())
        }
    }
}
