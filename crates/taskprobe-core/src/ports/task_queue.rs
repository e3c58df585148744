//! TaskQueue port - プラットフォームのキュー
//!
//! トリガー系の操作はすべてこの trait 経由でタスクを積みます。
//! どのバックエンドでも「1 回の enqueue で 1 タスク」が前提です。
//!
//! # 実装
//! - **InMemoryTaskQueue**: 記録だけ（テスト・配送なし）
//! - **LocalTaskQueue**: ローカルの再配送エミュレータ
//! - **CloudTasksQueue**: Cloud Tasks REST API

use async_trait::async_trait;

use crate::domain::errors::ProbeError;
use crate::domain::task::{TaskHandle, TaskRequest};

/// QueueError は enqueue の失敗
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue API answered with an error status.
    #[error("queue rejected task ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The queue could not be reached.
    #[error("queue unreachable: {0}")]
    Transport(String),

    /// Credentials for the queue API could not be obtained.
    #[error("queue credentials unavailable: {0}")]
    Credentials(String),

    /// The queue has been shut down and accepts nothing.
    #[error("queue is closed")]
    Closed,
}

impl From<QueueError> for ProbeError {
    fn from(err: QueueError) -> Self {
        ProbeError::transport(format!("enqueue failed: {err}")).with_source(err)
    }
}

/// TaskQueue は POST 先のパスとフォーム payload を持つタスクを積む
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskHandle, QueueError>;

    /// Backend label for logs.
    fn backend(&self) -> &'static str;
}
