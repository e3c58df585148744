//! InMemoryTaskQueue - 記録するだけのキュー
//!
//! 配送はしません。テストでは「何が何件積まれたか」を確認するのに使い、
//! `--queue-backend memory` ではトリガーだけを試すのに使います。
//! 記録は直近 [`DEFAULT_RETAINED_TASKS`] 件まで。古いものから捨てます。

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::task::{TaskHandle, TaskRequest};
use crate::ports::{Clock, QueueError, SystemClock, TaskNameGenerator, TaskQueue, UlidTaskNameGenerator};

pub const DEFAULT_RETAINED_TASKS: usize = 10_000;

fn poison_err<T>(_: PoisonError<T>) -> QueueError {
    QueueError::Transport("task queue lock poisoned".to_string())
}

pub struct InMemoryTaskQueue {
    clock: Arc<dyn Clock>,
    names: Box<dyn TaskNameGenerator>,
    tasks: RwLock<VecDeque<TaskHandle>>,
    retain: usize,
    /// When set, every enqueue is rejected with this message.
    reject_with: Option<String>,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            names: Box::new(UlidTaskNameGenerator::new(Arc::clone(&clock))),
            clock,
            tasks: RwLock::new(VecDeque::new()),
            retain: DEFAULT_RETAINED_TASKS,
            reject_with: None,
        }
    }

    /// Keep at most `retain` handles (at least one).
    pub fn retaining(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// A queue whose every enqueue fails, for exercising error paths.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            reject_with: Some(message.into()),
            ..Self::new()
        }
    }

    /// Retained tasks, oldest first.
    pub fn tasks(&self) -> Vec<TaskHandle> {
        self.tasks
            .read()
            .map(|tasks| tasks.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the retained tasks.
    pub fn take_all(&self) -> Vec<TaskHandle> {
        self.tasks
            .write()
            .map(|mut tasks| tasks.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskHandle, QueueError> {
        if let Some(message) = &self.reject_with {
            return Err(QueueError::Rejected {
                status: 503,
                message: message.clone(),
            });
        }
        let handle = TaskHandle::for_request(self.names.next_name(), &request, self.clock.now());
        {
            let mut tasks = self.tasks.write().map_err(poison_err)?;
            if tasks.len() >= self.retain {
                tasks.pop_front();
            }
            tasks.push_back(handle.clone());
        }
        tracing::debug!(task_name = %handle.name, path = %handle.path, "recorded task");
        Ok(handle)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
