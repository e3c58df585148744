//! LocalTaskQueue - プラットフォームの再配送をローカルで再現するキュー
//!
//! 積まれたタスクを期限順のヒープで持ち、dispatcher ループが期限の来たものを
//! `POST <base_url><path>` で配送します。ヘッダは Cloud Tasks と同じ名前で付けます。
//!
//! - 2xx 以外と通信エラーは RetryPolicy の遅延で再スケジュール（retry count + 1）
//! - `max_attempts` 回失敗したタスクはエラーログを出して捨てる
//! - ETA があれば最初の配送はその時刻以降
//!
//! 永続化はしません。プロセスが落ちれば積まれていたタスクも消えます。

use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use super::retry::RetryPolicy;
use crate::domain::attempt::headers;
use crate::domain::task::{TaskHandle, TaskRequest};
use crate::ports::{Clock, QueueError, TaskNameGenerator, TaskQueue, UlidTaskNameGenerator};

#[derive(Debug, Clone)]
pub struct LocalQueueSettings {
    /// Base URL deliveries are sent to, usually this process.
    pub base_url: String,
    pub policy: RetryPolicy,
    /// Deliveries per task, first one included.
    pub max_attempts: u32,
    pub delivery_timeout: Duration,
}

#[derive(Debug, Clone)]
struct PendingTask {
    handle: TaskHandle,
    retry_count: u32,
    execution_count: u32,
    scheduled_for: DateTime<Utc>,
}

/// Heap entry. Reverse ordering makes BinaryHeap a min-heap (earliest first),
/// `seq` keeps FIFO order among equal due times.
#[derive(Debug)]
struct ScheduledTask {
    due: Instant,
    seq: u64,
    task: PendingTask,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared {
    settings: LocalQueueSettings,
    clock: Arc<dyn Clock>,
    names: Box<dyn TaskNameGenerator>,
    client: reqwest::Client,
    heap: Mutex<BinaryHeap<ScheduledTask>>,
    notify: Notify,
    seq: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    async fn schedule(&self, task: PendingTask) {
        let wait = (task.scheduled_for - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let entry = ScheduledTask {
            due: Instant::now() + wait,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            task,
        };
        self.heap.lock().await.push(entry);
        self.notify.notify_one();
    }
}

/// Queue handle. Cheap to clone.
#[derive(Clone)]
pub struct LocalTaskQueue {
    shared: Arc<Shared>,
}

/// Dispatcher handle.
/// - `shutdown_and_join()` で dispatcher を止めて終了を待つ
/// - 配送中のリクエストは中断される
pub struct LocalDispatcher {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl LocalDispatcher {
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

impl LocalTaskQueue {
    /// Build the queue and spawn its dispatcher on the current runtime.
    pub fn start(
        settings: LocalQueueSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, LocalDispatcher), QueueError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| QueueError::Transport(format!("failed to build http client: {e}")))?;

        let shared = Arc::new(Shared {
            names: Box::new(UlidTaskNameGenerator::new(Arc::clone(&clock))),
            clock,
            settings,
            client,
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(dispatch_loop(Arc::clone(&shared), shutdown_rx));

        Ok((Self { shared }, LocalDispatcher { shutdown_tx, join }))
    }

    /// Tasks waiting for their due time, in-flight deliveries excluded.
    pub async fn pending(&self) -> usize {
        self.shared.heap.lock().await.len()
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskHandle, QueueError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        let now = self.shared.clock.now();
        let handle = TaskHandle::for_request(self.shared.names.next_name(), &request, now);
        let scheduled_for = request.eta.unwrap_or(now);

        tracing::info!(
            task_name = %handle.name,
            path = %handle.path,
            queue = %handle.queue_name,
            eta = %scheduled_for.to_rfc3339(),
            "task enqueued locally"
        );

        self.shared
            .schedule(PendingTask {
                handle: handle.clone(),
                retry_count: 0,
                execution_count: 0,
                scheduled_for,
            })
            .await;
        Ok(handle)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

async fn dispatch_loop(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut in_flight = JoinSet::new();

    loop {
        while in_flight.try_join_next().is_some() {}

        if *shutdown_rx.borrow() {
            break;
        }

        let next_due = shared.heap.lock().await.peek().map(|entry| entry.due);

        match next_due {
            Some(due) if due <= Instant::now() => {
                let Some(entry) = shared.heap.lock().await.pop() else {
                    continue;
                };
                in_flight.spawn(deliver(Arc::clone(&shared), entry.task));
            }
            Some(due) => {
                tokio::select! {
                    changed = shutdown_rx.changed() => if changed.is_err() { break },
                    _ = shared.notify.notified() => {}
                    _ = tokio::time::sleep_until(due) => {}
                }
            }
            None => {
                tokio::select! {
                    changed = shutdown_rx.changed() => if changed.is_err() { break },
                    _ = shared.notify.notified() => {}
                }
            }
        }
    }

    shared.closed.store(true, Ordering::Release);
    let dropped = shared.heap.lock().await.len();
    if !in_flight.is_empty() || dropped > 0 {
        tracing::warn!(
            in_flight = in_flight.len(),
            pending = dropped,
            "local queue stopping; undelivered tasks are lost"
        );
    }
    in_flight.shutdown().await;
}

/// Seconds since the epoch with microseconds, as the platform sends it.
fn eta_header_value(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

async fn deliver(shared: Arc<Shared>, task: PendingTask) {
    let settings = &shared.settings;
    let handle = &task.handle;
    let url = format!("{}{}", settings.base_url.trim_end_matches('/'), handle.path);

    let result = shared
        .client
        .post(&url)
        .timeout(settings.delivery_timeout)
        .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(headers::CLOUD_TASKS_TASK_NAME, handle.name.as_str())
        .header(headers::CLOUD_TASKS_QUEUE_NAME, handle.queue_name.as_str())
        .header(headers::CLOUD_TASKS_RETRY_COUNT, task.retry_count.to_string())
        .header(
            headers::CLOUD_TASKS_EXECUTION_COUNT,
            task.execution_count.to_string(),
        )
        .header(headers::CLOUD_TASKS_TASK_ETA, eta_header_value(task.scheduled_for))
        .body(handle.payload.encode())
        .send()
        .await;

    let (failure, reached_handler) = match result {
        Ok(response) if response.status().is_success() => {
            tracing::info!(
                task_name = %handle.name,
                retry_count = task.retry_count,
                status = response.status().as_u16(),
                "task delivered"
            );
            return;
        }
        Ok(response) => (format!("handler answered {}", response.status()), true),
        Err(e) => (format!("delivery failed: {e}"), false),
    };

    let attempts = task.retry_count + 1;
    if attempts >= settings.max_attempts {
        tracing::error!(
            task_name = %handle.name,
            attempts,
            reason = %failure,
            "giving up on task"
        );
        return;
    }

    let delay = settings.policy.next_delay(attempts);
    tracing::warn!(
        task_name = %handle.name,
        retry_count = task.retry_count,
        reason = %failure,
        delay_ms = delay.as_millis() as u64,
        "task will be retried"
    );

    let next = PendingTask {
        retry_count: attempts,
        execution_count: task.execution_count + u32::from(reached_handler),
        scheduled_for: shared.clock.now()
            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()),
        handle: task.handle,
    };
    if !shared.closed.load(Ordering::Acquire) {
        shared.schedule(next).await;
    }
}
