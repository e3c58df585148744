//! TaskNameGenerator port - タスク名の生成
//!
//! 本物のキュー基盤はタスク名を自分で割り当てます。
//! インメモリのバックエンドでは ULID ベースの名前をここで作ります。
//!
//! # 実装
//! - **UlidTaskNameGenerator**: Clock の時刻 + 乱数で ULID を作る

use crate::domain::ids::TaskId;
use crate::ports::Clock;
use ulid::Ulid;

/// TaskNameGenerator は一意なタスク名を払い出す
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 調整なしで複数プロセスから生成できる
pub trait TaskNameGenerator: Send + Sync {
    fn next_task_id(&self) -> TaskId;

    /// `task-<ulid>` 形式の名前
    fn next_name(&self) -> String {
        self.next_task_id().to_string()
    }
}

/// Clock を使って ULID を作るので、FixedClock を渡せば timestamp 部分が決定的になる
pub struct UlidTaskNameGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidTaskNameGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> TaskNameGenerator for UlidTaskNameGenerator<C> {
    fn next_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        TaskId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn names_are_unique_and_prefixed() {
        let generator = UlidTaskNameGenerator::new(SystemClock);
        let a = generator.next_name();
        let b = generator.next_name();
        assert_ne!(a, b);
        assert!(a.starts_with("task-"));
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let generator = UlidTaskNameGenerator::new(FixedClock::new(fixed_time));

        let id1 = generator.next_task_id();
        let id2 = generator.next_task_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
