//! Ports - 抽象化レイヤー
//!
//! 外部システム（キュー基盤、実行環境、他サービス、時計）への
//! インターフェースを trait として定義し、実装の詳細を隠蔽します。

pub mod clock;
pub mod environment;
pub mod peer;
pub mod provenance;
pub mod task_name;
pub mod task_queue;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::environment::ServiceEnvironment;
pub use self::peer::{PeerClient, PeerResponse};
pub use self::provenance::DeliveryVerifier;
pub use self::task_name::{TaskNameGenerator, UlidTaskNameGenerator};
pub use self::task_queue::{QueueError, TaskQueue};
