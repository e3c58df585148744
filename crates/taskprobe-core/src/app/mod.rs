//! App - アプリケーション層
//!
//! ports を組み合わせてトリガー / ワーカーの振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **ProbeBuilder**: 組み立てと起動時検証
//! - **Probe**: 各エンドポイントの操作（HTTP 非依存）

pub mod builder;
pub mod eta;
pub mod gate;
pub mod origin;
pub mod probe;
pub mod sleep;
pub mod unstable;

pub use self::builder::{BuildError, ProbeBuilder};
pub use self::eta::{EtaOutcome, EtaReport};
pub use self::origin::{OriginReport, WhichService};
pub use self::probe::{Probe, paths};
pub use self::sleep::SleepReport;
pub use self::unstable::{INJECTED_FAILURE, injected_outcome};
