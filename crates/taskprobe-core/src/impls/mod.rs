//! Impls - ports の実装
//!
//! # キュー
//! - **InMemoryTaskQueue**: 記録のみ（テスト用）
//! - **LocalTaskQueue**: ローカルの再配送エミュレータ（開発用）
//! - **CloudTasksQueue**: Google Cloud Tasks（本番用）
//!
//! # その他
//! - **ReqwestPeerClient**: 他エンドポイントへの HTTP 呼び出し
//! - **ProcessEnvironment**: 環境変数から読む実行環境
//! - **TaskHeaderVerifier / OidcTokenVerifier**: キュー経由の配送かどうかの確認

pub mod cloud_tasks;
pub mod environment;
pub mod local;
pub mod memory;
pub mod peer;
pub mod provenance;
pub mod retry;

pub use self::cloud_tasks::{CloudTasksConfig, CloudTasksQueue, TokenSource};
pub use self::environment::ProcessEnvironment;
pub use self::local::{LocalDispatcher, LocalQueueSettings, LocalTaskQueue};
pub use self::memory::InMemoryTaskQueue;
pub use self::peer::ReqwestPeerClient;
pub use self::provenance::{OidcTokenVerifier, TaskHeaderVerifier};
pub use self::retry::RetryPolicy;
