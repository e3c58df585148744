//! taskprobe-server
//!
//! axum による HTTP アダプタ。ルーティング・入力の取り出し・ステータスの対応付けだけを行い、
//! 振る舞いはすべて `taskprobe_core::app::Probe` にあります。

pub mod error;
pub mod extract;
pub mod routes;

pub use self::error::ApiError;
pub use self::routes::{AppState, router};
