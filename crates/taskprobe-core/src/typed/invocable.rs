//! Invocable trait - 遅延実行できる関数呼び出しの型
//!
//! # 学習ポイント
//! - Associated Constants (`const KIND`)
//! - enqueue 側と実行側が別プロセスでも、KIND だけで同じ実装にたどり着ける

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Invocable は「どの関数を、どの引数で」を型で表す
///
/// 実装する型そのものが引数の構造体になります。
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Ping { target: String }
///
/// impl Invocable for Ping {
///     const KIND: &'static str = "ping";
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize` / `DeserializeOwned`: タスク payload への保存と復元
/// - `Send + Sync + 'static`: Arc<dyn DynInvoker> に格納するため
pub trait Invocable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Dispatch key. Stable across deployments: changing it strands queued tasks.
    const KIND: &'static str;
}
