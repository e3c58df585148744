//! DeliveryVerifier port - リクエストがキューから来たことの確認
//!
//! タスク名ヘッダーが外部から偽装できるかどうかは配備先次第です。
//! どのヘッダー（あるいはトークン）を証拠として認めるかは実装側が決めます。

use async_trait::async_trait;

use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;

/// Decides whether a request was delivered by the queue platform.
///
/// A rejection is a `Provenance` error; failing to reach whatever backs the
/// check is a `Transport` error.
#[async_trait]
pub trait DeliveryVerifier: Send + Sync {
    async fn verify(&self, attempt: &AttemptContext) -> Result<(), ProbeError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}
