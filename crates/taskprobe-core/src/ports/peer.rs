//! PeerClient port - 他のエンドポイントへの同期 HTTP 呼び出し

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::ProbeError;
use crate::domain::payload::FormPayload;

/// Status and body of a peer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerResponse {
    pub status: u16,
    pub body: String,
}

impl PeerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// PeerClient posts a form and returns whatever the peer answered.
///
/// Transport failures (connect, timeout) are `Err`; any HTTP status, 2xx or
/// not, is `Ok` and left to the caller to judge. Every call carries an
/// explicit timeout.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        form: &FormPayload,
        timeout: Duration,
    ) -> Result<PeerResponse, ProbeError>;
}
