//! ServiceEnvironment port - 実行環境の自己紹介

use crate::domain::identity::{IdentitySnapshot, ServiceIdentity};

/// ServiceEnvironment は「いまこのリクエストを実行しているのは誰か」を答える
pub trait ServiceEnvironment: Send + Sync {
    /// Service name, host and instance of the running process.
    fn identity(&self) -> ServiceIdentity;

    /// Full snapshot for the request identified by `request_id`.
    fn snapshot(&self, request_id: &str) -> IdentitySnapshot;
}
