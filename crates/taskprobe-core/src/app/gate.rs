//! Protected execution gate and the parameter-passing check.

use super::probe::{Probe, paths};
use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;
use crate::domain::payload::FormPayload;
use crate::domain::task::TaskHandle;

impl Probe {
    pub async fn trigger_protected(&self) -> Result<TaskHandle, ProbeError> {
        self.enqueue(paths::PROTECTED, FormPayload::new()).await
    }

    /// Only queue deliveries get through, as judged by the configured
    /// [`DeliveryVerifier`](crate::ports::DeliveryVerifier).
    ///
    /// A bare task header proves nothing unless the platform strips it from
    /// external traffic. App Engine does for `X-AppEngine-*`; a Cloud Tasks
    /// HTTP target does not, so that deployment needs the OIDC check. An
    /// ingress that forwards client headers untouched breaks the header-only
    /// variants; that stays an open question of the deployment.
    pub async fn protected(&self, attempt: &AttemptContext) -> Result<(), ProbeError> {
        if let Err(e) = self.verifier.verify(attempt).await {
            tracing::warn!(
                verifier = self.verifier.name(),
                task_name = attempt.task_name.as_deref().unwrap_or("-"),
                error = %e,
                "protected endpoint rejected the caller"
            );
            return Err(e);
        }
        tracing::info!(
            task_name = attempt.task_name.as_deref().unwrap_or("-"),
            "Doing secret stuff"
        );
        Ok(())
    }

    pub async fn trigger_params(&self) -> Result<TaskHandle, ProbeError> {
        self.enqueue(paths::PARAMS, FormPayload::new().with("name", "John Doe"))
            .await
    }

    pub fn params(&self, form: &FormPayload, attempt: &AttemptContext) {
        for (key, value) in form.iter() {
            tracing::info!(key, value, "form field");
        }
        for (name, value) in &attempt.headers {
            if name.eq_ignore_ascii_case("authorization") {
                tracing::info!(header = %name, value = "<redacted>", "header");
            } else {
                tracing::info!(header = %name, value = %value, "header");
            }
        }
    }
}
