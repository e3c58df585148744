//! [`DeliveryVerifier`] implementations.
//!
//! - [`TaskHeaderVerifier`] trusts a task-name header. Whether that is safe
//!   depends on the deployment: App Engine strips `X-AppEngine-*` from external
//!   requests, nothing strips `X-CloudTasks-*` on an HTTP target.
//! - [`OidcTokenVerifier`] checks the OIDC bearer Cloud Tasks attaches when the
//!   task carries an `oidcToken`, via Google's tokeninfo endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::attempt::{AttemptContext, headers};
use crate::domain::errors::ProbeError;
use crate::ports::DeliveryVerifier;

pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const REJECTED: &str = "Bad request";

/// Accepts any request carrying one of the given task-name headers.
#[derive(Debug, Clone)]
pub struct TaskHeaderVerifier {
    accepted: &'static [&'static str],
}

impl TaskHeaderVerifier {
    /// Either spelling. Only sound where nothing but the local emulator can
    /// reach the worker.
    pub fn any_spelling() -> Self {
        Self {
            accepted: &headers::TASK_NAME,
        }
    }

    /// Only `X-AppEngine-TaskName`.
    pub fn app_engine_only() -> Self {
        Self {
            accepted: &[headers::APP_ENGINE_TASK_NAME],
        }
    }
}

#[async_trait]
impl DeliveryVerifier for TaskHeaderVerifier {
    async fn verify(&self, attempt: &AttemptContext) -> Result<(), ProbeError> {
        if self.accepted.iter().any(|name| attempt.header(name).is_some()) {
            return Ok(());
        }
        if attempt.is_task_delivery() {
            tracing::warn!(
                accepted = ?self.accepted,
                "task header present but not one this deployment trusts"
            );
        }
        Err(ProbeError::provenance(REJECTED))
    }

    fn name(&self) -> &'static str {
        "task-header"
    }
}

/// Claims tokeninfo returns for a valid Google-signed ID token.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    #[serde(default)]
    email: Option<String>,
}

/// Requires a task-name header and a Google-signed ID token for the expected
/// audience and service account.
///
/// Signature and expiry are checked by the tokeninfo endpoint; this side only
/// compares the claims.
#[derive(Debug, Clone)]
pub struct OidcTokenVerifier {
    tokeninfo_url: String,
    audience: String,
    service_account_email: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OidcTokenVerifier {
    pub fn new(
        audience: impl Into<String>,
        service_account_email: impl Into<String>,
    ) -> Result<Self, ProbeError> {
        Self::with_tokeninfo_url(DEFAULT_TOKENINFO_URL, audience, service_account_email)
    }

    pub fn with_tokeninfo_url(
        tokeninfo_url: impl Into<String>,
        audience: impl Into<String>,
        service_account_email: impl Into<String>,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ProbeError::configuration(format!("failed to build http client: {e}")).with_source(e)
        })?;
        Ok(Self {
            tokeninfo_url: tokeninfo_url.into(),
            audience: audience.into(),
            service_account_email: service_account_email.into(),
            timeout: Duration::from_secs(10),
            client,
        })
    }

    async fn token_info(&self, token: &str) -> Result<Option<TokenInfo>, ProbeError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProbeError::transport(format!("tokeninfo request failed: {e}")).with_source(e))?;

        let status = response.status();
        if status.is_client_error() {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProbeError::transport(format!("tokeninfo answered {status}")));
        }
        let info = response.json().await.map_err(|e| {
            ProbeError::transport(format!("bad tokeninfo response: {e}")).with_source(e)
        })?;
        Ok(Some(info))
    }
}

#[async_trait]
impl DeliveryVerifier for OidcTokenVerifier {
    async fn verify(&self, attempt: &AttemptContext) -> Result<(), ProbeError> {
        if !attempt.is_task_delivery() {
            return Err(ProbeError::provenance(REJECTED));
        }
        let Some(token) = attempt
            .header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
        else {
            tracing::warn!("task header without a bearer token");
            return Err(ProbeError::provenance(REJECTED));
        };

        let Some(info) = self.token_info(token).await? else {
            tracing::warn!("bearer token rejected by tokeninfo");
            return Err(ProbeError::provenance(REJECTED));
        };
        if info.aud != self.audience {
            tracing::warn!(aud = %info.aud, expected = %self.audience, "token audience mismatch");
            return Err(ProbeError::provenance(REJECTED));
        }
        if info.email.as_deref() != Some(self.service_account_email.as_str()) {
            tracing::warn!(email = ?info.email, "token issued to another account");
            return Err(ProbeError::provenance(REJECTED));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "oidc-token"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use rstest::rstest;
    use std::collections::HashMap;

    const AUDIENCE: &str = "https://probe.example.com/";
    const ACCOUNT: &str = "tasks@probe-project.iam.gserviceaccount.com";

    async fn tokeninfo(Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
        let claims = match query.get("id_token").map(String::as_str) {
            Some("good") => serde_json::json!({ "aud": AUDIENCE, "email": ACCOUNT }),
            Some("other-aud") => serde_json::json!({ "aud": "https://elsewhere.example.com", "email": ACCOUNT }),
            Some("other-account") => serde_json::json!({ "aud": AUDIENCE, "email": "someone@example.com" }),
            Some("broken") => return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({}))),
            _ => return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "invalid_token" }))),
        };
        (StatusCode::OK, Json(claims))
    }

    async fn verifier() -> OidcTokenVerifier {
        let app = Router::new().route("/tokeninfo", get(tokeninfo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        OidcTokenVerifier::with_tokeninfo_url(format!("http://{addr}/tokeninfo"), AUDIENCE, ACCOUNT)
            .unwrap()
    }

    fn delivery_with(authorization: Option<&str>) -> AttemptContext {
        let mut pairs = vec![("X-CloudTasks-TaskName", "task-1")];
        if let Some(value) = authorization {
            pairs.push(("Authorization", value));
        }
        AttemptContext::from_header_pairs(pairs)
    }

    #[rstest]
    #[case("X-AppEngine-TaskName", true)]
    #[case("x-appengine-taskname", true)]
    #[case("X-CloudTasks-TaskName", false)]
    #[tokio::test]
    async fn app_engine_only_ignores_cloud_tasks_spelling(#[case] header: &str, #[case] ok: bool) {
        let attempt = AttemptContext::from_header_pairs([(header, "task-1")]);
        let result = TaskHeaderVerifier::app_engine_only().verify(&attempt).await;
        assert_eq!(result.is_ok(), ok);
    }

    #[rstest]
    #[case("X-AppEngine-TaskName")]
    #[case("X-CloudTasks-TaskName")]
    #[tokio::test]
    async fn any_spelling_accepts_both(#[case] header: &str) {
        let attempt = AttemptContext::from_header_pairs([(header, "task-1")]);
        assert!(TaskHeaderVerifier::any_spelling().verify(&attempt).await.is_ok());
    }

    #[tokio::test]
    async fn header_verifier_rejects_direct_calls() {
        let err = TaskHeaderVerifier::any_spelling()
            .verify(&AttemptContext::direct())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provenance);
        assert_eq!(err.message(), "Bad request");
    }

    #[tokio::test]
    async fn oidc_accepts_matching_token() {
        let verifier = verifier().await;
        assert!(verifier.verify(&delivery_with(Some("Bearer good"))).await.is_ok());
    }

    #[rstest]
    #[case(None)]
    #[case(Some("Basic good"))]
    #[case(Some("Bearer forged"))]
    #[case(Some("Bearer other-aud"))]
    #[case(Some("Bearer other-account"))]
    #[tokio::test]
    async fn oidc_rejects_missing_or_foreign_tokens(#[case] authorization: Option<&str>) {
        let verifier = verifier().await;
        let err = verifier.verify(&delivery_with(authorization)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provenance);
    }

    #[tokio::test]
    async fn oidc_requires_task_header_even_with_valid_token() {
        let verifier = verifier().await;
        let attempt = AttemptContext::from_header_pairs([("Authorization", "Bearer good")]);
        assert_eq!(
            verifier.verify(&attempt).await.unwrap_err().kind(),
            ErrorKind::Provenance
        );
    }

    #[tokio::test]
    async fn tokeninfo_outage_is_transport_error() {
        let verifier = verifier().await;
        let err = verifier
            .verify(&delivery_with(Some("Bearer broken")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
