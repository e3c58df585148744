//! Google Cloud Tasks queue.
//!
//! Creates HTTP tasks through the Cloud Tasks REST API (`v2/{queue}/tasks`).
//! The platform assigns task names, applies its own retry policy and sends the
//! `X-CloudTasks-*` headers on every delivery.
//!
//! Access tokens come from Application Default Credentials through `gcp_auth`
//! (service account key, gcloud user, or the metadata server), which also
//! refreshes them. A fixed token is accepted for tests and emulators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use gcp_auth::TokenProvider;
use serde::{Deserialize, Serialize};

use crate::domain::task::{TaskHandle, TaskRequest};
use crate::ports::{QueueError, TaskQueue};

pub const DEFAULT_API_BASE_URL: &str = "https://cloudtasks.googleapis.com";

const CLOUD_TASKS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-tasks"];

#[derive(Debug, Clone)]
pub struct CloudTasksConfig {
    pub project_id: String,
    pub location: String,
    /// Public base URL of this service; task paths are appended to it.
    pub target_base_url: String,
    pub service_account_email: Option<String>,
    pub api_base_url: String,
    /// How long the platform waits for a worker to answer.
    pub dispatch_deadline: Duration,
    /// Timeout of the API call itself.
    pub request_timeout: Duration,
}

impl CloudTasksConfig {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        target_base_url: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            target_base_url: target_base_url.into(),
            service_account_email: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            dispatch_deadline: Duration::from_secs(600),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn queue_path(&self, queue_name: &str) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, queue_name
        )
    }
}

/// Where bearer tokens come from.
pub enum TokenSource {
    /// Fixed token, sent as is. It is never refreshed, so it suits tests and
    /// emulators rather than long runs.
    Static(String),
    /// Application Default Credentials.
    Provider(Arc<dyn TokenProvider>),
}

impl TokenSource {
    /// Discover credentials from the environment.
    pub async fn from_environment() -> Result<Self, QueueError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| QueueError::Credentials(format!("failed to initialize GCP auth: {e}")))?;
        Ok(Self::Provider(provider))
    }

    async fn token(&self) -> Result<String, QueueError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Provider(provider) => {
                let token = provider.token(CLOUD_TASKS_SCOPES).await.map_err(|e| {
                    QueueError::Credentials(format!("failed to get GCP access token: {e}"))
                })?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

/// Cloud Tasks API request body for creating a task.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    task: CloudTask,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudTask {
    http_request: HttpRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule_time: Option<String>,
    dispatch_deadline: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequest {
    url: String,
    http_method: &'static str,
    headers: HashMap<&'static str, &'static str>,
    /// Base64 encoded.
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_token: Option<OidcToken>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OidcToken {
    service_account_email: String,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksErrorResponse {
    error: CloudTasksError,
}

#[derive(Debug, Deserialize)]
struct CloudTasksError {
    message: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksSuccessResponse {
    name: String,
}

/// Formats a duration the way the Cloud Tasks API expects (`"600s"`, `"1.5s"`).
fn format_api_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        return format!("{secs}s");
    }
    let mut fractional = format!("{nanos:09}");
    while fractional.ends_with('0') {
        fractional.pop();
    }
    format!("{secs}.{fractional}s")
}

pub struct CloudTasksQueue {
    config: CloudTasksConfig,
    tokens: TokenSource,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudTasksQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTasksQueue")
            .field("config", &self.config)
            .field("tokens", &"<TokenSource>")
            .finish()
    }
}

impl CloudTasksQueue {
    pub fn new(config: CloudTasksConfig, tokens: TokenSource) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueueError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            config,
            tokens,
            client,
        })
    }

    fn build_request(&self, request: &TaskRequest) -> CreateTaskRequest {
        let url = format!(
            "{}{}",
            self.config.target_base_url.trim_end_matches('/'),
            request.path
        );
        let oidc_token = self
            .config
            .service_account_email
            .as_ref()
            .map(|email| OidcToken {
                service_account_email: email.clone(),
                audience: self.config.target_base_url.clone(),
            });

        CreateTaskRequest {
            task: CloudTask {
                http_request: HttpRequest {
                    url,
                    http_method: "POST",
                    headers: HashMap::from([(
                        "Content-Type",
                        "application/x-www-form-urlencoded",
                    )]),
                    body: base64::engine::general_purpose::STANDARD
                        .encode(request.payload.encode()),
                    oidc_token,
                },
                schedule_time: request
                    .eta
                    .map(|eta| eta.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
                dispatch_deadline: format_api_duration(self.config.dispatch_deadline),
            },
        }
    }
}

#[async_trait]
impl TaskQueue for CloudTasksQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskHandle, QueueError> {
        let queue_path = self.config.queue_path(&request.queue_name);
        let body = self.build_request(&request);
        let access_token = self.tokens.token().await?;

        let api_url = format!(
            "{}/v2/{}/tasks",
            self.config.api_base_url.trim_end_matches('/'),
            queue_path
        );
        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueueError::Transport(format!("Cloud Tasks API request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let created: CloudTasksSuccessResponse = response.json().await.map_err(|e| {
                QueueError::Transport(format!("failed to parse Cloud Tasks response: {e}"))
            })?;
            tracing::info!(
                task_name = %created.name,
                path = %request.path,
                queue = %request.queue_name,
                "task created"
            );
            return Ok(TaskHandle::for_request(
                created.name,
                &request,
                chrono::Utc::now(),
            ));
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = match serde_json::from_str::<CloudTasksErrorResponse>(&error_body) {
            Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.status),
            Err(_) => error_body,
        };
        Err(QueueError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn backend(&self) -> &'static str {
        "cloud-tasks"
    }
}
