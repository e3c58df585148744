//! Runtime configuration.
//!
//! The binary fills [`ProbeConfig`] from flags and environment; the library
//! only validates it and derives URLs from it.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::duration::duration_text;
use crate::domain::errors::ProbeError;
use crate::impls::RetryPolicy;
use crate::observability::LogFormat;

pub const DEFAULT_QUEUE_NAME: &str = "slow-queue";
pub const DEFAULT_OUTBOUND_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deployment {
    #[default]
    Local,
    Production,
}

impl FromStr for Deployment {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(ProbeError::configuration(format!(
                "unknown deployment '{other}' (expected local or production)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueBackend {
    /// Record tasks, deliver nothing.
    Memory,
    /// Deliver tasks back to this process with platform-like retries.
    #[default]
    Local,
    /// Google Cloud Tasks.
    CloudTasks,
}

impl FromStr for QueueBackend {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "local" => Ok(Self::Local),
            "cloud-tasks" => Ok(Self::CloudTasks),
            other => Err(ProbeError::configuration(format!(
                "unknown queue backend '{other}' (expected memory, local or cloud-tasks)"
            ))),
        }
    }
}

/// Redelivery policy of the local emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    #[serde(with = "duration_text")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "duration_text")]
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.base_delay,
            multiplier: self.multiplier,
            max_delay: self.max_delay,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudTasksSettings {
    pub project_id: String,
    pub location: String,
    /// Public base URL the platform should POST tasks to.
    pub target_base_url: Option<String>,
    pub service_account_email: Option<String>,
    /// Static bearer token. Without it Application Default Credentials are used.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Override of `https://cloudtasks.googleapis.com`.
    pub api_base_url: Option<String>,
}

/// Values reported by the identity probe.
///
/// Unset fields fall back to the usual platform environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    pub app_id: Option<String>,
    pub service_name: Option<String>,
    pub version_id: Option<String>,
    pub instance_id: Option<String>,
    pub datacenter: Option<String>,
    pub default_version_host_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub bind_addr: SocketAddr,
    pub deployment: Deployment,
    /// Where the sleep worker lives. Locally it defaults to this process.
    pub sleep_base_url: Option<String>,
    pub queue_name: String,
    #[serde(with = "duration_text")]
    pub outbound_timeout: Duration,
    pub queue_backend: QueueBackend,
    pub retry: RetrySettings,
    pub cloud_tasks: CloudTasksSettings,
    pub identity: IdentitySettings,
    pub log_format: LogFormat,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            deployment: Deployment::Local,
            sleep_base_url: None,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            outbound_timeout: DEFAULT_OUTBOUND_TIMEOUT,
            queue_backend: QueueBackend::Local,
            retry: RetrySettings::default(),
            cloud_tasks: CloudTasksSettings::default(),
            identity: IdentitySettings::default(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ProbeConfig {
    /// Fail fast on settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.queue_name.trim().is_empty() {
            return Err(ProbeError::configuration("queue name cannot be empty"));
        }
        if self.outbound_timeout.is_zero() {
            return Err(ProbeError::configuration(
                "outbound timeout must be greater than zero",
            ));
        }
        self.sleep_base_url()?;

        if self.queue_backend == QueueBackend::Local {
            if self.retry.max_attempts == 0 {
                return Err(ProbeError::configuration("max attempts must be at least 1"));
            }
            if self.retry.multiplier < 1.0 {
                return Err(ProbeError::configuration(
                    "retry multiplier must be at least 1.0",
                ));
            }
        }

        if self.queue_backend == QueueBackend::CloudTasks {
            let ct = &self.cloud_tasks;
            if ct.project_id.is_empty() {
                return Err(ProbeError::configuration(
                    "cloud tasks project id cannot be empty",
                ));
            }
            if ct.location.is_empty() {
                return Err(ProbeError::configuration(
                    "cloud tasks location cannot be empty",
                ));
            }
            if ct.target_base_url.as_deref().is_none_or(str::is_empty) {
                return Err(ProbeError::configuration(
                    "cloud tasks needs the public base url of this service",
                ));
            }
        }
        Ok(())
    }

    /// Base URL of the sleep worker, without trailing slash.
    pub fn sleep_base_url(&self) -> Result<String, ProbeError> {
        let base = match (&self.sleep_base_url, self.deployment) {
            (Some(url), _) => url.clone(),
            (None, Deployment::Local) => self.local_delivery_base_url(),
            (None, Deployment::Production) => {
                return Err(ProbeError::configuration(
                    "sleep base url is required in production",
                ));
            }
        };
        let parsed = url::Url::parse(&base).map_err(|e| {
            ProbeError::configuration(format!("invalid sleep base url '{base}': {e}")).with_source(e)
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProbeError::configuration(format!(
                "sleep base url must be http(s): {base}"
            )));
        }
        Ok(base.trim_end_matches('/').to_string())
    }

    pub fn sleep_url(&self) -> Result<String, ProbeError> {
        Ok(format!("{}/sleep", self.sleep_base_url()?))
    }

    /// Base URL the local emulator delivers to: this very process.
    pub fn local_delivery_base_url(&self) -> String {
        let port = self.bind_addr.port();
        if self.bind_addr.ip().is_unspecified() {
            format!("http://127.0.0.1:{port}")
        } else {
            format!("http://{}", self.bind_addr)
        }
    }
}
