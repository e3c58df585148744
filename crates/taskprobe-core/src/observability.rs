//! Logging setup and span helpers.
//!
//! Filtering follows `RUST_LOG` and defaults to `info`.

use std::str::FromStr;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::domain::attempt::AttemptContext;
use crate::domain::errors::ProbeError;

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log collectors.
    Json,
    /// Human readable, for local runs.
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ProbeError::configuration(format!(
                "unknown log format '{other}' (expected json or pretty)"
            ))),
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Span for one worker execution.
///
/// ```rust
/// use taskprobe_core::domain::AttemptContext;
/// use taskprobe_core::observability::task_span;
///
/// let attempt = AttemptContext::delivery("task-1", 2);
/// let span = task_span("unstable", &attempt);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn task_span(operation: &str, attempt: &AttemptContext) -> Span {
    tracing::info_span!(
        "task",
        op = operation,
        task_name = attempt.task_name.as_deref().unwrap_or("-"),
        queue = attempt.queue_name.as_deref().unwrap_or("-"),
        retry_count = attempt.retry_ordinal(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Json);
        init_logging(LogFormat::Pretty);
    }
}
