//! Errors - エラー型と分類
//!
//! ErrorKind が HTTP ステータスとプラットフォームのリトライ挙動を決めます。
//! - InvalidInput / Provenance: 4xx（リクエストはそこで終わり）
//! - Transport: 5xx（詳細を body に含め、リトライはプラットフォーム任せ）
//! - Configuration: 起動時のみ

use std::fmt;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unparsable required input.
    InvalidInput,
    /// A queue-only endpoint was called without accepted proof of queue delivery.
    Provenance,
    /// Enqueue failure, outbound call failure, non-2xx from a peer.
    Transport,
    /// Invalid startup configuration.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Provenance => "provenance",
            ErrorKind::Transport => "transport",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// ProbeError はドメインエラー
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProbeError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProbeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn provenance(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provenance, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Client-side errors are final; everything else may be retried by the platform.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidInput | ErrorKind::Provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = ProbeError::invalid_input("Missing sleep parameter");
        assert_eq!(err.to_string(), "Missing sleep parameter");
        assert!(err.is_client_error());
    }

    #[test]
    fn transport_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ProbeError::transport("POST failed").with_source(io);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.is_client_error());
        assert!(std::error::Error::source(&err).is_some());
    }
}
