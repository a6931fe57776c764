use serde::Serialize;
use thiserror::Error;

/// Classified outcome of a failed backend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend does not handle this URL.
    Unsupported,
    RateLimited,
    Timeout,
    /// Backend-specific failure, e.g. an upstream service error.
    UpstreamError,
    /// Malformed request; never attributed to a real backend attempt.
    Invalid,
}

impl ErrorKind {
    pub fn retriable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::UpstreamError
        )
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[error("[{backend_id}] {message}")]
pub struct BackendError {
    pub backend_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(backend_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(backend_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend_id, ErrorKind::Unsupported, message)
    }

    pub fn rate_limited(backend_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend_id, ErrorKind::RateLimited, message)
    }

    pub fn timeout(backend_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend_id, ErrorKind::Timeout, message)
    }

    pub fn upstream(backend_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend_id, ErrorKind::UpstreamError, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new("request", ErrorKind::Invalid, message)
    }

    pub fn retriable(&self) -> bool {
        self.kind.retriable()
    }
}

/// Why a resolution run produced no descriptor.
#[derive(Debug, Error)]
pub enum ResolveFailure {
    /// The request itself was malformed; no backend was invoked.
    #[error("invalid request: {0}")]
    Invalid(BackendError),
    /// Every eligible backend was tried and all failed, in registry order.
    #[error("all {} attempted backends failed", .0.len())]
    Exhausted(Vec<BackendError>),
}

impl ResolveFailure {
    /// Uniform view over the per-backend failures, in attempt order.
    pub fn errors(&self) -> &[BackendError] {
        match self {
            Self::Invalid(err) => std::slice::from_ref(err),
            Self::Exhausted(errors) => errors,
        }
    }
}
