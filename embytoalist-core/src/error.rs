use thiserror::Error;

use embytoalist_providers::{AlistError, EmbyError};

/// Error taxonomy of the dispatcher and its collaborators.
///
/// The HTTP adapter in the binary is the only place these become status
/// codes; everything below it returns `Result<T>`.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Requested range not satisfiable (size {size})")]
    RangeNotSatisfiable { size: u64 },

    #[error("Link server denied authorization")]
    AuthDenied,

    #[error("Upstream error from {backend}: {message}")]
    Upstream { backend: &'static str, message: String },

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    #[error("Resolver task was lost before completion")]
    ResolverLost,
}

impl Error {
    pub fn upstream(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            backend,
            message: message.into(),
        }
    }
}

impl From<AlistError> for Error {
    fn from(err: AlistError) -> Self {
        match err {
            AlistError::Api { code: 403, .. } => Self::AuthDenied,
            AlistError::Timeout(msg) => Self::Timeout(msg),
            other => Self::upstream("alist", other.to_string()),
        }
    }
}

impl From<EmbyError> for Error {
    fn from(err: EmbyError) -> Self {
        match err {
            EmbyError::Timeout(msg) => Self::Timeout(msg),
            other => Self::upstream("emby", other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::CacheIo(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
