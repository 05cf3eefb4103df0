// HTTP error handling
//
// The only place where the core error taxonomy turns into status codes.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use embytoalist_core::Error;
use embytoalist_providers::EmbyError;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Error::RangeNotSatisfiable { size } => Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::RANGE_NOT_SATISFIABLE.into_response()),
            Error::AuthDenied => {
                tracing::error!("link server returned 403, check the configured API key");
                (StatusCode::INTERNAL_SERVER_ERROR, "Link server authorization failed")
                    .into_response()
            }
            Error::Upstream { backend, message } => {
                tracing::error!("upstream error from {backend}: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Upstream error").into_response()
            }
            Error::Timeout(message) => {
                tracing::error!("upstream timeout: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Upstream timeout").into_response()
            }
            Error::CacheIo(message) => {
                tracing::error!("cache error: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            Error::ResolverLost => {
                tracing::error!("resolver task lost");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<EmbyError> for AppError {
    fn from(err: EmbyError) -> Self {
        Self(err.into())
    }
}

impl From<axum::http::Error> for AppError {
    fn from(err: axum::http::Error) -> Self {
        Self(Error::upstream("internal", err.to_string()))
    }
}
