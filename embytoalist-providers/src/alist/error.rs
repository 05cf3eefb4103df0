//! Alist Client Error Types

use thiserror::Error;

/// Largest JSON body the client is willing to buffer.
const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Error)]
pub enum AlistError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("API error (code {code}): {message}")]
    Api { code: u64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// Check HTTP response status before processing body.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, AlistError> {
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(AlistError::Http {
            status,
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

/// Deserialize a JSON body, refusing to buffer more than [`MAX_RESPONSE_BYTES`].
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, AlistError> {
    if let Some(len) = resp.content_length() {
        if len > MAX_RESPONSE_BYTES as u64 {
            return Err(AlistError::Parse(format!("response body too large: {len} bytes")));
        }
    }
    let body = resp.bytes().await?;
    if body.len() > MAX_RESPONSE_BYTES {
        return Err(AlistError::Parse(format!(
            "response body too large: {} bytes",
            body.len()
        )));
    }
    Ok(serde_json::from_slice(&body)?)
}

impl From<reqwest::Error> for AlistError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AlistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for AlistError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}
