//! Emby Client Error Types

use thiserror::Error;

const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Error)]
pub enum EmbyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Check HTTP response status before processing body.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, EmbyError> {
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(EmbyError::Http {
            status,
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

/// Deserialize a JSON body, refusing to buffer more than [`MAX_RESPONSE_BYTES`].
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, EmbyError> {
    if let Some(len) = resp.content_length() {
        if len > MAX_RESPONSE_BYTES as u64 {
            return Err(EmbyError::Parse(format!("response body too large: {len} bytes")));
        }
    }
    let body = resp.bytes().await?;
    if body.len() > MAX_RESPONSE_BYTES {
        return Err(EmbyError::Parse(format!(
            "response body too large: {} bytes",
            body.len()
        )));
    }
    Ok(serde_json::from_slice(&body)?)
}

impl From<reqwest::Error> for EmbyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EmbyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
