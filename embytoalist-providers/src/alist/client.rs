//! Alist HTTP Client

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Client,
};
use serde_json::json;

use super::error::{check_response, json_with_limit, AlistError};
use super::types::{AlistResp, FsGetData};

/// Per-call timeout for the `/api/fs/get` POST. The shared client carries no
/// total timeout (it also serves long-lived streaming requests).
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Alist HTTP Client
///
/// Thin wrapper over the process-wide pooled client; one instance per
/// configured link server.
pub struct AlistClient {
    host: String,
    token: String,
    client: Client,
}

impl AlistClient {
    /// Create a new Alist client on top of the shared connection pool.
    pub fn new(host: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            client,
        }
    }

    /// Get current host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build request headers
    fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, AlistError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&self.token)?);
        if let Some(ua) = user_agent {
            headers.insert(USER_AGENT, HeaderValue::from_str(ua)?);
        }
        Ok(headers)
    }

    /// Get file information for a link path.
    ///
    /// On `code == 200` the returned data carries the signed `raw_url`.
    /// `code == 403` surfaces as `AlistError::Api { code: 403, .. }` so the
    /// caller can map it to an auth failure.
    pub async fn fs_get(
        &self,
        path: &str,
        user_agent: Option<&str>,
    ) -> Result<FsGetData, AlistError> {
        let url = format!("{}/api/fs/get", self.host);
        let body = json!({
            "path": path,
            "password": "",
        });

        let response = self
            .client
            .post(&url)
            .timeout(API_TIMEOUT)
            .headers(self.build_headers(user_agent)?)
            .json(&body)
            .send()
            .await?;

        let response = check_response(response)?;
        let resp: AlistResp<FsGetData> = json_with_limit(response).await?;

        if resp.code != 200 {
            return Err(AlistError::Api {
                code: resp.code,
                message: resp.message,
            });
        }

        resp.data
            .ok_or_else(|| AlistError::Parse("Missing data in fs_get response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> Client {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("client")
    }

    #[test]
    fn test_client_host_preserved() {
        let client = AlistClient::new("https://alist.example.com:5244", "tok", test_client());
        assert_eq!(client.host(), "https://alist.example.com:5244");
    }

    #[test]
    fn test_alist_resp_deserialize_success() {
        let json = r#"{"code": 200, "message": "success", "data": {"name": "a.mkv", "size": 9, "is_dir": false, "raw_url": "https://cdn.example.com/a.mkv"}}"#;
        let resp: AlistResp<FsGetData> = serde_json::from_str(json).expect("parse");
        assert_eq!(resp.code, 200);
        let data = resp.data.expect("data");
        assert_eq!(data.raw_url, "https://cdn.example.com/a.mkv");
        assert!(!data.is_dir);
    }

    #[test]
    fn test_alist_resp_deserialize_no_data() {
        let json = r#"{"code": 403, "message": "forbidden", "data": null}"#;
        let resp: AlistResp<FsGetData> = serde_json::from_str(json).expect("parse");
        assert_eq!(resp.code, 403);
        assert!(resp.data.is_none());
    }

    #[tokio::test]
    async fn test_fs_get_returns_raw_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .and(header("Authorization", "alist-token"))
            .and(body_json(json!({"path": "/movies/a.mkv", "password": ""})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "message": "success",
                "data": {
                    "name": "a.mkv",
                    "size": 1000,
                    "is_dir": false,
                    "raw_url": "https://cdn.example.com/signed/a.mkv"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AlistClient::new(server.uri(), "alist-token", test_client());
        let data = client
            .fs_get("/movies/a.mkv", Some("VLC/3.0"))
            .await
            .expect("fs_get");
        assert_eq!(data.raw_url, "https://cdn.example.com/signed/a.mkv");
    }

    #[tokio::test]
    async fn test_fs_get_api_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 403,
                "message": "forbidden",
                "data": null
            })))
            .mount(&server)
            .await;

        let client = AlistClient::new(server.uri(), "bad-token", test_client());
        let err = client.fs_get("/movies/a.mkv", None).await.expect_err("err");
        match err {
            AlistError::Api { code, .. } => assert_eq!(code, 403),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fs_get_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = AlistClient::new(server.uri(), "tok", test_client());
        let err = client.fs_get("/movies/a.mkv", None).await.expect_err("err");
        assert!(matches!(err, AlistError::Http { .. }));
    }
}
