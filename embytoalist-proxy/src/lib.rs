//! Splice-streaming reverse proxy.
//!
//! Builds a response body that concatenates an optional local cache prefix
//! with an upstream range request, optionally teeing the upstream bytes into
//! a cache writer, and optionally tripping a forced reconnect once the
//! response has proxied far enough past the cache frontier.

use std::io;

use axum::body::Body;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE, RANGE, USER_AGENT};
use reqwest::StatusCode;

use embytoalist_core::cache::{ByteStream, FragmentWriter};
use embytoalist_core::resolver::LinkTask;

/// Upstream bytes allowed past the cache frontier before a forced reconnect.
pub const RECONNECT_GRACE: u64 = 1024 * 1024;

/// One splice-streamed response.
pub struct Splice {
    /// Local bytes served before the first upstream byte.
    pub prefix: Option<ByteStream>,
    /// Full `Range` header value for the upstream request.
    pub upstream_range: String,
    /// Status the upstream must answer with (206, or 200 for full-file).
    pub expected_status: StatusCode,
    /// Caller's user agent, forwarded upstream.
    pub user_agent: Option<String>,
    /// Cache writer fed a prefix of the upstream bytes.
    pub tee: Option<FragmentWriter>,
    /// Upstream byte budget; exceeding it terminates the response so the
    /// player reconnects and re-enters the dispatcher.
    pub reconnect_after: Option<u64>,
}

impl Splice {
    /// The reconnect budget for this splice when forced reconnects are on:
    /// a tee must first be allowed to fill its fragment, a prefix-only
    /// response gets the bare grace allowance.
    #[must_use]
    pub fn reconnect_budget(tee: Option<&FragmentWriter>) -> u64 {
        tee.map_or(RECONNECT_GRACE, |w| w.target().byte_len() + RECONNECT_GRACE)
    }
}

/// Build the streaming response body. The upstream URL is awaited from the
/// speculative resolver task only once the prefix is drained.
pub fn splice_body(client: reqwest::Client, link: LinkTask, splice: Splice) -> Body {
    Body::from_stream(merged_stream(client, link, splice))
}

fn merged_stream(
    client: reqwest::Client,
    link: LinkTask,
    splice: Splice,
) -> impl Stream<Item = Result<Bytes, io::Error>> {
    async_stream::stream! {
        let Splice {
            prefix,
            upstream_range,
            expected_status,
            user_agent,
            tee,
            reconnect_after,
        } = splice;
        let mut writer = tee;

        if let Some(mut prefix) = prefix {
            while let Some(chunk) = prefix.next().await {
                yield Ok(chunk);
            }
            tracing::debug!("local prefix exhausted, continuing from upstream");
        }

        let url = match link.url().await {
            Ok(url) => url,
            Err(e) => {
                abort_tee(writer.take()).await;
                tracing::error!("splice aborted, no upstream url: {e}");
                yield Err(io::Error::other(e.to_string()));
                return;
            }
        };

        let mut request = client.get(&url).header(RANGE, upstream_range.as_str());
        if let Some(ua) = user_agent.as_deref() {
            if let Ok(value) = HeaderValue::from_str(ua) {
                request = request.header(USER_AGENT, value);
            }
        }
        tracing::debug!(range = %upstream_range, "requesting upstream");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                abort_tee(writer.take()).await;
                tracing::error!("upstream request failed: {e}");
                yield Err(io::Error::other(e.to_string()));
                return;
            }
        };
        if let Err(e) = verify_upstream(&response, expected_status) {
            abort_tee(writer.take()).await;
            tracing::error!("upstream verification failed: {e}");
            yield Err(e);
            return;
        }

        let target_len = writer.as_ref().map(|w| w.target().byte_len());
        let mut teed: u64 = 0;
        let mut downloaded: u64 = 0;
        let mut upstream = response.bytes_stream();

        while let Some(next) = upstream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    abort_tee(writer.take()).await;
                    tracing::error!("upstream stream broke: {e}");
                    yield Err(io::Error::other(e.to_string()));
                    return;
                }
            };
            downloaded += chunk.len() as u64;

            if let Some(target) = target_len {
                if let Some(w) = writer.as_ref() {
                    if teed < target {
                        let take = ((target - teed).min(chunk.len() as u64)) as usize;
                        w.push(chunk.slice(0..take)).await;
                        teed += take as u64;
                    }
                }
                if teed >= target {
                    if let Some(w) = writer.take() {
                        if let Err(e) = w.close().await {
                            tracing::error!("cache write failed: {e}");
                        }
                    }
                }
            }

            yield Ok(chunk);

            if let Some(limit) = reconnect_after {
                if downloaded > limit {
                    abort_tee(writer.take()).await;
                    tracing::info!(downloaded, limit, "forcing client reconnect");
                    yield Err(io::Error::other("forced reconnect"));
                    return;
                }
            }
        }

        if let Some(w) = writer.take() {
            tracing::warn!("upstream ended before the cache fragment completed");
            w.abort().await;
        }
    }
}

async fn abort_tee(writer: Option<FragmentWriter>) {
    if let Some(writer) = writer {
        writer.abort().await;
    }
}

/// Reject upstream responses that cannot be spliced into the client stream:
/// wrong status, explicit range/bad-request failures, or a JSON error
/// envelope served from a file endpoint.
fn verify_upstream(response: &reqwest::Response, expected: StatusCode) -> Result<(), io::Error> {
    let status = response.status();

    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        let valid = response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        return Err(io::Error::other(format!(
            "upstream range not satisfiable (valid range {valid})"
        )));
    }
    if status == StatusCode::BAD_REQUEST {
        return Err(io::Error::other("upstream rejected the request as malformed"));
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(io::Error::other(format!("upstream returned {status}")));
    }

    let json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if json {
        return Err(io::Error::other("upstream answered with a JSON error envelope"));
    }

    if status != expected {
        return Err(io::Error::other(format!(
            "expected upstream status {expected}, got {status}"
        )));
    }
    Ok(())
}
