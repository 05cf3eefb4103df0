//! The per-request playback dispatcher.
//!
//! Decides, per byte range, whether to redirect the player to a signed
//! direct URL, serve bytes from the local range cache, or stream a splice of
//! cache and upstream while opportunistically populating the cache.

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::{
    body::Body,
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use futures_util::StreamExt;
use regex::Regex;

use embytoalist_core::cache::{classify, ByteStream, CacheStore, FragmentRange, FragmentWriter};
use embytoalist_core::models::{
    content_type, CacheRangeStatus, FileDescriptor, ItemDescriptor, ItemKind, RangeRequest,
};
use embytoalist_core::Error;
use embytoalist_proxy::{splice_body, Splice};

use crate::state::AppState;
use crate::warmup;

use super::error::AppResult;

/// Cache disposition reported to the client.
const CACHE_HEADER: &str = "X-EmbyToAList-Cache";

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Token="([^"]+)""#).expect("valid token pattern")
});

/// API key from query (`api_key`, `X-Emby-Token`) or the `Token="…"` field
/// of the `X-Emby-Authorization` header.
fn extract_api_key(params: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    if let Some(key) = params.get("api_key").or_else(|| params.get("X-Emby-Token")) {
        return Some(key.clone());
    }
    headers
        .get("X-Emby-Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| TOKEN_PATTERN.captures(auth))
        .map(|captures| captures[1].to_string())
}

fn found(url: &str) -> AppResult<Response> {
    Ok(Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, url)
        .body(Body::empty())?)
}

/// The common 206 header set; `Content-Range` covers `start..=end`.
fn partial_response(
    desc: &FileDescriptor,
    start: u64,
    end: u64,
    cache_tag: &str,
    body: Body,
) -> AppResult<Response> {
    Ok(Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type(&desc.container))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{}", desc.size),
        )
        .header(header::CONTENT_LENGTH, (end - start + 1).to_string())
        .header(header::CACHE_CONTROL, "private, no-transform, no-cache")
        .header(CACHE_HEADER, cache_tag)
        .body(body)?)
}

fn upstream_range(start: u64, end: Option<u64>, size: u64) -> String {
    match end {
        Some(end) => format!("bytes={start}-{}", end.min(size - 1)),
        None => format!("bytes={start}-"),
    }
}

/// Allocate the tee writer; cache failures never block the response.
async fn try_writer(
    store: &CacheStore,
    desc: &FileDescriptor,
    target: FragmentRange,
) -> Option<FragmentWriter> {
    match store.writer(desc, target).await {
        Ok(writer) => writer,
        Err(e) => {
            tracing::warn!("cache writer unavailable: {e}");
            None
        }
    }
}

pub async fn serve_video(
    State(state): State<AppState>,
    Path((item_id, _filename)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let api_key = extract_api_key(&params, &headers).unwrap_or_default();
    let media_source_id = params
        .get("MediaSourceId")
        .or_else(|| params.get("mediaSourceId"))
        .ok_or_else(|| Error::BadRequest("MediaSourceId is required".to_string()))?;

    let source = state
        .emby
        .playback_info(&item_id, media_source_id, &api_key)
        .await
        .map_err(Error::from)?;
    let item = state
        .emby
        .get_item(&item_id, &api_key)
        .await
        .map_err(Error::from)?
        .map(|item| ItemDescriptor::from_item(&item));

    let desc = FileDescriptor::from_source(&source, &state.mapper);
    tracing::info!(%item_id, mount_path = %desc.mount_path, "dispatching playback request");

    // Paths the operator keeps local never touch the link server: send the
    // player back to the metadata server under /preventRedirect.
    if state.mapper.bypass(&desc.mount_path) {
        let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
        let url = format!(
            "{}/preventRedirect{}{query}",
            state.config.emby_server,
            uri.path()
        );
        tracing::info!(%url, "bypassing link server");
        return found(&url);
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // Speculative: the URL is usually needed, and a discarded result still
    // warms the resolver cache.
    let link = state.resolver.spawn(desc.clone(), user_agent.clone());

    let Some(store) = state.store.clone() else {
        return found(&link.url().await?);
    };

    if state.config.cache_next_episode {
        if let Some(item) = item.as_ref().filter(|i| i.kind == ItemKind::Episode) {
            let _ = state.tasks.spawn(warmup::cache_next_episode(
                state.clone(),
                item.clone(),
                api_key.clone(),
                user_agent.clone(),
            ));
        }
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(RangeRequest::parse);
    let Some(range) = range else {
        tracing::debug!("no usable Range header, redirecting");
        return found(&link.url().await?);
    };

    if range.start >= desc.size {
        return Err(Error::RangeNotSatisfiable { size: desc.size }.into());
    }

    let classification = classify(&desc, &range);
    let end_eff = range.effective_end(desc.size);
    let force_reconnect = state.config.force_client_reconnect;

    // No target fragment means the cache is not involved at all.
    let Some(target) = classification.target else {
        return found(&link.url().await?);
    };

    match classification.status {
        CacheRangeStatus::NotCached => found(&link.url().await?),

        CacheRangeStatus::FullyCachedHead | CacheRangeStatus::FullyCachedTail => {
            let limit = end_eff - range.start + 1;
            if let Some(stream) = store.read(&desc, range.start, Some(limit)).await {
                let tag = match classification.status {
                    CacheRangeStatus::FullyCachedTail => "Hit_Tail",
                    _ => "Hit",
                };
                tracing::info!(tag, "serving from cache");
                return partial_response(&desc, range.start, end_eff, tag, from_cache(stream));
            }

            // fragment absent; only a request aligned with the whole target
            // fragment can populate it through a tee
            let covers_target = range.start == target.start && end_eff == target.end;

            if classification.status == CacheRangeStatus::FullyCachedHead && !covers_target {
                // a bounded head request cannot fill the head fragment
                return found(&link.url().await?);
            }

            let tee = if covers_target {
                try_writer(&store, &desc, target).await
            } else {
                None
            };
            let tag = match classification.status {
                CacheRangeStatus::FullyCachedTail => "Miss",
                _ => "Partial",
            };
            let budget = force_reconnect.then(|| Splice::reconnect_budget(tee.as_ref()));
            let body = splice_body(
                state.client.clone(),
                link,
                Splice {
                    prefix: None,
                    upstream_range: upstream_range(range.start, range.end, desc.size),
                    expected_status: StatusCode::PARTIAL_CONTENT,
                    user_agent,
                    tee,
                    reconnect_after: budget,
                },
            );
            partial_response(&desc, range.start, end_eff, tag, body)
        }

        CacheRangeStatus::PartiallyCachedHead => {
            let prefix_limit = target.end - range.start + 1;

            if let Some(prefix) = store.read(&desc, range.start, Some(prefix_limit)).await {
                // cached opening, then a single upstream request from the
                // cache frontier
                let budget = force_reconnect.then(|| Splice::reconnect_budget(None));
                let body = splice_body(
                    state.client.clone(),
                    link,
                    Splice {
                        prefix: Some(prefix),
                        upstream_range: upstream_range(target.end + 1, range.end, desc.size),
                        expected_status: StatusCode::PARTIAL_CONTENT,
                        user_agent,
                        tee: None,
                        reconnect_after: budget,
                    },
                );
                tracing::info!("serving spliced response from cache frontier");
                return partial_response(&desc, range.start, end_eff, "Hit", body);
            }

            // head miss: proxy from the requested start; only a stream
            // aligned with the fragment start can populate it
            let tee = if range.start == target.start {
                try_writer(&store, &desc, target).await
            } else {
                None
            };
            let budget = force_reconnect.then(|| Splice::reconnect_budget(tee.as_ref()));
            let body = splice_body(
                state.client.clone(),
                link,
                Splice {
                    prefix: None,
                    upstream_range: upstream_range(range.start, range.end, desc.size),
                    expected_status: StatusCode::PARTIAL_CONTENT,
                    user_agent,
                    tee,
                    reconnect_after: budget,
                },
            );
            partial_response(&desc, range.start, end_eff, "Partial", body)
        }
    }
}

/// Cache reads terminate cleanly on I/O errors, so the body stream is
/// infallible.
fn from_cache(stream: ByteStream) -> Body {
    Body::from_stream(stream.map(Ok::<_, std::convert::Infallible>))
}
