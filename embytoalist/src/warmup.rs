//! Next-episode head warmup.
//!
//! When an episode starts playing, the following episode's opening window is
//! fetched into the cache in the background so its first seconds are served
//! locally. Failures are logged and swallowed; the foreground response never
//! depends on this task.

use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;

use embytoalist_core::cache::{head_fragment, FragmentRange, FragmentWriter};
use embytoalist_core::models::{FileDescriptor, ItemDescriptor, ItemKind};

use crate::state::AppState;

pub async fn cache_next_episode(
    state: AppState,
    item: ItemDescriptor,
    api_key: String,
    user_agent: Option<String>,
) {
    if item.kind != ItemKind::Episode {
        return;
    }
    let Some(store) = state.store.clone() else { return };
    let (Some(series_id), Some(season_id), Some(index)) =
        (item.series_id, item.season_id, item.index_in_season)
    else {
        tracing::debug!(item_id = %item.item_id, "episode without season info, skipping warmup");
        return;
    };

    let episodes = match state.emby.episodes(&series_id, &season_id, &api_key).await {
        Ok(episodes) => episodes,
        Err(e) => {
            tracing::warn!("warmup: episode listing failed: {e}");
            return;
        }
    };
    let Some(next) = episodes.iter().find(|e| e.index_number == Some(index + 1)) else {
        tracing::debug!(item_id = %item.item_id, "no next episode in season");
        return;
    };

    let sources = match state.emby.media_sources(&next.id, &api_key).await {
        Ok(sources) => sources,
        Err(e) => {
            tracing::warn!("warmup: playback info for next episode failed: {e}");
            return;
        }
    };

    for source in &sources {
        let desc = FileDescriptor::from_source(source, &state.mapper);
        if desc.size == 0 || state.mapper.bypass(&desc.mount_path) {
            continue;
        }
        if store.present(&desc, 0).await {
            tracing::debug!(path = %desc.path, "next episode head already cached");
            continue;
        }
        let target = head_fragment(&desc);
        let writer = match store.writer(&desc, target).await {
            Ok(Some(writer)) => writer,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("warmup: cache writer unavailable: {e}");
                continue;
            }
        };

        let url = match state.resolver.resolve(&desc, user_agent.as_deref()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("warmup: resolve failed for {}: {e}", desc.path);
                writer.abort().await;
                continue;
            }
        };

        download_head(&state.client, &url, target, writer).await;
    }
}

/// Stream the head window from the direct URL into the writer.
async fn download_head(
    client: &reqwest::Client,
    url: &str,
    target: FragmentRange,
    writer: FragmentWriter,
) {
    let request = client
        .get(url)
        .header(RANGE, format!("bytes={}-{}", target.start, target.end));

    let response = match request.send().await {
        Ok(response) if response.status() == StatusCode::PARTIAL_CONTENT => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "warmup: upstream refused range request");
            writer.abort().await;
            return;
        }
        Err(e) => {
            tracing::warn!("warmup: upstream request failed: {e}");
            writer.abort().await;
            return;
        }
    };

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        match next {
            Ok(chunk) => writer.push(chunk).await,
            Err(e) => {
                tracing::warn!("warmup: upstream stream broke: {e}");
                writer.abort().await;
                return;
            }
        }
    }

    match writer.close().await {
        Ok(()) => tracing::info!("warmed next episode head"),
        Err(e) => tracing::warn!("warmup: {e}"),
    }
}
