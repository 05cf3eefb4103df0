//! Emby HTTP Client

use std::time::Duration;

use reqwest::Client;

use super::error::{check_response, json_with_limit, EmbyError};
use super::types::{EmbyItem, ItemsResponse, MediaSource, PlaybackInfoResponse};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// URL-encode a string for safe use in query parameters
fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Emby HTTP Client
pub struct EmbyClient {
    host: String,
    client: Client,
}

impl EmbyClient {
    /// Create a new Emby client on top of the shared connection pool.
    pub fn new(host: impl Into<String>, client: Client) -> Self {
        Self {
            host: host.into(),
            client,
        }
    }

    /// Get current host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, EmbyError> {
        let response = self
            .client
            .get(url)
            .timeout(API_TIMEOUT)
            .send()
            .await?;
        let response = check_response(response)?;
        json_with_limit(response).await
    }

    /// Look up a single item by id. Returns `None` when the server knows no
    /// such item.
    pub async fn get_item(
        &self,
        item_id: &str,
        api_key: &str,
    ) -> Result<Option<EmbyItem>, EmbyError> {
        let url = format!(
            "{}/emby/Items?api_key={}&Ids={}",
            self.host,
            url_encode(api_key),
            url_encode(item_id)
        );
        tracing::debug!(item_id, "requesting item info");
        let resp: ItemsResponse = self.get_json(&url).await?;
        Ok(resp.items.into_iter().next())
    }

    /// Fetch all media sources of an item.
    pub async fn media_sources(
        &self,
        item_id: &str,
        api_key: &str,
    ) -> Result<Vec<MediaSource>, EmbyError> {
        let url = format!(
            "{}/emby/Items/{}/PlaybackInfo?api_key={}",
            self.host,
            url_encode(item_id),
            url_encode(api_key)
        );
        let resp: PlaybackInfoResponse = self.get_json(&url).await?;
        Ok(resp.media_sources)
    }

    /// Fetch the media source matching `media_source_id`.
    pub async fn playback_info(
        &self,
        item_id: &str,
        media_source_id: &str,
        api_key: &str,
    ) -> Result<MediaSource, EmbyError> {
        let url = format!(
            "{}/emby/Items/{}/PlaybackInfo?MediaSourceId={}&api_key={}",
            self.host,
            url_encode(item_id),
            url_encode(media_source_id),
            url_encode(api_key)
        );
        tracing::debug!(item_id, media_source_id, "requesting playback info");
        let resp: PlaybackInfoResponse = self.get_json(&url).await?;
        resp.media_sources
            .into_iter()
            .find(|s| s.id == media_source_id)
            .ok_or_else(|| EmbyError::Api("Can't match MediaSourceId".to_string()))
    }

    /// List the episodes of one season of a series.
    pub async fn episodes(
        &self,
        series_id: &str,
        season_id: &str,
        api_key: &str,
    ) -> Result<Vec<EmbyItem>, EmbyError> {
        let url = format!(
            "{}/emby/Shows/{}/Episodes?SeasonId={}&api_key={}",
            self.host,
            url_encode(series_id),
            url_encode(season_id),
            url_encode(api_key)
        );
        let resp: ItemsResponse = self.get_json(&url).await?;
        Ok(resp.items)
    }
}
