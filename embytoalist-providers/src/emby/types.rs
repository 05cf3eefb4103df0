//! Emby HTTP API Types
//!
//! Only the fields the shim consumes; Emby payloads carry far more.

use serde::Deserialize;

/// Response wrapper for `/emby/Items` and `/emby/Shows/{id}/Episodes`
#[derive(Debug, Deserialize)]
pub struct ItemsResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<EmbyItem>,
}

/// A single library item
#[derive(Debug, Clone, Deserialize)]
pub struct EmbyItem {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Type", default)]
    pub item_type: String,
    #[serde(rename = "SeriesId", default)]
    pub series_id: Option<String>,
    #[serde(rename = "SeasonId", default)]
    pub season_id: Option<String>,
    #[serde(rename = "IndexNumber", default)]
    pub index_number: Option<u32>,
}

/// Response wrapper for `/emby/Items/{id}/PlaybackInfo`
#[derive(Debug, Deserialize)]
pub struct PlaybackInfoResponse {
    #[serde(rename = "MediaSources", default)]
    pub media_sources: Vec<MediaSource>,
}

/// One playable source of an item
#[derive(Debug, Clone, Deserialize)]
pub struct MediaSource {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Path", default)]
    pub path: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Container", default)]
    pub container: String,
    #[serde(rename = "Bitrate", default)]
    pub bitrate: Option<u64>,
    #[serde(rename = "Size", default)]
    pub size: Option<u64>,
    #[serde(rename = "IsRemote", default)]
    pub is_remote: bool,
}
