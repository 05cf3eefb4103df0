//! Domain models of a playback decision.

use embytoalist_providers::emby::{EmbyItem, MediaSource};

use crate::path::PathMapper;

/// Nominal bitrate assumed when the metadata server reports none (~27.9 Mbit/s).
pub const DEFAULT_BITRATE: u64 = 27_962_026;

/// A request whose start lies within this distance of EOF targets a tail
/// fragment (container trailer/index reads).
pub const TAIL_WINDOW: u64 = 2 * 1024 * 1024;

/// Seconds of playback the head cache window covers.
const HEAD_WINDOW_SECONDS: u64 = 15;

/// Everything the dispatcher needs to know about one media file.
/// Immutable per playback decision.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Path as reported by the metadata server (mount-local).
    pub mount_path: String,
    /// Link-server path, post mapping.
    pub path: String,
    /// Total size in bytes.
    pub size: u64,
    /// Container format tag (mkv, mp4, ...), drives Content-Type.
    pub container: String,
    /// Bits per second, defaulted when unknown.
    pub bitrate: u64,
    /// Human label, only used in the cache fingerprint.
    pub name: String,
    /// The mount path yields a URL rather than media bytes.
    pub is_indirection: bool,
}

impl FileDescriptor {
    /// Build a descriptor from a metadata-server media source.
    #[must_use]
    pub fn from_source(source: &MediaSource, mapper: &PathMapper) -> Self {
        let bitrate = match source.bitrate {
            Some(b) if b > 0 => b,
            _ => DEFAULT_BITRATE,
        };
        let is_indirection =
            source.is_remote || source.path.to_ascii_lowercase().ends_with(".strm");
        Self {
            mount_path: source.path.clone(),
            path: mapper.map(&source.path),
            size: source.size.unwrap_or(0),
            container: source.container.clone(),
            bitrate,
            name: source.name.clone(),
            is_indirection,
        }
    }

    /// Size of the opening cache window: 15 seconds of playback at the
    /// nominal bitrate, rounded up to whole bytes.
    #[must_use]
    pub fn head_window(&self) -> u64 {
        (self.bitrate * HEAD_WINDOW_SECONDS).div_ceil(8)
    }
}

/// What kind of library item is being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Movie,
    Episode,
}

/// Library item identity; season/series data is present for episodes only.
#[derive(Debug, Clone)]
pub struct ItemDescriptor {
    pub item_id: String,
    pub kind: ItemKind,
    pub series_id: Option<String>,
    pub season_id: Option<String>,
    pub index_in_season: Option<u32>,
}

impl ItemDescriptor {
    /// Build a descriptor from a metadata-server item. Everything that is
    /// not a movie is treated as an episode.
    #[must_use]
    pub fn from_item(item: &EmbyItem) -> Self {
        let kind = if item.item_type.eq_ignore_ascii_case("movie") {
            ItemKind::Movie
        } else {
            ItemKind::Episode
        };
        Self {
            item_id: item.id.clone(),
            kind,
            series_id: item.series_id.clone(),
            season_id: item.season_id.clone(),
            index_in_season: item.index_number,
        }
    }
}

/// An inclusive HTTP byte range; `end == None` means "to EOF".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Parse a `Range` header value. Only the single-range
    /// `bytes=<start>-[<end>]` form is understood; anything else (multi-range,
    /// suffix ranges) yields `None` and the caller falls back to a redirect.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.strip_prefix("bytes=")?;
        let (start, end) = spec.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end = end.trim();
        let end = if end.is_empty() {
            None
        } else {
            let e: u64 = end.parse().ok()?;
            if e < start {
                return None;
            }
            Some(e)
        };
        Some(Self { start, end })
    }

    /// The last byte this request covers in a file of `size` bytes.
    #[must_use]
    pub fn effective_end(&self, size: u64) -> u64 {
        debug_assert!(size > 0);
        self.end.map_or(size - 1, |e| e.min(size - 1))
    }
}

/// How a range request relates to the cache windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRangeStatus {
    /// Entirely inside the head window.
    FullyCachedHead,
    /// Entirely inside the tail window.
    FullyCachedTail,
    /// Starts inside the head window, extends past it.
    PartiallyCachedHead,
    /// No cache involvement.
    NotCached,
}

/// Content-Type for a container tag.
#[must_use]
pub fn content_type(container: &str) -> &'static str {
    match container.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "video/ogg",
        "avi" => "video/x-msvideo",
        "mpeg" => "video/mpeg",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "ts" => "video/mp2t",
        _ => "application/octet-stream",
    }
}
