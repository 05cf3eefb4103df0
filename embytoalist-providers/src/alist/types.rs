//! Alist HTTP API Types

use serde::Deserialize;

/// Generic Alist API response wrapper
#[derive(Debug, Deserialize)]
pub struct AlistResp<T> {
    pub code: u64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// File information from `/api/fs/get`
#[derive(Debug, Deserialize)]
pub struct FsGetData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "is_dir", default)]
    pub is_dir: bool,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub raw_url: String,
    #[serde(default)]
    pub provider: String,
}
