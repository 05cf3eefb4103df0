//! Emby Metadata-Server Client
//!
//! Pure HTTP client for the three Emby endpoints the shim needs: item lookup,
//! playback info (media sources) and season episode listings.

mod client;
pub mod error;
pub mod types;

pub use client::EmbyClient;
pub use error::EmbyError;
pub use types::*;
