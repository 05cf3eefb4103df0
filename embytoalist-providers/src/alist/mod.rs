//! Alist Link-Server Client
//!
//! Pure HTTP client for the Alist `/api/fs/get` endpoint, used to exchange a
//! link path for a signed direct URL.

mod client;
pub mod error;
pub mod types;

pub use client::AlistClient;
pub use error::AlistError;
pub use types::*;
