// EmbyToAlist core
//
// Everything the HTTP layer dispatches into: configuration, the error
// taxonomy, domain models, mount-path mapping, the on-disk range cache and
// the direct-link resolver.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod path;
pub mod resolver;

pub use config::Config;
pub use error::{Error, Result};
