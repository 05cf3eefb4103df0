// EmbyToAlist provider clients
//
// Pure HTTP clients for the two backend collaborators:
// - alist: the link server that signs short-lived direct URLs
// - emby: the metadata server that describes items and media sources
//
// Both clients share the process-wide pooled reqwest client handed in at
// startup; neither follows redirects.

pub mod alist;
pub mod emby;

pub use alist::AlistClient;
pub use alist::error::AlistError;
pub use emby::EmbyClient;
pub use emby::error::EmbyError;
