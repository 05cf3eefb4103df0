// EmbyToAlist — range-aware playback dispatcher in front of an Emby server
// and an Alist gateway.

pub mod http;
pub mod server;
pub mod state;
pub mod warmup;
