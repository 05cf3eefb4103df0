use anyhow::Result;
use tracing::info;

use embytoalist::server;
use embytoalist::state::AppState;
use embytoalist_core::{logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_logging(&config)?;

    info!("embytoalist starting...");
    info!("metadata server: {}", config.emby_server);
    info!("link server: {}", config.alist_server);
    if config.cache_enable {
        info!("cache root: {}", config.cache_path);
    }

    let state = AppState::initialize(config).await?;
    server::run(state).await
}
