//! Process-wide shared state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use embytoalist_core::cache::CacheStore;
use embytoalist_core::path::PathMapper;
use embytoalist_core::resolver::LinkResolver;
use embytoalist_core::Config;
use embytoalist_providers::{AlistClient, EmbyClient};

/// Everything a request handler needs, created once at startup and passed
/// explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The shared pooled HTTP client; metadata, link and streaming requests
    /// all go through it.
    pub client: reqwest::Client,
    pub emby: Arc<EmbyClient>,
    pub store: Option<Arc<CacheStore>>,
    pub resolver: Arc<LinkResolver>,
    pub mapper: Arc<PathMapper>,
    /// Background resolver and warmup tasks, drained on shutdown.
    pub tasks: TaskTracker,
}

impl AppState {
    pub async fn initialize(config: Config) -> anyhow::Result<Self> {
        // No total timeout: the same pool carries long-lived streaming
        // requests. API calls set per-request timeouts. Redirects stay
        // disabled so Location headers reach the resolver untouched.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let emby = Arc::new(EmbyClient::new(config.emby_server.clone(), client.clone()));
        let alist = AlistClient::new(
            config.alist_server.clone(),
            config.alist_api_key.clone(),
            client.clone(),
        );

        let tasks = TaskTracker::new();
        let resolver = Arc::new(LinkResolver::new(alist, client.clone(), tasks.clone()));

        let store = if config.cache_enable {
            Some(Arc::new(CacheStore::open(&config.cache_path).await?))
        } else {
            None
        };

        let mapper = Arc::new(PathMapper::new(
            config.mount_path_prefix_remove.clone(),
            config.mount_path_prefix_add.clone(),
            config.ignore_path.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            client,
            emby,
            store,
            resolver,
            mapper,
            tasks,
        })
    }
}
