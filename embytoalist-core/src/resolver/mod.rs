//! Direct-link resolution.
//!
//! Exchanges a link path for a short-lived signed URL, caching results for
//! ten minutes per `(path, user-agent)` and collapsing concurrent fetches
//! into one network call. Resolution is usually started speculatively by the
//! dispatcher before it knows whether the response will redirect or proxy; a
//! discarded task still runs to completion and populates the cache.

use std::sync::Arc;
use std::time::Duration;

use async_singleflight::Group;
use moka::future::Cache;
use reqwest::header::{HeaderValue, LOCATION, USER_AGENT};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use embytoalist_providers::AlistClient;

use crate::error::{Error, Result};
use crate::models::FileDescriptor;

/// How long a resolved URL stays usable without refetching.
const LINK_TTL: Duration = Duration::from_secs(600);

const LINK_CACHE_CAPACITY: u64 = 4096;

/// Timeout for the indirection-file probe.
const INDIRECTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct LinkKey {
    path: String,
    user_agent: Option<String>,
}

/// A speculative resolution in flight. Dropping the task does not cancel the
/// fetch; awaiting it yields the URL.
pub struct LinkTask {
    handle: JoinHandle<Result<String>>,
}

impl LinkTask {
    /// Wait for the resolved URL.
    pub async fn url(self) -> Result<String> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("resolver task lost: {e}");
                Err(Error::ResolverLost)
            }
        }
    }
}

pub struct LinkResolver {
    alist: AlistClient,
    client: reqwest::Client,
    cache: Cache<LinkKey, String>,
    /// Collapses concurrent fetches of the same key into one network call;
    /// the registration is dropped by the group when the leader finishes.
    flight: Group<LinkKey, String, Error>,
    tasks: TaskTracker,
}

impl LinkResolver {
    #[must_use]
    pub fn new(alist: AlistClient, client: reqwest::Client, tasks: TaskTracker) -> Self {
        Self {
            alist,
            client,
            cache: Cache::builder()
                .time_to_live(LINK_TTL)
                .max_capacity(LINK_CACHE_CAPACITY)
                .build(),
            flight: Group::new(),
            tasks,
        }
    }

    /// Resolve the direct URL for a file, serving from the TTL cache when
    /// possible. Safe to call concurrently for the same key: at most one
    /// underlying fetch runs per live entry.
    pub async fn resolve(&self, desc: &FileDescriptor, user_agent: Option<&str>) -> Result<String> {
        let key = LinkKey {
            path: desc.path.clone(),
            user_agent: user_agent.map(str::to_owned),
        };

        if let Some(url) = self.cache.get(&key).await {
            tracing::debug!(path = %desc.path, "direct link cache hit");
            return Ok(url);
        }

        // Group::work returns Err(None) when the leader was dropped before
        // producing a result; every follower then sees ResolverLost.
        let url = self
            .flight
            .work(&key, self.fetch(desc, user_agent))
            .await
            .map_err(|inner| inner.unwrap_or(Error::ResolverLost))?;

        self.cache.insert(key, url.clone()).await;
        Ok(url)
    }

    /// Start a resolution in the background and hand back a joinable task.
    /// The dispatcher calls this as soon as it has the descriptor; if the
    /// request is ultimately served without the URL, the completed task has
    /// still warmed the cache.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, desc: FileDescriptor, user_agent: Option<String>) -> LinkTask {
        let resolver = Arc::clone(self);
        let handle = self.tasks.spawn(async move {
            resolver.resolve(&desc, user_agent.as_deref()).await
        });
        LinkTask { handle }
    }

    async fn fetch(&self, desc: &FileDescriptor, user_agent: Option<&str>) -> Result<String> {
        if desc.is_indirection {
            self.resolve_indirection(&desc.mount_path, user_agent).await
        } else {
            let data = self.alist.fs_get(&desc.path, user_agent).await?;
            if data.raw_url.is_empty() {
                return Err(Error::upstream("alist", "fs_get returned no raw_url"));
            }
            tracing::info!(path = %desc.path, "resolved direct link");
            Ok(data.raw_url)
        }
    }

    /// Resolve an indirection file: probe the mount path with the caller's
    /// user agent, without following redirects. A redirect yields its
    /// `Location`; a 200 means the mount path itself is the direct URL,
    /// which is only usable when it actually is an HTTP URL.
    async fn resolve_indirection(
        &self,
        mount_path: &str,
        user_agent: Option<&str>,
    ) -> Result<String> {
        let mut request = self.client.get(mount_path).timeout(INDIRECTION_TIMEOUT);
        if let Some(ua) = user_agent {
            if let Ok(value) = HeaderValue::from_str(ua) {
                request = request.header(USER_AGENT, value);
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(e.to_string())
            } else {
                Error::upstream("indirection", e.to_string())
            }
        })?;

        match response.status().as_u16() {
            301 | 302 => response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| Error::upstream("indirection", "redirect without Location header")),
            200 => match url::Url::parse(mount_path) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                    Ok(mount_path.to_string())
                }
                _ => Err(Error::upstream(
                    "indirection",
                    format!("mount path is not an http url: {mount_path}"),
                )),
            },
            status => Err(Error::upstream(
                "indirection",
                format!("unexpected status {status}"),
            )),
        }
    }
}
