//! Page cache for rendered feed pages.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use quill_common::config::CacheConfig;

/// Short-lived cache of rendered HTML pages.
///
/// Entries are keyed by request path (with query) and viewer, so a signed-in
/// user never receives a page rendered for someone else. Entries are not
/// dropped when content changes; they age out after the configured TTL.
#[derive(Clone)]
pub struct PageCache {
    inner: Option<Cache<String, Arc<str>>>,
}

impl PageCache {
    /// Build a cache from configuration. A zero TTL disables caching.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        if config.index_ttl_secs == 0 {
            return Self::disabled();
        }

        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.index_ttl_secs))
            .build();

        Self { inner: Some(cache) }
    }

    /// A cache that stores nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { inner: None }
    }

    /// Cache key for a request.
    #[must_use]
    pub fn key(path_and_query: &str, viewer_id: Option<&str>) -> String {
        format!("{}|{}", viewer_id.unwrap_or("-"), path_and_query)
    }

    /// Look up a rendered page.
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        let cache = self.inner.as_ref()?;
        let hit = cache.get(key).await;
        tracing::debug!(key = %key, hit = hit.is_some(), "Page cache lookup");
        hit
    }

    /// Store a rendered page.
    pub async fn insert(&self, key: String, html: Arc<str>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, html).await;
        }
    }

    /// Drop every cached page.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
            tracing::debug!("Page cache cleared");
        }
    }

    /// Whether caching is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}
