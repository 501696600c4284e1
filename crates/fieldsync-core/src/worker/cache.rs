//! Cache buckets owned by the worker
//!
//! The worker is the only writer. Population races between concurrent
//! requests for the same resource are last-write-wins; entries are not
//! authoritative state.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::fetch::Response;

/// Resource classes the cache is partitioned into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Static,
    Pages,
    Images,
    Fonts,
    Api,
}

impl Bucket {
    pub const ALL: [Self; 5] = [
        Self::Static,
        Self::Pages,
        Self::Images,
        Self::Fonts,
        Self::Api,
    ];

    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Pages => "pages",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Api => "api",
        }
    }
}

/// In-memory cache storage, partitioned into named buckets.
#[derive(Debug, Default)]
pub struct CacheStorage {
    buckets: Mutex<HashMap<String, HashMap<String, Response>>>,
}

impl CacheStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a response under the given bucket, keyed by URL.
    pub fn put(&self, bucket: &str, url: &str, response: Response) {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    /// Look up a cached response.
    #[must_use]
    pub fn get(&self, bucket: &str, url: &str) -> Option<Response> {
        let buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        buckets.get(bucket)?.get(url).cloned()
    }

    /// Delete every bucket whose name is not in `keep`; returns the names
    /// of the buckets that were purged.
    pub fn purge_except(&self, keep: &[String]) -> Vec<String> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = buckets
            .keys()
            .filter(|name| !keep.contains(name))
            .cloned()
            .collect();
        for name in &stale {
            buckets.remove(name);
        }
        stale
    }

    /// Names of all buckets currently present.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        let buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        buckets.keys().cloned().collect()
    }
}
