//! Worker startup configuration
//!
//! Everything version- or deployment-specific is passed in here rather
//! than living in module-level globals, so the worker can be instantiated
//! in isolation for tests.

use std::time::Duration;

use super::cache::Bucket;

/// Configuration handed to the cache worker at startup
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Application version; part of every bucket name, so a deploy rolls
    /// the whole cache namespace
    pub version: String,
    /// Prefix for cache bucket names
    pub cache_prefix: String,
    /// Static asset URLs fetched into the cache during install
    pub precache: Vec<String>,
    /// URL of the offline fallback page (served when a navigation fails
    /// and no cached copy exists)
    pub offline_url: String,
    /// Bound on network-first strategies before falling back to cache
    pub api_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            cache_prefix: "fieldsync".to_string(),
            precache: Vec::new(),
            offline_url: "/offline.html".to_string(),
            api_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Full bucket name for a resource class under this version
    #[must_use]
    pub fn bucket_name(&self, bucket: Bucket) -> String {
        format!("{}-{}-{}", self.cache_prefix, self.version, bucket.class())
    }

    /// The complete set of bucket names this version is allowed to keep
    #[must_use]
    pub fn expected_buckets(&self) -> Vec<String> {
        Bucket::ALL
            .iter()
            .map(|bucket| self.bucket_name(*bucket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bucket_names_carry_version() {
        let config = WorkerConfig {
            version: "7".to_string(),
            ..WorkerConfig::default()
        };
        assert_eq!(config.bucket_name(Bucket::Images), "fieldsync-7-images");
        assert_eq!(config.expected_buckets().len(), Bucket::ALL.len());
    }
}
