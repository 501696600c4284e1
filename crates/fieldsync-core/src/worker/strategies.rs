//! Cache strategies behind the routing table
//!
//! Every strategy resolves to a response; an intercepted request never
//! surfaces an error to the client. When nothing better exists the worker
//! synthesizes an explicit offline response.

use std::sync::Arc;

use serde_json::json;
use tokio::time::timeout;

use super::cache::Bucket;
use super::fetch::{Destination, Fetch, Request, Response};
use super::routes::{self, Strategy};
use super::{CacheWorker, MutationSink};

/// Last-resort markup when a navigation fails and no page is cached
const OFFLINE_HTML: &str = "<!DOCTYPE html><html><head><title>Offline</title></head>\
<body><h1>You are offline</h1><p>This page is not available offline. \
Reconnect and try again.</p></body></html>";

/// Placeholder served for images with no cached copy while offline
const IMAGE_PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="150"><rect width="100%" height="100%" fill="#e2e8f0"/><text x="50%" y="50%" text-anchor="middle" fill="#64748b" font-size="14">offline</text></svg>"##;

impl<F: Fetch, S: MutationSink> CacheWorker<F, S> {
    /// Serve an intercepted request under the routing policy.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        let route = routes::classify(request);
        let bucket = self.config.bucket_name(route.bucket);
        tracing::trace!(url = %request.url, route = route.name, "Routing intercepted request");

        match route.strategy {
            Strategy::QueueMutation => self.queue_mutation(request).await,
            Strategy::NetworkFirstPage => self.network_first_page(request, &bucket).await,
            Strategy::CacheFirstRevalidate => self.cache_first(request, &bucket).await,
            Strategy::NetworkFirstApi => self.network_first_api(request, &bucket).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &bucket).await,
        }
    }

    /// Network only; a failed attempt queues the mutation for replay and
    /// answers with a synthesized 202.
    async fn queue_mutation(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(fetch_err) => {
                tracing::info!(url = %request.url, "Mutation failed to send, queueing for replay: {fetch_err}");
                match self
                    .sink
                    .enqueue(request.method.as_str(), &request.url, request.body.clone())
                    .await
                {
                    Ok(mutation) => Response::json(
                        202,
                        &json!({
                            "queued": true,
                            "offline": true,
                            "mutationId": mutation.id,
                            "message": "Saved locally; will sync when back online",
                        }),
                    ),
                    Err(store_err) => {
                        // Losing a mutation silently would be a correctness
                        // bug; surface the storage failure instead.
                        tracing::error!(url = %request.url, "Could not queue mutation: {store_err}");
                        Response::json(
                            503,
                            &json!({
                                "queued": false,
                                "error": "Offline and local storage is unavailable",
                            }),
                        )
                    }
                }
            }
        }
    }

    /// Network first, then cached page, then the offline page, then
    /// inline markup. A server verdict, success or not, always wins over
    /// the cache.
    async fn network_first_page(&self, request: &Request, bucket: &str) -> Response {
        match timeout(self.config.api_timeout, self.fetcher.fetch(request)).await {
            Ok(Ok(response)) if response.ok() => {
                self.storage.put(bucket, &request.url, response.clone());
                response
            }
            // The server answered; pass its verdict through uncached
            Ok(Ok(response)) => response,
            _ => {
                if let Some(cached) = self.storage.get(bucket, &request.url) {
                    return cached;
                }
                let static_bucket = self.config.bucket_name(Bucket::Static);
                if let Some(page) = self.storage.get(&static_bucket, &self.config.offline_url) {
                    return page;
                }
                Response::html(503, OFFLINE_HTML)
            }
        }
    }

    /// Serve from cache immediately, refreshing behind the response.
    async fn cache_first(&self, request: &Request, bucket: &str) -> Response {
        if let Some(cached) = self.storage.get(bucket, &request.url) {
            self.revalidate_in_background(request, bucket);
            return cached;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) if response.ok() => {
                self.storage.put(bucket, &request.url, response.clone());
                response
            }
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %request.url, "Uncached resource unavailable: {e}");
                if matches!(request.destination, Destination::Image) {
                    Response {
                        status: 200,
                        content_type: "image/svg+xml".to_string(),
                        body: IMAGE_PLACEHOLDER_SVG.as_bytes().to_vec(),
                    }
                } else {
                    Response::html(503, OFFLINE_HTML)
                }
            }
        }
    }

    /// Bounded network attempt, then cache, then an explicit offline body.
    async fn network_first_api(&self, request: &Request, bucket: &str) -> Response {
        match timeout(self.config.api_timeout, self.fetcher.fetch(request)).await {
            Ok(Ok(response)) if response.ok() => {
                self.storage.put(bucket, &request.url, response.clone());
                response
            }
            // The server answered; pass its verdict through uncached
            Ok(Ok(response)) => response,
            _ => self.storage.get(bucket, &request.url).unwrap_or_else(|| {
                Response::json(
                    503,
                    &json!({
                        "offline": true,
                        "error": "You are offline and this data is not cached",
                    }),
                )
            }),
        }
    }

    /// Serve the cached copy if present and refresh it behind the
    /// response; otherwise wait for the network.
    async fn stale_while_revalidate(&self, request: &Request, bucket: &str) -> Response {
        if let Some(cached) = self.storage.get(bucket, &request.url) {
            self.revalidate_in_background(request, bucket);
            return cached;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) if response.ok() => {
                self.storage.put(bucket, &request.url, response.clone());
                response
            }
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %request.url, "Uncached resource unavailable: {e}");
                Response::html(503, OFFLINE_HTML)
            }
        }
    }

    fn revalidate_in_background(&self, request: &Request, bucket: &str) {
        let fetcher = self.fetcher.clone();
        let storage = Arc::clone(&self.storage);
        let request = request.clone();
        let bucket = bucket.to_string();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.ok() => {
                    storage.put(&bucket, &request.url, response);
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "Skipping revalidation of non-success response");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, "Background revalidation failed: {e}");
                }
            }
        });
    }
}
