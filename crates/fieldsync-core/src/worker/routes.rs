//! Request routing policy
//!
//! One explicit ordered table of (predicate, bucket, strategy) tuples,
//! evaluated top to bottom. Classification is pure: the same request
//! always lands in the same bucket with the same strategy.

use super::cache::Bucket;
use super::fetch::{Destination, Request};

/// How a matched request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network only; offline failures synthesize a queued 202 response and
    /// enqueue the mutation for replay
    QueueMutation,
    /// Network first, falling back to cached page, offline page, then
    /// inline HTML
    NetworkFirstPage,
    /// Serve cached immediately, revalidate in the background
    CacheFirstRevalidate,
    /// Network first with timeout, falling back to cache, then offline JSON
    NetworkFirstApi,
    /// Serve cached if present and refresh behind it; otherwise wait for
    /// the network
    StaleWhileRevalidate,
}

/// One row of the routing table
pub struct Route {
    pub name: &'static str,
    matches: fn(&Request) -> bool,
    pub bucket: Bucket,
    pub strategy: Strategy,
}

/// Routing policy, in precedence order. The final row matches everything.
static ROUTES: &[Route] = &[
    Route {
        name: "api-mutation",
        matches: |request| request.is_api() && request.method.is_mutating(),
        bucket: Bucket::Api,
        strategy: Strategy::QueueMutation,
    },
    Route {
        name: "navigation",
        matches: Request::is_navigation,
        bucket: Bucket::Pages,
        strategy: Strategy::NetworkFirstPage,
    },
    Route {
        name: "images",
        matches: |request| matches!(request.destination, Destination::Image),
        bucket: Bucket::Images,
        strategy: Strategy::CacheFirstRevalidate,
    },
    Route {
        name: "fonts",
        matches: |request| matches!(request.destination, Destination::Font),
        bucket: Bucket::Fonts,
        strategy: Strategy::CacheFirstRevalidate,
    },
    Route {
        name: "api-get",
        matches: Request::is_api,
        bucket: Bucket::Api,
        strategy: Strategy::NetworkFirstApi,
    },
    Route {
        name: "static",
        matches: |_| true,
        bucket: Bucket::Static,
        strategy: Strategy::StaleWhileRevalidate,
    },
];

/// Pick the route for a request. Total: the catch-all row matches any
/// request not claimed earlier.
#[must_use]
pub fn classify(request: &Request) -> &'static Route {
    for route in ROUTES {
        if (route.matches)(request) {
            return route;
        }
    }
    // The table ends in a catch-all; this line is unreachable but keeps
    // the function total without panicking.
    &ROUTES[ROUTES.len() - 1]
}
