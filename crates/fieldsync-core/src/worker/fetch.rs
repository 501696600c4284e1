//! Request and response types intercepted by the cache worker
//!
//! The worker sees a simplified view of an HTTP exchange: enough identity
//! to route and cache by, without carrying a full client stack through
//! every strategy.

use std::future::Future;

use serde_json::Value;

use crate::error::{Error, Result};

/// HTTP method of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Non-GET requests mutate server state and are never cached
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// What kind of resource the request is for, as reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Top-level page navigation
    Document,
    Image,
    Font,
    Script,
    Style,
    Other,
}

/// An intercepted outbound request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub destination: Destination,
    /// JSON body for mutating API requests
    pub body: Option<Value>,
}

impl Request {
    /// Plain GET for a non-navigation resource
    #[must_use]
    pub fn get(url: impl Into<String>, destination: Destination) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            destination,
            body: None,
        }
    }

    /// Top-level document navigation
    #[must_use]
    pub fn navigation(url: impl Into<String>) -> Self {
        Self::get(url, Destination::Document)
    }

    /// Mutating API request carrying a JSON body
    #[must_use]
    pub fn mutation(method: Method, url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            url: url.into(),
            destination: Destination::Other,
            body,
        }
    }

    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(self.destination, Destination::Document)
    }

    /// Path component of the URL, with any scheme and host stripped
    #[must_use]
    pub fn path(&self) -> &str {
        let rest = self
            .url
            .find("://")
            .map_or(self.url.as_str(), |at| &self.url[at + 3..]);
        rest.find('/')
            .map_or("/", |at| &rest[at..])
    }

    /// Whether the request targets the REST API
    #[must_use]
    pub fn is_api(&self) -> bool {
        self.path().starts_with("/api/")
    }
}

/// A response served to the client, from the network or synthesized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Response {
    #[must_use]
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: value.to_string().into_bytes(),
        }
    }

    #[must_use]
    pub fn html(status: u16, markup: &str) -> Self {
        Self {
            status,
            content_type: "text/html".to_string(),
            body: markup.as_bytes().to_vec(),
        }
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Network access as the worker sees it.
///
/// Returns a `Send` future so strategies can revalidate caches from
/// spawned background tasks.
pub trait Fetch: Clone + Send + Sync + 'static {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Real network implementation over reqwest
#[derive(Clone)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
        })
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send {
        let client = self.client.clone();
        let request = request.clone();
        async move {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut builder = client.request(method, &request.url);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = response.bytes().await.map_err(Error::from)?.to_vec();

            Ok(Response {
                status,
                content_type,
                body,
            })
        }
    }
}
