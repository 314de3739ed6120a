//! Request descriptors: the value type describing one HTTP call.
//!
//! A [`RequestDescriptor`] carries everything the client needs to execute
//! a request: method, path relative to the client's base URL, headers,
//! query parameters, an optional body, and per-request overrides for
//! timeout, caching, and retries. Descriptors are plain values; building
//! one performs no I/O.

use std::collections::BTreeMap;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};

use crate::body::Body;
use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// How a request interacts with the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve from the cache when a fresh entry exists; store the response
    /// on success. The default for GET and HEAD.
    Use,
    /// Ignore the cache entirely. The default for every other method.
    Bypass,
    /// Skip the lookup but store the fresh response, replacing whatever
    /// was cached.
    Refresh,
}

/// A complete description of one HTTP request.
///
/// # Examples
///
/// ```
/// use recall::{CachePolicy, RequestDescriptor};
/// use http::Method;
/// use std::time::Duration;
///
/// let request = RequestDescriptor::new(Method::GET, "/users")
///     .with_query_param("page", "1")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(request.cache_policy, CachePolicy::Use);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,

    /// Path relative to the client's base URL. Must be non-empty and must
    /// not carry its own scheme.
    pub path: String,

    /// Request-specific headers, merged over the client's defaults.
    pub headers: HeaderMap,

    /// Query parameters, deduplicated by key and emitted in sorted order.
    pub query: BTreeMap<String, String>,

    /// Optional request body.
    pub body: Option<Body>,

    /// Per-request timeout, overriding the client-wide setting.
    pub timeout: Option<Duration>,

    /// How this request interacts with the response cache.
    pub cache_policy: CachePolicy,

    /// Freshness lifetime for the stored response, overriding the cache's
    /// default TTL.
    pub cache_ttl: Option<Duration>,

    /// Per-request retry configuration, overriding the client-wide one.
    pub retry: Option<RetryConfig>,
}

impl RequestDescriptor {
    /// Creates a descriptor for the given method and path.
    ///
    /// GET and HEAD requests default to [`CachePolicy::Use`]; everything
    /// else defaults to [`CachePolicy::Bypass`].
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let cache_policy = if method == Method::GET || method == Method::HEAD {
            CachePolicy::Use
        } else {
            CachePolicy::Bypass
        };
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: BTreeMap::new(),
            body: None,
            timeout: None,
            cache_policy,
            cache_ttl: None,
            retry: None,
        }
    }

    /// Adds a header.
    ///
    /// Returns an error if the name or value is not a valid HTTP header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = name
            .as_ref()
            .parse::<HeaderName>()
            .map_err(|e| Error::Configuration(format!("Invalid header name: {e}")))?;
        let value = value
            .as_ref()
            .parse::<HeaderValue>()
            .map_err(|e| Error::Configuration(format!("Invalid header value: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds a query parameter. Setting the same key twice keeps the last
    /// value.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall::RequestDescriptor;
    /// use http::Method;
    ///
    /// let request = RequestDescriptor::new(Method::GET, "/search")
    ///     .with_query_param("q", "rust")
    ///     .with_query_param("limit", "10");
    /// ```
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters.
    pub fn with_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.query.insert(key.into(), value.into());
        }
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the cache policy chosen from the method.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Sets the freshness lifetime for the cached response.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Overrides the client-wide retry configuration for this request.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}
