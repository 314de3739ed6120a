//! The HTTP client and its builder.
//!
//! The [`Client`] runs one pipeline per call: resolve the URL, encode the
//! body exactly once, consult the response cache, send over the transport
//! with retries, decode, and store. All policy lives in plain
//! configuration values; all I/O goes through the injected [`Transport`]
//! and [`Clock`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Notify;
use url::Url;

use crate::body::{self, Body, Encoded};
use crate::cache::{CacheConfig, CacheStats, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::endpoint;
use crate::error::{Error, Result};
use crate::rate_limit::RateLimitInfo;
use crate::request::{CachePolicy, RequestDescriptor};
use crate::response::Response;
use crate::retry::{RetryConfig, RetryDecision};
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

/// A handle for cancelling in-flight requests.
///
/// Clones share the same signal, so one handle can stay with the caller
/// while another travels into a spawned task. Cancellation takes effect at
/// the next await point of the call: the transport exchange or a retry
/// wait. A handle that is already cancelled stops the call before any
/// transport attempt is made.
///
/// # Examples
///
/// ```
/// use recall::CancelHandle;
///
/// let cancel = CancelHandle::new();
/// assert!(!cancel.is_cancelled());
/// cancel.cancel();
/// assert!(cancel.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    /// Creates a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancels every call observing this handle. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the handle is cancelled.
    pub(crate) async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        loop {
            // Register interest before checking the flag so a cancel()
            // landing between the check and the await still wakes us.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.inner.notify.notified());
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A resilient HTTP client with response caching and retries.
///
/// The client is designed to be reused across requests. Cloning is cheap;
/// clones share the transport, the cache, and all configuration.
///
/// # Examples
///
/// ```no_run
/// use recall::{Client, RetryConfig};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), recall::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_config(RetryConfig::standard())
///     .build()?;
///
/// // GET requests are cached by default.
/// let user: recall::Response<User> = client.get("/users/123").await?;
/// println!("User: {}", user.data.name);
///
/// // POST requests bypass the cache by default.
/// let new_user = CreateUser { name: "Nia".to_string() };
/// let created: recall::Response<User> = client.post("/users", &new_user).await?;
/// println!("created user {}", created.data.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    base_url: Url,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    retry: RetryConfig,
    cache: ResponseCache,
}

/// A request after the pure preparation steps: resolved URL, cache key,
/// and the body encoded exactly once.
struct Prepared {
    url: Url,
    fingerprint: String,
    encoded: Option<Encoded>,
    timeout: Option<Duration>,
}

/// The raw outcome of a dispatch, before decoding.
struct Dispatched {
    payload: Bytes,
    status: StatusCode,
    headers: HeaderMap,
    latency: Duration,
    attempts: usize,
    from_cache: bool,
    fingerprint: String,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Executes a request and decodes the response body into `Res`.
    ///
    /// This is the main entry point. It handles URL resolution, body
    /// encoding, cache lookup, retries, logging, and decoding. Every error
    /// it returns is one of the classified [`Error`] variants.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use recall::{Client, RequestDescriptor};
    /// use http::Method;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct SearchResults {
    ///     total: u64,
    /// }
    ///
    /// # async fn example() -> Result<(), recall::Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let request = RequestDescriptor::new(Method::GET, "/search")
    ///     .with_query_param("q", "rust");
    ///
    /// let response = client.execute::<SearchResults>(request).await?;
    /// println!("{} results", response.data.total);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<Res>(&self, request: RequestDescriptor) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute_cancellable(request, &CancelHandle::new())
            .await
    }

    /// Executes a request that can be cancelled through `cancel`.
    ///
    /// Cancellation surfaces as [`Error::Cancelled`] and is never retried.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use recall::{CancelHandle, Client, Error, RequestDescriptor};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), Error> {
    /// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
    /// let cancel = CancelHandle::new();
    /// let handle = cancel.clone();
    ///
    /// tokio::spawn(async move {
    ///     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    ///     handle.cancel();
    /// });
    ///
    /// let request = RequestDescriptor::new(Method::GET, "/slow-report");
    /// match client.execute_cancellable::<serde_json::Value>(request, &cancel).await {
    ///     Err(Error::Cancelled) => println!("gave up waiting"),
    ///     other => {
    ///         other?;
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute_cancellable<Res>(
        &self,
        request: RequestDescriptor,
        cancel: &CancelHandle,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let outcome = self.dispatch(&request, cancel).await?;
        let data = self.decode_payload(&outcome)?;
        self.store_if_cacheable(&request, &outcome);
        Ok(assemble(data, outcome))
    }

    /// Executes a request and returns the body bytes without decoding.
    ///
    /// Caching and retries behave exactly as in [`execute`](Self::execute).
    pub async fn execute_raw(&self, request: RequestDescriptor) -> Result<Response<Bytes>> {
        let outcome = self.dispatch(&request, &CancelHandle::new()).await?;
        self.store_if_cacheable(&request, &outcome);
        let payload = outcome.payload.clone();
        Ok(assemble(payload, outcome))
    }

    /// Makes a GET request to the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use recall::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), recall::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user: recall::Response<User> = client.get("/users/123").await?;
    /// println!("User: {}", user.data.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::new(Method::GET, path)).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let request = RequestDescriptor::new(Method::POST, path).with_body(Body::record(body)?);
        self.execute(request).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let request = RequestDescriptor::new(Method::PUT, path).with_body(Body::record(body)?);
        self.execute(request).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let request = RequestDescriptor::new(Method::PATCH, path).with_body(Body::record(body)?);
        self.execute(request).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::new(Method::DELETE, path))
            .await
    }

    /// Makes a HEAD request, returning the (normally empty) raw body.
    pub async fn head(&self, path: impl Into<String>) -> Result<Response<Bytes>> {
        self.execute_raw(RequestDescriptor::new(Method::HEAD, path))
            .await
    }

    /// Current cache occupancy.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Drops the cached response for this request, if any.
    ///
    /// Fails only if the descriptor cannot be resolved against the base
    /// URL.
    pub fn invalidate(&self, request: &RequestDescriptor) -> Result<()> {
        let url = endpoint::resolve(&self.inner.base_url, request)?;
        let fingerprint = endpoint::fingerprint(&request.method, &url);
        self.inner.cache.invalidate(&fingerprint);
        Ok(())
    }

    /// The pure preparation steps; any failure here is terminal and costs
    /// no transport attempt.
    fn prepare(&self, request: &RequestDescriptor) -> Result<Prepared> {
        let url = endpoint::resolve(&self.inner.base_url, request)?;
        let fingerprint = endpoint::fingerprint(&request.method, &url);
        let encoded = request.body.as_ref().map(body::encode).transpose()?;
        Ok(Prepared {
            url,
            fingerprint,
            encoded,
            timeout: request.timeout.or(self.inner.timeout),
        })
    }

    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        cancel: &CancelHandle,
    ) -> Result<Dispatched> {
        let started = self.inner.clock.now();
        let prepared = self.prepare(request)?;

        if request.cache_policy == CachePolicy::Use {
            if let Some(payload) = self
                .inner
                .cache
                .lookup(&prepared.fingerprint, self.inner.clock.now())
            {
                tracing::debug!(fingerprint = %prepared.fingerprint, "Cache hit");
                let latency = self.inner.clock.now().saturating_duration_since(started);
                return Ok(Dispatched {
                    payload,
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    latency,
                    attempts: 0,
                    from_cache: true,
                    fingerprint: prepared.fingerprint,
                });
            }
        }

        let (response, attempts) = self.fetch(request, &prepared, cancel).await?;
        let latency = self.inner.clock.now().saturating_duration_since(started);
        Ok(Dispatched {
            payload: response.body,
            status: response.status,
            headers: response.headers,
            latency,
            attempts,
            from_cache: false,
            fingerprint: prepared.fingerprint,
        })
    }

    /// The attempt loop: send, classify, decide, wait, repeat.
    async fn fetch(
        &self,
        request: &RequestDescriptor,
        prepared: &Prepared,
        cancel: &CancelHandle,
    ) -> Result<(TransportResponse, usize)> {
        let retry = request.retry.as_ref().unwrap_or(&self.inner.retry);

        let mut headers = self.inner.default_headers.clone();
        for (name, value) in &request.headers {
            headers.append(name, value.clone());
        }
        if let Some(encoded) = &prepared.encoded {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(encoded.content_type));
            }
        }

        let mut attempt: u32 = 0;
        loop {
            tracing::debug!(
                method = %request.method,
                url = %prepared.url,
                attempt = attempt + 1,
                "Executing HTTP request"
            );

            let transport_request = TransportRequest {
                url: prepared.url.clone(),
                method: request.method.clone(),
                headers: headers.clone(),
                body: prepared
                    .encoded
                    .as_ref()
                    .map(|encoded| encoded.payload.clone()),
                timeout: prepared.timeout,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.inner.transport.send(transport_request) => result,
            };

            let error = match result {
                Ok(response) if response.status.is_success() => {
                    tracing::info!(
                        status = response.status.as_u16(),
                        attempts = attempt + 1,
                        "Received HTTP response"
                    );
                    return Ok((response, (attempt + 1) as usize));
                }
                Ok(response) => {
                    let raw_body = String::from_utf8_lossy(&response.body).into_owned();

                    if response.status.is_client_error() {
                        tracing::error!(
                            status = response.status.as_u16(),
                            response = %raw_body,
                            "Client error (4xx)"
                        );
                    } else {
                        tracing::warn!(
                            status = response.status.as_u16(),
                            response = %raw_body,
                            "Server error (5xx)"
                        );
                    }

                    let info = RateLimitInfo::from_headers(&response.headers);
                    Error::InvalidResponse {
                        status: response.status,
                        raw_body,
                        headers: response.headers,
                        rate_limit: info.is_rate_limited().then_some(info),
                    }
                }
                Err(transport_error) => Error::from(transport_error),
            };

            tracing::warn!(
                error = %error,
                attempt = attempt + 1,
                method = %request.method,
                path = %request.path,
                "Request failed"
            );

            match retry.decide(attempt, &error) {
                RetryDecision::Stop => {
                    if let Error::Unknown { source } = &error {
                        tracing::error!(error = %source, "Unclassified transport failure");
                    }
                    return Err(error);
                }
                RetryDecision::Retry { delay } => {
                    if error.rate_limit_info().is_some() {
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            "Rate limited - waiting before retry"
                        );
                    } else {
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            "Retrying request after delay"
                        );
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = self.inner.clock.sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn decode_payload<Res>(&self, outcome: &Dispatched) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        body::decode(&outcome.payload).map_err(|source| {
            let raw_body = String::from_utf8_lossy(&outcome.payload).into_owned();
            tracing::error!(
                error = %source,
                raw_response = %raw_body,
                "Failed to decode response"
            );
            Error::DecodingFailed {
                raw_body,
                source,
                status: outcome.status,
            }
        })
    }

    fn store_if_cacheable(&self, request: &RequestDescriptor, outcome: &Dispatched) {
        if outcome.from_cache || request.cache_policy == CachePolicy::Bypass {
            return;
        }
        let ttl = request
            .cache_ttl
            .unwrap_or_else(|| self.inner.cache.default_ttl());
        self.inner.cache.store(
            &outcome.fingerprint,
            outcome.payload.clone(),
            ttl,
            self.inner.clock.now(),
        );
        tracing::debug!(
            fingerprint = %outcome.fingerprint,
            cost = outcome.payload.len(),
            "Stored response in cache"
        );
    }
}

fn assemble<T>(data: T, outcome: Dispatched) -> Response<T> {
    if outcome.from_cache {
        Response::cached(data, outcome.payload, outcome.latency)
    } else {
        Response::new(
            data,
            outcome.payload,
            outcome.status,
            outcome.headers,
            outcome.latency,
            outcome.attempts,
        )
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use recall::{CacheConfig, ClientBuilder, RetryConfig};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), recall::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_config(RetryConfig::standard())
///     .cache_config(CacheConfig {
///         max_total_cost: 1024 * 1024,
///         default_ttl: Duration::from_secs(60),
///     })
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    retry: RetryConfig,
    cache: CacheConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings: no retries,
    /// the default cache configuration, and the system clock.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            transport: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the base URL that all request paths resolve against.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or cannot serve as a base.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!(
                "base URL `{}` cannot be a base",
                url
            )));
        }
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the client-wide request timeout. Individual requests can
    /// override it via [`RequestDescriptor::with_timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the client-wide retry configuration. Individual requests can
    /// override it via [`RequestDescriptor::with_retry`].
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the response cache configuration.
    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the default reqwest-backed transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replaces the system clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Configuration("Base URL is required".to_string()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                clock: self.clock,
                base_url,
                default_headers: self.default_headers,
                timeout: self.timeout,
                retry: self.retry,
                cache: ResponseCache::new(self.cache),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
