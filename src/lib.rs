//! # Recall - A resilient HTTP client with response caching
//!
//! Recall is a type-safe, retry-aware HTTP client library built on top of `reqwest`.
//! It adds a cost-bounded response cache, a closed error taxonomy, cancellation of
//! in-flight calls, and preserves raw response data for debugging.
//!
//! ## Quick Start
//!
//! ```no_run
//! use recall::{Client, RetryConfig};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), recall::Error> {
//!     // One client per API; clones are cheap and share the cache.
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .retry_config(RetryConfig::standard())
//!         .build()?;
//!
//!     // A GET repeated within the cache TTL is served locally without
//!     // touching the network.
//!     let user = client.get::<User>("/users/123").await?;
//!     println!("user: {}", user.data.name);
//!     println!("took {:?}", user.latency);
//!
//!     // POST requests are never cached by default.
//!     let new_user = CreateUser {
//!         name: "Nia".to_string(),
//!         email: "nia@example.com".to_string(),
//!     };
//!     let created = client.post::<_, User>("/users", &new_user).await?;
//!     println!("created user {}", created.data.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Type-safe requests and responses** - Generic over request/response types with automatic JSON serialization
//! - **Response caching** - Cost-bounded LRU cache with per-request TTLs and cache policies
//! - **Closed error taxonomy** - Every failure maps to one documented [`Error`] variant, with raw responses preserved
//! - **Flexible retry logic** - Exponential backoff with jitter, honoring server `Retry-After` hints
//! - **Cancellation** - Cancel in-flight calls, including retry waits, through a cloneable [`CancelHandle`]
//! - **Pluggable transport and clock** - Swap the reqwest transport or the clock for deterministic tests
//! - **Automatic logging** - Structured logging with `tracing` for observability
//! - **Builder pattern** - Fluent API for configuring clients
//! - **Connection pooling** - Reusable clients with efficient connection management
//!
//! ## Error Handling
//!
//! Recall classifies every failure into a small, closed set of variants while
//! preserving raw response data:
//!
//! ```no_run
//! use recall::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get::<serde_json::Value>("/endpoint").await {
//!     Ok(response) => {
//!         println!("Success: {:?}", response.data);
//!     }
//!     Err(Error::DecodingFailed { raw_body, source, status }) => {
//!         eprintln!("Failed to decode (status {}):", status);
//!         eprintln!("  Raw response: {}", raw_body);
//!         eprintln!("  Error: {}", source);
//!     }
//!     Err(Error::InvalidResponse { status, raw_body, .. }) => {
//!         eprintln!("HTTP error {}: {}", status, raw_body);
//!     }
//!     Err(e) => {
//!         eprintln!("Other error: {}", e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Caching
//!
//! GET and HEAD responses are cached by default. Per-request policies control
//! lookups and TTLs:
//!
//! ```no_run
//! use recall::{CachePolicy, Client, RequestDescriptor, Response};
//! use http::Method;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), recall::Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! // First call hits the network, the second is served from cache.
//! let fresh: Response<serde_json::Value> = client.get("/reports/daily").await?;
//! assert!(!fresh.from_cache);
//! let cached: Response<serde_json::Value> = client.get("/reports/daily").await?;
//! assert!(cached.from_cache);
//!
//! // Force a refetch while keeping the cache warm for later calls.
//! let request = RequestDescriptor::new(Method::GET, "/reports/daily")
//!     .with_cache_policy(CachePolicy::Refresh)
//!     .with_cache_ttl(Duration::from_secs(30));
//! client.execute::<serde_json::Value>(request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! Configure how the client handles transient failures:
//!
//! ```no_run
//! use recall::{Client, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), recall::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .retry_config(RetryConfig {
//!         max_retries: 5,
//!         base_delay: Duration::from_millis(100),
//!         max_delay: Duration::from_secs(10),
//!         // Jitter spreads out retry storms from many clients.
//!         jitter: true,
//!         ..RetryConfig::standard()
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod body;
mod cache;
mod client;
mod clock;
mod endpoint;
mod error;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
mod transport;

pub use body::{Body, Fields, Scalar};
pub use cache::{CacheConfig, CacheStats};
pub use client::{CancelHandle, Client, ClientBuilder};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use rate_limit::RateLimitInfo;
pub use request::{CachePolicy, RequestDescriptor};
pub use response::Response;
pub use retry::{RetryConfig, RetryDecision, DEFAULT_RETRYABLE_STATUSES};
pub use transport::{
    BoxError, ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
