//! Response envelope with rich call metadata.
//!
//! Every successful call returns a [`Response`] wrapping the decoded data
//! together with the raw body, status, headers, observed latency, the
//! number of transport attempts it took, and whether the payload was
//! served from the cache.

use std::ops::Deref;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// A successful response with the decoded data and call metadata.
///
/// # Examples
///
/// ```no_run
/// use recall::{Client, Error};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Error> {
/// # let client = Client::builder().base_url("https://api.example.com")?.build()?;
/// let response = client.get::<User>("/users/1").await?;
///
/// println!("user: {}", response.data.name);
/// println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
/// if response.from_cache {
///     println!("served from cache");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data
    pub data: T,

    /// The raw response body
    pub raw_body: Bytes,

    /// The HTTP status code
    pub status: StatusCode,

    /// The response headers
    pub headers: HeaderMap,

    /// Time from dispatch until the body was read to completion
    pub latency: Duration,

    /// Transport attempts made: 1 means no retries, 0 means the payload
    /// came from the cache without touching the network
    pub attempts: usize,

    /// Whether the payload was served from the response cache
    pub from_cache: bool,
}

impl<T> Response<T> {
    /// Creates a response envelope for a payload that arrived over the
    /// network.
    pub fn new(
        data: T,
        raw_body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
            from_cache: false,
        }
    }

    /// Creates an envelope for a payload served from the cache.
    ///
    /// Cached entries keep only the payload, so the status is reported as
    /// 200 (only successful responses are ever stored), the header map is
    /// empty, and the attempt count is zero.
    pub(crate) fn cached(data: T, raw_body: Bytes, latency: Duration) -> Self {
        Self {
            data,
            raw_body,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            latency,
            attempts: 0,
            from_cache: true,
        }
    }

    /// Transforms the decoded data while keeping all metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall::Response;
    /// use bytes::Bytes;
    /// use http::StatusCode;
    /// use std::time::Duration;
    ///
    /// let response = Response::new(
    ///     vec![1, 2, 3],
    ///     Bytes::from_static(b"[1,2,3]"),
    ///     StatusCode::OK,
    ///     http::HeaderMap::new(),
    ///     Duration::from_millis(42),
    ///     1,
    /// );
    ///
    /// let count = response.map(|data| data.len());
    /// assert_eq!(count.data, 3);
    /// assert_eq!(count.latency, Duration::from_millis(42));
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            from_cache: self.from_cache,
        }
    }

    /// Returns `true` if the call needed more than one transport attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Looks up a response header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(attempts: usize) -> Response<String> {
        Response::new(
            "hello".to_string(),
            Bytes::from_static(b"\"hello\""),
            StatusCode::OK,
            HeaderMap::new(),
            Duration::from_millis(10),
            attempts,
        )
    }

    #[test]
    fn test_map_preserves_metadata() {
        let response = sample(2).map(|data| data.len());
        assert_eq!(response.data, 5);
        assert_eq!(response.attempts, 2);
        assert_eq!(response.status, StatusCode::OK);
        assert!(!response.from_cache);
    }

    #[test]
    fn test_was_retried_boundary() {
        assert!(!sample(1).was_retried());
        assert!(sample(2).was_retried());
    }

    #[test]
    fn test_cached_envelope_has_no_transport_metadata() {
        let response = Response::cached(
            42u32,
            Bytes::from_static(b"42"),
            Duration::from_micros(3),
        );
        assert!(response.from_cache);
        assert_eq!(response.attempts, 0);
        assert!(!response.was_retried());
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_deref_reaches_data() {
        let response = sample(1);
        assert_eq!(response.len(), 5);
        assert_eq!(*response, "hello");
    }
}
