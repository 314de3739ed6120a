//! The pluggable HTTP transport boundary.
//!
//! Everything above this module is pure orchestration: building URLs,
//! encoding bodies, consulting the cache, deciding retries. The
//! [`Transport`] trait is where bytes actually hit the network. The
//! default implementation wraps [`reqwest`]; tests swap in scripted
//! transports that replay canned responses.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Boxed error source carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single HTTP exchange, fully resolved: absolute URL, merged headers,
/// encoded body bytes, and the per-attempt deadline.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// The raw result of one exchange: status, headers, and the body bytes
/// read to completion.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How a transport attempt failed, before any HTTP status was produced.
///
/// Non-2xx statuses are not transport errors; they arrive as a normal
/// [`TransportResponse`] and are classified by the client.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The connection could not be established or was torn down mid-flight.
    #[error("connection failed: {source}")]
    Connect {
        #[source]
        source: BoxError,
    },

    /// Name resolution failed for the target host.
    #[error("DNS resolution failed: {source}")]
    Dns {
        #[source]
        source: BoxError,
    },

    /// The attempt exceeded its deadline.
    #[error("attempt deadline elapsed")]
    TimedOut,

    /// The attempt was aborted by the caller.
    #[error("request aborted")]
    Aborted,

    /// Anything the transport could not classify further.
    #[error("transport failure: {source}")]
    Other {
        #[source]
        source: BoxError,
    },
}

/// Sends one fully-prepared request and returns the raw response.
///
/// Implementations must not retry internally; the client owns the retry
/// loop and calls `send` once per attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// The default [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with reqwest's default settings.
    pub fn new() -> Result<Self, crate::Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| crate::Error::Configuration(format!("Failed to build transport: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing [`reqwest::Client`], keeping its connection pool.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps a [`reqwest::Error`] onto the closed [`TransportError`] set.
///
/// reqwest flattens hyper's failure detail into an opaque error chain, so
/// classification walks the chain: timeouts first, then DNS lookups, then
/// connection-level I/O failures. Whatever remains is `Other` with the
/// original error preserved as the source.
fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::TimedOut;
    }
    if chain_has_dns_failure(&error) {
        return TransportError::Dns {
            source: Box::new(error),
        };
    }
    if error.is_connect() || chain_has_connection_io_error(&error) {
        return TransportError::Connect {
            source: Box::new(error),
        };
    }
    TransportError::Other {
        source: Box::new(error),
    }
}

fn error_chain<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(error), |e| e.source())
}

fn chain_has_dns_failure(error: &(dyn std::error::Error + 'static)) -> bool {
    // hyper surfaces resolver failures only as message text, e.g.
    // "dns error: failed to lookup address information".
    error_chain(error).any(|e| {
        let text = e.to_string().to_ascii_lowercase();
        text.contains("dns error") || text.contains("failed to lookup address")
    })
}

fn chain_has_connection_io_error(error: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind;

    error_chain(error).any(|e| {
        e.downcast_ref::<std::io::Error>().is_some_and(|io| {
            matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapper {
        message: &'static str,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    }

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for Wrapper {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source
                .as_deref()
                .map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn test_dns_failure_detected_in_chain() {
        let inner = Wrapper {
            message: "dns error: failed to lookup address information",
            source: None,
        };
        let outer = Wrapper {
            message: "error sending request",
            source: Some(Box::new(inner)),
        };
        assert!(chain_has_dns_failure(&outer));
    }

    #[test]
    fn test_plain_failure_is_not_dns() {
        let error = Wrapper {
            message: "error sending request",
            source: None,
        };
        assert!(!chain_has_dns_failure(&error));
    }

    #[test]
    fn test_connection_refused_detected_in_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = Wrapper {
            message: "error sending request",
            source: Some(Box::new(io)),
        };
        assert!(chain_has_connection_io_error(&outer));
    }

    #[test]
    fn test_unrelated_io_error_is_not_connection_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let outer = Wrapper {
            message: "error sending request",
            source: Some(Box::new(io)),
        };
        assert!(!chain_has_connection_io_error(&outer));
    }
}
