//! Error types for HTTP API calls.
//!
//! The error enum is a closed taxonomy: every failure the client can
//! produce maps onto exactly one variant, and transport-level failures are
//! classified before they reach the caller. Errors preserve maximum
//! debugging information, including raw response bodies and headers where
//! available.

use std::time::Duration;

use http::{HeaderMap, StatusCode};

use crate::rate_limit::RateLimitInfo;
use crate::transport::{BoxError, TransportError};

/// The main error type for HTTP API calls.
///
/// # Examples
///
/// ```no_run
/// use recall::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::DecodingFailed { raw_body, source, .. }) => {
///         eprintln!("Failed to decode. Raw response: {raw_body}");
///         eprintln!("Serde error: {source}");
///     }
///     Err(Error::InvalidResponse { status, raw_body, .. }) => {
///         eprintln!("HTTP error {status}: {raw_body}");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A request URL could not be built from the base URL and path.
    ///
    /// Raised before any I/O happens: a malformed base, an empty path, or
    /// a path that smuggles in its own scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No route to the server: the connection was refused, reset, or the
    /// network is down.
    #[error("No connectivity: {source}")]
    NoConnectivity {
        /// The underlying transport error
        #[source]
        source: BoxError,
    },

    /// A single attempt exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// The target host could not be resolved.
    #[error("Host unreachable: {source}")]
    HostUnreachable {
        /// The underlying resolver error
        #[source]
        source: BoxError,
    },

    /// The server returned a non-2xx HTTP status code.
    ///
    /// Includes the full response details for debugging, plus any throttle
    /// hints the server sent along (especially for 429 responses).
    #[error("HTTP error {status}: {raw_body}")]
    InvalidResponse {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_body: String,
        /// The response headers
        headers: HeaderMap,
        /// Rate limit information parsed from headers
        rate_limit: Option<RateLimitInfo>,
    },

    /// Failed to decode the response body into the expected type.
    ///
    /// Preserves the raw response text alongside the serde error, making
    /// shape mismatches easy to debug in production.
    #[error("Failed to decode response (status {status}): {source}")]
    DecodingFailed {
        /// The raw response body that failed to decode
        raw_body: String,
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
        /// The HTTP status code of the response
        status: StatusCode,
    },

    /// Failed to encode the request body.
    ///
    /// Raised before any I/O happens.
    #[error("Failed to encode request body: {source}")]
    EncodingFailed {
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// A transport failure the client could not classify further.
    ///
    /// The underlying error is preserved and logged; nothing is silently
    /// discarded.
    #[error("Unknown transport error: {source}")]
    Unknown {
        /// The unclassified transport error
        #[source]
        source: BoxError,
    },

    /// Invalid configuration was provided to the builder.
    ///
    /// Only ever returned while constructing a client, never from an
    /// executed request.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Returns `true` if this error is worth retrying.
    ///
    /// Connectivity failures, timeouts, and unresolvable hosts are always
    /// retryable. Status errors are retryable when the status appears in
    /// `retryable_statuses`. Everything else, including cancellation and
    /// codec failures, is terminal.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall::retry::DEFAULT_RETRYABLE_STATUSES;
    /// use recall::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::InvalidResponse {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     raw_body: "unavailable".to_string(),
    ///     headers: http::HeaderMap::new(),
    ///     rate_limit: None,
    /// };
    /// assert!(err.is_retryable(&DEFAULT_RETRYABLE_STATUSES));
    ///
    /// let err = Error::InvalidResponse {
    ///     status: StatusCode::NOT_FOUND,
    ///     raw_body: "no such user".to_string(),
    ///     headers: http::HeaderMap::new(),
    ///     rate_limit: None,
    /// };
    /// assert!(!err.is_retryable(&DEFAULT_RETRYABLE_STATUSES));
    /// ```
    pub fn is_retryable(&self, retryable_statuses: &[u16]) -> bool {
        match self {
            Error::NoConnectivity { .. } => true,
            Error::Timeout => true,
            Error::HostUnreachable { .. } => true,
            Error::InvalidResponse { status, .. } => retryable_statuses.contains(&status.as_u16()),
            Error::InvalidUrl(_) => false,
            Error::DecodingFailed { .. } => false,
            Error::EncodingFailed { .. } => false,
            Error::Cancelled => false,
            Error::Unknown { .. } => false,
            Error::Configuration(_) => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    ///
    /// Returns `Some(status)` for `InvalidResponse` and `DecodingFailed`,
    /// `None` for other error types.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::InvalidResponse { status, .. } => Some(*status),
            Error::DecodingFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::InvalidResponse { raw_body, .. } => Some(raw_body),
            Error::DecodingFailed { raw_body, .. } => Some(raw_body),
            _ => None,
        }
    }

    /// Returns rate limit information if available.
    ///
    /// Only present for `InvalidResponse` errors whose headers carried
    /// throttle hints.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::InvalidResponse { rate_limit, .. } => rate_limit.as_ref(),
            _ => None,
        }
    }

    /// Returns the wait the server requested, capped by `max_wait`.
    pub fn rate_limit_delay(&self, max_wait: Duration) -> Option<Duration> {
        self.rate_limit_info()?.delay(max_wait)
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::InvalidUrl(error.to_string())
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connect { source } => Error::NoConnectivity { source },
            TransportError::Dns { source } => Error::HostUnreachable { source },
            TransportError::TimedOut => Error::Timeout,
            TransportError::Aborted => Error::Cancelled,
            TransportError::Other { source } => Error::Unknown { source },
        }
    }
}

/// A specialized `Result` type for HTTP API calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::DEFAULT_RETRYABLE_STATUSES;

    fn status_error(status: StatusCode) -> Error {
        Error::InvalidResponse {
            status,
            raw_body: String::new(),
            headers: HeaderMap::new(),
            rate_limit: None,
        }
    }

    fn boxed(message: &str) -> BoxError {
        message.to_string().into()
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(Error::NoConnectivity {
            source: boxed("refused")
        }
        .is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(Error::Timeout.is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(Error::HostUnreachable {
            source: boxed("no such host")
        }
        .is_retryable(&DEFAULT_RETRYABLE_STATUSES));
    }

    #[test]
    fn test_terminal_kinds_are_not_retryable() {
        let decode = Error::DecodingFailed {
            raw_body: "not json".to_string(),
            source: serde_json::from_str::<u32>("not json").unwrap_err(),
            status: StatusCode::OK,
        };
        assert!(!decode.is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(!Error::Cancelled.is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(!Error::InvalidUrl("bad".to_string()).is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(!Error::Unknown {
            source: boxed("mystery")
        }
        .is_retryable(&DEFAULT_RETRYABLE_STATUSES));
    }

    #[test]
    fn test_status_retryability_follows_configured_set() {
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE)
            .is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS)
            .is_retryable(&DEFAULT_RETRYABLE_STATUSES));
        assert!(!status_error(StatusCode::NOT_FOUND).is_retryable(&DEFAULT_RETRYABLE_STATUSES));

        // A custom set overrides the defaults entirely.
        assert!(status_error(StatusCode::NOT_FOUND).is_retryable(&[404]));
        assert!(!status_error(StatusCode::SERVICE_UNAVAILABLE).is_retryable(&[404]));
    }

    #[test]
    fn test_transport_error_classification_is_total() {
        let cases: Vec<(TransportError, fn(&Error) -> bool)> = vec![
            (
                TransportError::Connect {
                    source: boxed("refused"),
                },
                |e| matches!(e, Error::NoConnectivity { .. }),
            ),
            (
                TransportError::Dns {
                    source: boxed("lookup failed"),
                },
                |e| matches!(e, Error::HostUnreachable { .. }),
            ),
            (TransportError::TimedOut, |e| matches!(e, Error::Timeout)),
            (TransportError::Aborted, |e| matches!(e, Error::Cancelled)),
            (
                TransportError::Other {
                    source: boxed("mystery"),
                },
                |e| matches!(e, Error::Unknown { .. }),
            ),
        ];

        for (transport_error, expected) in cases {
            let error = Error::from(transport_error);
            assert!(expected(&error), "unexpected mapping: {error:?}");
        }
    }

    #[test]
    fn test_status_and_raw_response_accessors() {
        let error = status_error(StatusCode::BAD_GATEWAY);
        assert_eq!(error.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(error.raw_response(), Some(""));

        assert_eq!(Error::Timeout.status(), None);
        assert_eq!(Error::Timeout.raw_response(), None);
    }

    #[test]
    fn test_rate_limit_delay_reads_attached_info() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "42".parse().unwrap());
        let info = RateLimitInfo::from_headers(&headers);

        let error = Error::InvalidResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            raw_body: String::new(),
            headers,
            rate_limit: Some(info),
        };

        assert_eq!(
            error.rate_limit_delay(Duration::from_secs(300)),
            Some(Duration::from_secs(42))
        );
        assert_eq!(
            error.rate_limit_delay(Duration::from_secs(10)),
            Some(Duration::from_secs(10))
        );
    }
}
