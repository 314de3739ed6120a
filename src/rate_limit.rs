//! Parsing of server throttle hints from response headers.
//!
//! When a response carries `Retry-After` or one of the common
//! `*RateLimit-Reset` headers, the retry engine prefers the server's word
//! over its own backoff schedule (see [`RetryConfig`](crate::RetryConfig)).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::HeaderMap;

/// Header names probed for an absolute reset timestamp, in order.
const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];

/// Throttle information extracted from a single response.
///
/// All fields are optional; servers vary widely in which headers they send.
///
/// # Examples
///
/// ```
/// use recall::RateLimitInfo;
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "60".parse().unwrap());
///
/// let info = RateLimitInfo::from_headers(&headers);
/// assert!(info.is_rate_limited());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Relative wait requested via `Retry-After`, either as plain seconds
    /// or as an HTTP-date converted to a duration from now.
    pub retry_after: Option<Duration>,

    /// Absolute time the quota window resets, from `X-RateLimit-Reset` or
    /// `RateLimit-Reset` (UNIX seconds).
    pub reset_at: Option<SystemTime>,

    /// Remaining requests in the current window, from `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Extracts whatever throttle hints the response headers carry.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: parse_retry_after(headers),
            reset_at: parse_reset_at(headers),
            remaining: parse_remaining(headers),
        }
    }

    /// Returns `true` if the response signalled throttling: an explicit
    /// wait hint, a reset timestamp, or an exhausted quota.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.reset_at.is_some() || self.remaining == Some(0)
    }

    /// How long the server asked us to wait, capped at `max_wait`.
    ///
    /// `Retry-After` wins over a reset timestamp when both are present. A
    /// reset timestamp already in the past yields no delay.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        let requested = self.retry_after.or_else(|| {
            self.reset_at
                .and_then(|at| at.duration_since(SystemTime::now()).ok())
        })?;
        Some(requested.min(max_wait))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = header_str(headers, "retry-after")?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    // RFC 9110 also allows an HTTP-date.
    let at = httpdate::parse_http_date(value).ok()?;
    at.duration_since(SystemTime::now()).ok()
}

fn parse_reset_at(headers: &HeaderMap) -> Option<SystemTime> {
    RESET_HEADERS.iter().find_map(|name| {
        let seconds = header_str(headers, name)?.parse::<u64>().ok()?;
        Some(UNIX_EPOCH + Duration::from_secs(seconds))
    })
}

fn parse_remaining(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, "x-ratelimit-remaining")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderName;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_retry_after_seconds() {
        let info = RateLimitInfo::from_headers(&headers(&[("retry-after", "120")]));
        assert_eq!(info.retry_after, Some(Duration::from_secs(120)));
        assert!(info.is_rate_limited());
    }

    #[test]
    fn test_retry_after_http_date() {
        let future = SystemTime::now() + Duration::from_secs(3600);
        let formatted = httpdate::fmt_http_date(future);
        let info = RateLimitInfo::from_headers(&headers(&[("retry-after", &formatted)]));

        let wait = info.retry_after.expect("should parse HTTP-date");
        assert!(wait > Duration::from_secs(3590));
        assert!(wait <= Duration::from_secs(3600));
    }

    #[test]
    fn test_retry_after_garbage_ignored() {
        let info = RateLimitInfo::from_headers(&headers(&[("retry-after", "soonish")]));
        assert_eq!(info.retry_after, None);
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_reset_header_variants() {
        let reset = SystemTime::now() + Duration::from_secs(60);
        let seconds = reset.duration_since(UNIX_EPOCH).unwrap().as_secs();
        let value = seconds.to_string();

        for name in ["x-ratelimit-reset", "ratelimit-reset"] {
            let info = RateLimitInfo::from_headers(&headers(&[(name, value.as_str())]));
            assert_eq!(
                info.reset_at,
                Some(UNIX_EPOCH + Duration::from_secs(seconds)),
                "header {name} should parse"
            );
            assert!(info.is_rate_limited());
        }
    }

    #[test]
    fn test_remaining_parsed() {
        let info = RateLimitInfo::from_headers(&headers(&[("x-ratelimit-remaining", "7")]));
        assert_eq!(info.remaining, Some(7));
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_exhausted_quota_is_rate_limited() {
        let info = RateLimitInfo::from_headers(&headers(&[("x-ratelimit-remaining", "0")]));
        assert!(info.is_rate_limited());
        assert_eq!(info.delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn test_delay_prefers_retry_after_over_reset() {
        let reset = SystemTime::now() + Duration::from_secs(600);
        let seconds = reset.duration_since(UNIX_EPOCH).unwrap().as_secs();
        let info = RateLimitInfo::from_headers(&headers(&[
            ("retry-after", "30"),
            ("x-ratelimit-reset", &seconds.to_string()),
        ]));

        assert_eq!(
            info.delay(Duration::from_secs(300)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_delay_capped_at_max_wait() {
        let info = RateLimitInfo::from_headers(&headers(&[("retry-after", "3600")]));
        assert_eq!(
            info.delay(Duration::from_secs(300)),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_delay_from_reset_timestamp() {
        let reset = SystemTime::now() + Duration::from_secs(90);
        let seconds = reset.duration_since(UNIX_EPOCH).unwrap().as_secs();
        let info =
            RateLimitInfo::from_headers(&headers(&[("x-ratelimit-reset", &seconds.to_string())]));

        let wait = info
            .delay(Duration::from_secs(300))
            .expect("should have delay");
        assert!(wait > Duration::from_secs(80));
        assert!(wait <= Duration::from_secs(90));
    }

    #[test]
    fn test_past_reset_yields_no_delay() {
        let info = RateLimitInfo::from_headers(&headers(&[("x-ratelimit-reset", "1")]));
        assert_eq!(info.delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn test_no_headers_no_info() {
        let info = RateLimitInfo::from_headers(&HeaderMap::new());
        assert!(!info.is_rate_limited());
        assert_eq!(info.delay(Duration::from_secs(300)), None);
    }
}
