//! URL resolution and cache fingerprints.
//!
//! Resolution is deterministic: the same base URL and descriptor always
//! produce byte-identical URLs, which is what makes cache keys stable.

use http::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::request::RequestDescriptor;

/// Joins the base URL with the descriptor's path and query parameters.
///
/// The base's path and the request path are joined with exactly one slash
/// regardless of trailing or leading slashes on either side. Query
/// parameters are emitted sorted by key and percent-encoded. Any query or
/// fragment on the base itself is dropped.
pub(crate) fn resolve(base: &Url, request: &RequestDescriptor) -> Result<Url> {
    if base.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!(
            "base URL `{base}` cannot be a base"
        )));
    }
    if request.path.is_empty() {
        return Err(Error::InvalidUrl(
            "request path must not be empty".to_string(),
        ));
    }
    if request.path.contains("://") {
        return Err(Error::InvalidUrl(format!(
            "request path `{}` must not contain a scheme",
            request.path
        )));
    }

    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        request.path.trim_start_matches('/')
    );

    let mut url = base.clone();
    url.set_path(&joined);
    url.set_query(None);
    url.set_fragment(None);

    if !request.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &request.query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// The cache key for a resolved request: method, path, and the sorted
/// query string, e.g. `GET:/users:page=1`.
pub(crate) fn fingerprint(method: &Method, url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}:{}:{}", method, url.path(), query),
        _ => format!("{}:{}", method, url.path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn get(path: &str) -> RequestDescriptor {
        RequestDescriptor::new(Method::GET, path)
    }

    #[test]
    fn test_exactly_one_separating_slash() {
        let cases = [
            ("https://api.example.com", "users"),
            ("https://api.example.com", "/users"),
            ("https://api.example.com/", "users"),
            ("https://api.example.com/", "/users"),
        ];
        for (base_url, path) in cases {
            let url = resolve(&base(base_url), &get(path)).unwrap();
            assert_eq!(
                url.as_str(),
                "https://api.example.com/users",
                "base {base_url} + path {path}"
            );
        }
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let url = resolve(&base("https://api.example.com/v2/"), &get("/users")).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/users");
    }

    #[test]
    fn test_query_params_sorted_by_key() {
        let request = get("/users")
            .with_query_param("zeta", "1")
            .with_query_param("alpha", "2")
            .with_query_param("mid", "3");
        let url = resolve(&base("https://api.example.com"), &request).unwrap();
        assert_eq!(url.query(), Some("alpha=2&mid=3&zeta=1"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let request = get("/search")
            .with_query_param("q", "rust http client")
            .with_query_param("page", "1");
        let b = base("https://api.example.com");
        assert_eq!(
            resolve(&b, &request).unwrap().as_str(),
            resolve(&b, &request).unwrap().as_str()
        );
    }

    #[test]
    fn test_no_query_means_no_question_mark() {
        let url = resolve(&base("https://api.example.com"), &get("/users")).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_values_are_encoded() {
        let request = get("/user profile").with_query_param("name", "a&b c");
        let url = resolve(&base("https://api.example.com"), &request).unwrap();
        assert_eq!(url.path(), "/user%20profile");
        assert_eq!(url.query(), Some("name=a%26b+c"));
    }

    #[test]
    fn test_base_query_and_fragment_dropped() {
        let url = resolve(
            &base("https://api.example.com/api?token=secret#frag"),
            &get("/users").with_query_param("page", "1"),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/users?page=1");
    }

    #[test]
    fn test_path_with_scheme_rejected() {
        let result = resolve(
            &base("https://api.example.com"),
            &get("https://evil.example.com/steal"),
        );
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = resolve(&base("https://api.example.com"), &get(""));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_non_base_url_rejected() {
        let result = resolve(&base("mailto:ops@example.com"), &get("/users"));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_fingerprint_format() {
        let url = resolve(
            &base("https://api.example.com"),
            &get("/users").with_query_param("page", "1"),
        )
        .unwrap();
        assert_eq!(fingerprint(&Method::GET, &url), "GET:/users:page=1");

        let bare = resolve(&base("https://api.example.com"), &get("/users")).unwrap();
        assert_eq!(fingerprint(&Method::GET, &bare), "GET:/users");
    }

    #[test]
    fn test_fingerprint_distinguishes_method_and_query() {
        let b = base("https://api.example.com");
        let url_one = resolve(&b, &get("/users").with_query_param("page", "1")).unwrap();
        let url_two = resolve(&b, &get("/users").with_query_param("page", "2")).unwrap();

        assert_ne!(
            fingerprint(&Method::GET, &url_one),
            fingerprint(&Method::GET, &url_two)
        );
        assert_ne!(
            fingerprint(&Method::GET, &url_one),
            fingerprint(&Method::HEAD, &url_one)
        );
    }
}
