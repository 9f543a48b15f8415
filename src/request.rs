//! Endpoint descriptor for a session connection.

use url::Url;

use crate::error::{Error, Result};

/// A connection request: target URL plus extra handshake headers.
///
/// Only the URL takes part in endpoint identity; two requests with the same
/// URL but different headers address the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Create a request for `url` with no extra headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Append a handshake header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The URL as given.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extra handshake headers, in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Parse and check the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the URL is blank, does not parse
    /// as an absolute URL, or has no host.
    pub fn validate(&self) -> Result<Url> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(Error::InvalidRequest("empty URL".into()));
        }
        let url = Url::parse(raw)?;
        if !url.has_host() {
            return Err(Error::InvalidRequest(format!("URL has no host: {raw}")));
        }
        Ok(url)
    }

    /// Whether `self` and `other` address the same endpoint.
    #[must_use]
    pub fn same_endpoint(&self, other: &Request) -> bool {
        match (Url::parse(self.url.trim()), Url::parse(other.url.trim())) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.url == other.url,
        }
    }
}

impl From<&str> for Request {
    fn from(url: &str) -> Self {
        Request::new(url)
    }
}

impl From<String> for Request {
    fn from(url: String) -> Self {
        Request::new(url)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = Request::new("ws://127.0.0.1:9001/chat");
        let url = req.validate().unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(9001));
    }

    #[test]
    fn test_blank_url_rejected() {
        assert!(matches!(
            Request::new("   ").validate(),
            Err(Error::InvalidRequest(_))
        ));
        assert!(Request::new("").validate().is_err());
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(Request::new("/chat").validate().is_err());
    }

    #[test]
    fn test_url_without_host_rejected() {
        assert!(Request::new("unix:/tmp/socket").validate().is_err());
    }

    #[test]
    fn test_same_endpoint_ignores_headers() {
        let a = Request::new("ws://example.com/ws").with_header("Authorization", "Bearer x");
        let b = Request::new("ws://example.com/ws");
        assert!(a.same_endpoint(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_endpoint_normalizes() {
        let a = Request::new("WS://Example.com/ws");
        let b = Request::new("ws://example.com/ws");
        assert!(a.same_endpoint(&b));
        assert!(!a.same_endpoint(&Request::new("ws://example.com/other")));
    }

    #[test]
    fn test_headers_kept_in_order() {
        let req = Request::new("wss://example.com")
            .with_header("X-One", "1")
            .with_header("X-Two", "2");
        assert_eq!(req.headers()[0].0, "X-One");
        assert_eq!(req.headers()[1].1, "2");
        assert_eq!(req.to_string(), "wss://example.com");
    }
}
