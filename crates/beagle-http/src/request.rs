//! HTTP request type.
//!
//! [`HttpRequest`] carries what the security layer and the route handlers need:
//! method, path, headers, body, scheme, and a typed
//! [`Extensions`](http::Extensions) map where middleware attaches per-request
//! context such as the authenticated identity.

use http::{Extensions, HeaderMap, Method};

/// An incoming HTTP request.
///
/// Instances are created from an Axum request via [`HttpRequest::from_axum`],
/// or with [`HttpRequest::builder`] in tests.
///
/// # Examples
///
/// ```
/// use beagle_http::HttpRequest;
///
/// let request = HttpRequest::builder()
///     .method(http::Method::POST)
///     .path("/api/user")
///     .header("content-type", "application/json")
///     .build();
///
/// assert_eq!(request.method(), &http::Method::POST);
/// assert_eq!(request.path(), "/api/user");
/// assert_eq!(request.header("content-type"), Some("application/json"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
    scheme: String,
    extensions: Extensions,
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`] for constructing an `HttpRequest`.
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Creates an `HttpRequest` from Axum/hyper request parts and body bytes.
    ///
    /// The scheme is `https` only when a proxy says so via `X-Forwarded-Proto`.
    pub fn from_axum(parts: http::request::Parts, body: Vec<u8>) -> Self {
        let scheme = if parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"))
        {
            "https".to_string()
        } else {
            "http".to_string()
        };

        Self {
            path: parts.uri.path().to_string(),
            method: parts.method,
            headers: parts.headers,
            body,
            scheme,
            extensions: Extensions::new(),
        }
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path. The query string is not kept.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8/ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` if the request arrived over HTTPS.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// Returns the value of the named cookie from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let cookie_header = self.header(http::header::COOKIE.as_str())?;
        cookie_header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// Returns the per-request extension map.
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the per-request extension map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

/// Builder for constructing [`HttpRequest`] instances in tests.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
    scheme: String,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            scheme: "http".to_string(),
        }
    }
}

impl HttpRequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Adds a header. Invalid names or values are silently skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets the scheme (http or https).
    #[must_use]
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Builds the [`HttpRequest`].
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            path: self.path,
            headers: self.headers,
            body: self.body,
            scheme: self.scheme,
            extensions: Extensions::new(),
        }
    }
}
