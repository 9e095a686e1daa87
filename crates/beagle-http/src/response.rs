//! HTTP response types.
//!
//! [`HttpResponse`] is what middleware and handlers return; it converts into
//! an Axum response via [`IntoResponse`]. [`JsonResponse`] serializes a value
//! and sets the JSON content type.

use axum::response::IntoResponse;
use http::{HeaderMap, HeaderValue, StatusCode};

use beagle_core::BeagleError;

/// An HTTP response.
///
/// # Examples
///
/// ```
/// use beagle_http::HttpResponse;
///
/// let response = HttpResponse::unauthorized("Authentication required.");
/// assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
/// ```
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    content_type: String,
}

impl HttpResponse {
    /// Creates a new `HttpResponse` with the given status code and text body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into().into_bytes(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    /// Creates a 200 OK response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request(body: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, body)
    }

    /// Creates a 401 Unauthorized response.
    pub fn unauthorized(body: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, body)
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden(body: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, body)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(body: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, body)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn server_error(body: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }

    /// Creates a 405 Method Not Allowed response with the list of permitted methods.
    pub fn not_allowed(permitted_methods: &[&str]) -> Self {
        let allow = permitted_methods.join(", ");
        let mut response = Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method Not Allowed. Permitted: {allow}"),
        );
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers.insert(http::header::ALLOW, value);
        }
        response
    }

    /// Builds the client-facing response for an error.
    ///
    /// Client errors (4xx) keep their message. Server errors are reduced to a
    /// generic message so no internal detail leaks; the caller logs the cause.
    pub fn from_error(error: &BeagleError) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            Self::server_error("Internal server error.")
        } else {
            Self::new(status, error.to_string())
        }
    }

    /// Returns the status code.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns a reference to the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Adds a header to the response.
    #[must_use]
    pub fn set_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Sets the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Returns the response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the response body as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status, self.body).into_response();
        if let Ok(ct) = HeaderValue::from_str(&self.content_type) {
            response.headers_mut().insert(http::header::CONTENT_TYPE, ct);
        }
        for (key, value) in &self.headers {
            response.headers_mut().append(key, value.clone());
        }
        response
    }
}

/// A JSON response.
pub struct JsonResponse;

impl JsonResponse {
    /// Creates a 200 OK JSON response from a serializable value.
    pub fn new<T: serde::Serialize>(data: &T) -> HttpResponse {
        Self::with_status(StatusCode::OK, data)
    }

    /// Creates a JSON response with a custom status code.
    ///
    /// Serialization failures become a generic 500 response.
    pub fn with_status<T: serde::Serialize>(status: StatusCode, data: &T) -> HttpResponse {
        match serde_json::to_string(data) {
            Ok(json) => {
                let mut response = HttpResponse::new(status, json);
                response.set_content_type("application/json");
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "JSON serialization failed");
                HttpResponse::server_error("Internal server error.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_constructors() {
        assert_eq!(HttpResponse::ok("x").status(), StatusCode::OK);
        assert_eq!(HttpResponse::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(HttpResponse::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(HttpResponse::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(HttpResponse::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            HttpResponse::server_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_allowed_sets_allow_header() {
        let response = HttpResponse::not_allowed(&["GET", "POST"]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "GET, POST");
    }

    #[test]
    fn test_from_error_keeps_client_message() {
        let response = HttpResponse::from_error(&BeagleError::Conflict("user exists".into()));
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.text().contains("user exists"));
    }

    #[test]
    fn test_from_error_hides_server_detail() {
        let response = HttpResponse::from_error(&BeagleError::UserStoreError(
            "connection refused to db-01:5432".into(),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.text().contains("db-01"));
    }

    #[test]
    fn test_json_response() {
        let response = JsonResponse::new(&serde_json::json!({"identifier": "alice"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type(), "application/json");
        assert_eq!(response.text(), r#"{"identifier":"alice"}"#);
    }

    #[test]
    fn test_into_axum_response_copies_headers() {
        let response = HttpResponse::unauthorized("no").set_header(
            http::header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"beagle\""),
        );
        let axum_response = response.into_response();
        assert_eq!(axum_response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            axum_response.headers().get(http::header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"beagle\""
        );
        assert_eq!(
            axum_response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
