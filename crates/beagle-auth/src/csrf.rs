//! Double-submit-cookie CSRF protection.
//!
//! Installed only when `security.csrf_enabled` is true. With it disabled the
//! server neither issues nor checks tokens, which is how the stock
//! `beagle.toml` runs: the API is used by non-browser clients that send HTTP
//! Basic credentials explicitly, so there is no ambient cookie to forge.
//!
//! When enabled:
//!
//! - Responses to safe methods (GET, HEAD, OPTIONS, TRACE) carry a fresh token
//!   cookie if the request had none.
//! - Unsafe methods must echo the cookie's token in the configured header,
//!   either as-is or masked. Requests from a trusted `Origin` are exempt.
//! - A failed check is a 403 before the authentication gate runs.
//!
//! Tokens are 32 random bytes, URL-safe base64 without padding. A masked
//! token is `mask || (token XOR mask)` in the same encoding, so the value the
//! client echoes changes on every response.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use beagle_core::settings::SecuritySettings;
use beagle_http::{HttpRequest, HttpResponse, Middleware};
use http::{HeaderValue, Method};
use rand::RngCore;

const TOKEN_BYTES: usize = 32;

/// CSRF middleware configured from [`SecuritySettings`].
#[derive(Debug, Clone)]
pub struct CsrfMiddleware {
    cookie_name: String,
    header_name: String,
    trusted_origins: Vec<String>,
}

impl CsrfMiddleware {
    /// Builds the middleware from the CSRF fields of `settings`.
    pub fn from_settings(settings: &SecuritySettings) -> Self {
        Self {
            cookie_name: settings.csrf_cookie_name.clone(),
            header_name: settings.csrf_header_name.clone(),
            trusted_origins: settings
                .csrf_trusted_origins
                .iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    const fn is_safe_method(method: &Method) -> bool {
        matches!(
            *method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    fn origin_is_trusted(&self, request: &HttpRequest) -> bool {
        request
            .header(http::header::ORIGIN.as_str())
            .is_some_and(|origin| {
                let origin = origin.trim_end_matches('/');
                self.trusted_origins.iter().any(|t| t == origin)
            })
    }

    fn check(&self, request: &HttpRequest) -> Result<(), &'static str> {
        if Self::is_safe_method(request.method()) || self.origin_is_trusted(request) {
            return Ok(());
        }
        let cookie = request
            .cookie(&self.cookie_name)
            .ok_or("CSRF cookie not set")?;
        let supplied = request
            .header(&self.header_name)
            .ok_or("CSRF token missing")?;
        if tokens_match(supplied, cookie) {
            Ok(())
        } else {
            Err("CSRF token mismatch")
        }
    }

    fn token_cookie(&self, token: &str, secure: bool) -> Option<HeaderValue> {
        let mut cookie = format!("{}={token}; Path=/; SameSite=Strict", self.cookie_name);
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

#[async_trait]
impl Middleware for CsrfMiddleware {
    async fn process_request(&self, request: &mut HttpRequest) -> Option<HttpResponse> {
        match self.check(request) {
            Ok(()) => None,
            Err(reason) => {
                tracing::info!(
                    method = %request.method(),
                    path = request.path(),
                    reason,
                    "CSRF verification failed"
                );
                Some(HttpResponse::forbidden("CSRF verification failed."))
            }
        }
    }

    async fn process_response(
        &self,
        request: &HttpRequest,
        mut response: HttpResponse,
    ) -> HttpResponse {
        if Self::is_safe_method(request.method()) && request.cookie(&self.cookie_name).is_none() {
            if let Some(value) = self.token_cookie(&generate_token(), request.is_secure()) {
                response
                    .headers_mut()
                    .append(http::header::SET_COOKIE, value);
            }
        }
        response
    }
}

/// Generates a fresh random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Masks `token` with a random pad. Returns `None` if `token` is not a
/// well-formed token.
pub fn mask_token(token: &str) -> Option<String> {
    let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
    let mut pad = vec![0u8; raw.len()];
    rand::thread_rng().fill_bytes(&mut pad);
    let mut out = pad.clone();
    out.extend(raw.iter().zip(&pad).map(|(t, p)| t ^ p));
    Some(URL_SAFE_NO_PAD.encode(out))
}

fn unmask(masked: &[u8]) -> Vec<u8> {
    let (pad, body) = masked.split_at(masked.len() / 2);
    body.iter().zip(pad).map(|(b, p)| b ^ p).collect()
}

/// Compares a supplied token (plain or masked) with the cookie token in
/// constant time.
pub fn tokens_match(supplied: &str, cookie: &str) -> bool {
    let (Ok(supplied), Ok(cookie)) = (
        URL_SAFE_NO_PAD.decode(supplied.trim()),
        URL_SAFE_NO_PAD.decode(cookie.trim()),
    ) else {
        return false;
    };
    if cookie.is_empty() {
        return false;
    }
    let supplied = if supplied.len() == cookie.len() * 2 {
        unmask(&supplied)
    } else {
        supplied
    };
    constant_time_eq(&supplied, &cookie)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middleware() -> CsrfMiddleware {
        CsrfMiddleware::from_settings(&SecuritySettings {
            csrf_trusted_origins: vec!["https://app.example.com/".to_string()],
            ..SecuritySettings::default()
        })
    }

    fn post(cookie: Option<&str>, header: Option<&str>) -> HttpRequest {
        let mut builder = HttpRequest::builder().method(Method::POST).path("/api/user");
        if let Some(token) = cookie {
            builder = builder.header("cookie", &format!("csrftoken={token}"));
        }
        if let Some(token) = header {
            builder = builder.header("x-csrftoken", token);
        }
        builder.build()
    }

    #[test]
    fn test_generate_token_is_random() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), TOKEN_BYTES);
    }

    #[test]
    fn test_plain_and_masked_tokens_match() {
        let token = generate_token();
        assert!(tokens_match(&token, &token));
        let masked = mask_token(&token).unwrap();
        assert_ne!(masked, token);
        assert!(tokens_match(&masked, &token));
        assert_ne!(mask_token(&token).unwrap(), masked);
    }

    #[test]
    fn test_tokens_mismatch() {
        let token = generate_token();
        let other = generate_token();
        assert!(!tokens_match(&other, &token));
        assert!(!tokens_match(&mask_token(&other).unwrap(), &token));
        assert!(!tokens_match("", &token));
        assert!(!tokens_match("not base64!", &token));
        assert!(!tokens_match("", ""));
    }

    #[tokio::test]
    async fn test_safe_methods_pass() {
        let mw = middleware();
        let mut req = HttpRequest::builder().method(Method::GET).build();
        assert!(mw.process_request(&mut req).await.is_none());
    }

    #[tokio::test]
    async fn test_unsafe_without_cookie_rejected() {
        let mw = middleware();
        let resp = mw.process_request(&mut post(None, None)).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(resp.text(), "CSRF verification failed.");
    }

    #[tokio::test]
    async fn test_unsafe_without_header_rejected() {
        let mw = middleware();
        let token = generate_token();
        assert!(mw
            .process_request(&mut post(Some(&token), None))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_unsafe_with_matching_token_passes() {
        let mw = middleware();
        let token = generate_token();
        let masked = mask_token(&token).unwrap();
        assert!(mw
            .process_request(&mut post(Some(&token), Some(&token)))
            .await
            .is_none());
        assert!(mw
            .process_request(&mut post(Some(&token), Some(&masked)))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_trusted_origin_exempt() {
        let mw = middleware();
        let mut req = HttpRequest::builder()
            .method(Method::PUT)
            .path("/api/user")
            .header("origin", "https://app.example.com")
            .build();
        assert!(mw.process_request(&mut req).await.is_none());

        let mut req = HttpRequest::builder()
            .method(Method::PUT)
            .path("/api/user")
            .header("origin", "https://app.example.com.evil.test")
            .build();
        assert!(mw.process_request(&mut req).await.is_some());
    }

    #[tokio::test]
    async fn test_cookie_issued_on_safe_response() {
        let mw = middleware();
        let req = HttpRequest::builder()
            .method(Method::GET)
            .scheme("https")
            .build();
        let resp = mw.process_response(&req, HttpResponse::ok("x")).await;
        let cookie = resp
            .headers()
            .get(http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("csrftoken="));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn test_cookie_not_reissued() {
        let mw = middleware();
        let req = HttpRequest::builder()
            .header("cookie", "csrftoken=abc")
            .build();
        let resp = mw.process_response(&req, HttpResponse::ok("x")).await;
        assert!(resp.headers().get(http::header::SET_COOKIE).is_none());

        let resp = mw
            .process_response(&post(None, None), HttpResponse::ok("x"))
            .await;
        assert!(resp.headers().get(http::header::SET_COOKIE).is_none());
    }
}
