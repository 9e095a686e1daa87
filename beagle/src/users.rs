//! The `/api/user` endpoints.
//!
//! - `POST /api/user` registers a new identity. Open to anonymous callers.
//! - `PUT /api/user` creates or replaces an identity. Open to anonymous
//!   callers for new identifiers; replacing an existing identity requires
//!   being that identity or an administrator.
//! - `GET /api/user` returns the authenticated caller.
//!
//! Request bodies are JSON: `{"identifier": "...", "password": "...",
//! "authorities": ["ROLE_USER"]}`. Only administrators may grant authorities
//! other than [`DEFAULT_AUTHORITY`]. Responses never contain the hash.

use std::sync::Arc;

use beagle_auth::{authenticated_identity, Identity, InMemoryUserStore, PasswordHasher};
use beagle_core::{BeagleError, BeagleResult};
use beagle_http::{HttpRequest, HttpResponse, JsonResponse};
use http::StatusCode;
use serde::Deserialize;

/// Granted to every new identity unless an administrator says otherwise.
pub const DEFAULT_AUTHORITY: &str = "ROLE_USER";

/// Holders may grant authorities and replace any identity.
pub const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

const MAX_IDENTIFIER_LEN: usize = 150;

/// Body of `POST` and `PUT` requests.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPayload {
    /// The identifier to register.
    pub identifier: String,
    /// The plaintext password. Hashed before storage.
    pub password: String,
    /// Requested authorities.
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl UserPayload {
    fn parse(request: &HttpRequest) -> BeagleResult<Self> {
        let payload: Self = serde_json::from_slice(request.body())
            .map_err(|e| BeagleError::BadRequest(format!("invalid user payload: {e}")))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> BeagleResult<()> {
        let id = self.identifier.as_str();
        if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
            return Err(BeagleError::BadRequest(format!(
                "identifier must be 1 to {MAX_IDENTIFIER_LEN} bytes"
            )));
        }
        if id.contains(':') || id.chars().any(char::is_control) {
            return Err(BeagleError::BadRequest(
                "identifier must not contain ':' or control characters".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(BeagleError::BadRequest("password must not be empty".to_string()));
        }
        if self.authorities.iter().any(|a| a.trim().is_empty()) {
            return Err(BeagleError::BadRequest("authorities must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Handlers for the user endpoints.
#[derive(Clone)]
pub struct UserService {
    store: InMemoryUserStore,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates the service over `store`, hashing with `hasher`.
    pub fn new(store: InMemoryUserStore, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// `POST /api/user`: registers a new identity. 409 if it exists.
    pub async fn create(&self, request: &HttpRequest) -> BeagleResult<HttpResponse> {
        let payload = UserPayload::parse(request)?;
        let identity = self.build_identity(request, payload).await?;
        self.store.insert(identity.clone()).await?;
        tracing::info!(identifier = %identity.identifier, "identity registered");
        Ok(JsonResponse::with_status(StatusCode::CREATED, &identity))
    }

    /// `PUT /api/user`: creates or replaces an identity.
    ///
    /// Answers 201 when created and 200 when replaced. Replacing requires the
    /// caller to be that identity or an administrator.
    pub async fn replace(&self, request: &HttpRequest) -> BeagleResult<HttpResponse> {
        let payload = UserPayload::parse(request)?;
        let caller = authenticated_identity(request);
        let identity = self.build_identity(request, payload).await?;

        // Existence is decided under the store's write lock, after hashing.
        let created = self
            .store
            .replace_if(identity.clone(), |existing| {
                existing.is_none()
                    || caller.is_some_and(|c| {
                        c.identifier == identity.identifier || c.has_authority(ADMIN_AUTHORITY)
                    })
            })
            .await?;
        tracing::info!(identifier = %identity.identifier, created, "identity stored");
        let status = if created { StatusCode::CREATED } else { StatusCode::OK };
        Ok(JsonResponse::with_status(status, &identity))
    }

    /// `GET /api/user`: returns the authenticated caller.
    pub fn current(&self, request: &HttpRequest) -> BeagleResult<HttpResponse> {
        let identity = authenticated_identity(request)
            .ok_or_else(|| BeagleError::Unauthorized("no authenticated identity".to_string()))?;
        Ok(JsonResponse::new(identity))
    }

    async fn build_identity(
        &self,
        request: &HttpRequest,
        payload: UserPayload,
    ) -> BeagleResult<Identity> {
        let is_admin =
            authenticated_identity(request).is_some_and(|c| c.has_authority(ADMIN_AUTHORITY));
        let requested_extra = payload
            .authorities
            .iter()
            .any(|a| a.as_str() != DEFAULT_AUTHORITY);
        if requested_extra && !is_admin {
            return Err(BeagleError::PermissionDenied(
                "only administrators may grant authorities".to_string(),
            ));
        }

        let mut identity = if payload.authorities.is_empty() {
            Identity::new(payload.identifier).with_authorities([DEFAULT_AUTHORITY])
        } else {
            Identity::new(payload.identifier).with_authorities(payload.authorities)
        };
        identity
            .set_password(&payload.password, self.hasher.as_ref())
            .await?;
        Ok(identity)
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("algorithm", &self.hasher.algorithm())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beagle_auth::{AuthenticatedIdentity, BcryptHasher, UserStore};

    fn service() -> UserService {
        UserService::new(
            InMemoryUserStore::new(),
            Arc::new(BcryptHasher::new(4).unwrap()),
        )
    }

    fn json_request(body: &serde_json::Value, caller: Option<Identity>) -> HttpRequest {
        let mut request = HttpRequest::builder()
            .method(http::Method::POST)
            .path("/api/user")
            .header("content-type", "application/json")
            .body(serde_json::to_vec(body).unwrap())
            .build();
        if let Some(identity) = caller {
            request
                .extensions_mut()
                .insert(AuthenticatedIdentity(identity));
        }
        request
    }

    #[tokio::test]
    async fn test_create_hashes_and_defaults_authority() {
        let svc = service();
        let resp = svc
            .create(&json_request(
                &serde_json::json!({"identifier": "alice", "password": "secret123"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(!resp.text().contains("secret123"));
        assert!(!resp.text().contains("$2b$"));

        let stored = svc.store.find_by_identifier("alice").await.unwrap().unwrap();
        assert!(stored.has_authority(DEFAULT_AUTHORITY));
        assert!(svc.hasher.verify("secret123", &stored.password).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let svc = service();
        let body = serde_json::json!({"identifier": "alice", "password": "secret123"});
        svc.create(&json_request(&body, None)).await.unwrap();
        let err = svc.create(&json_request(&body, None)).await.unwrap_err();
        assert!(matches!(err, BeagleError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_payloads() {
        let svc = service();
        for body in [
            serde_json::json!({"identifier": "", "password": "x"}),
            serde_json::json!({"identifier": "a:b", "password": "x"}),
            serde_json::json!({"identifier": "alice", "password": ""}),
            serde_json::json!({"identifier": "alice"}),
            serde_json::json!({"identifier": "alice", "password": "x", "admin": true}),
        ] {
            let err = svc.create(&json_request(&body, None)).await.unwrap_err();
            assert!(matches!(err, BeagleError::BadRequest(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn test_anonymous_cannot_grant_authorities() {
        let svc = service();
        let body = serde_json::json!({
            "identifier": "mallory", "password": "x", "authorities": ["ROLE_ADMIN"]
        });
        let err = svc.create(&json_request(&body, None)).await.unwrap_err();
        assert!(matches!(err, BeagleError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_admin_can_grant_authorities() {
        let svc = service();
        let admin = Identity::new("root").with_authorities([ADMIN_AUTHORITY]);
        let body = serde_json::json!({
            "identifier": "ops", "password": "x", "authorities": ["ROLE_OPS"]
        });
        svc.create(&json_request(&body, Some(admin))).await.unwrap();
        let stored = svc.store.find_by_identifier("ops").await.unwrap().unwrap();
        assert!(stored.has_authority("ROLE_OPS"));
        assert!(!stored.has_authority(DEFAULT_AUTHORITY));
    }

    #[tokio::test]
    async fn test_replace_creates_then_requires_owner() {
        let svc = service();
        let body = serde_json::json!({"identifier": "alice", "password": "secret123"});
        let resp = svc.replace(&json_request(&body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = serde_json::json!({"identifier": "alice", "password": "new-secret"});
        let err = svc.replace(&json_request(&body, None)).await.unwrap_err();
        assert!(matches!(err, BeagleError::PermissionDenied(_)));

        let mallory = Identity::new("mallory").with_authorities([DEFAULT_AUTHORITY]);
        let err = svc
            .replace(&json_request(&body, Some(mallory)))
            .await
            .unwrap_err();
        assert!(matches!(err, BeagleError::PermissionDenied(_)));

        let alice = svc.store.find_by_identifier("alice").await.unwrap();
        let resp = svc.replace(&json_request(&body, alice)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = svc.store.find_by_identifier("alice").await.unwrap().unwrap();
        assert!(svc.hasher.verify("new-secret", &stored.password).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_anonymous_puts_create_once() {
        let svc = service();
        let passwords = ["first-secret", "second-secret", "third-secret", "fourth-secret"];
        let handles: Vec<_> = passwords
            .into_iter()
            .map(|password| {
                let svc = svc.clone();
                let request = json_request(
                    &serde_json::json!({"identifier": "alice", "password": password}),
                    None,
                );
                tokio::spawn(async move { (password, svc.replace(&request).await) })
            })
            .collect();

        let mut created = Vec::new();
        for handle in handles {
            let (password, result) = handle.await.unwrap();
            match result {
                Ok(resp) => {
                    assert_eq!(resp.status(), StatusCode::CREATED);
                    created.push(password);
                }
                Err(err) => assert!(matches!(err, BeagleError::PermissionDenied(_)), "{err}"),
            }
        }
        assert_eq!(created.len(), 1);

        let stored = svc.store.find_by_identifier("alice").await.unwrap().unwrap();
        assert!(svc.hasher.verify(created[0], &stored.password).await.unwrap());
    }

    #[test]
    fn test_current_returns_caller() {
        let svc = service();
        let alice = Identity::new("alice").with_authorities([DEFAULT_AUTHORITY]);
        let resp = svc
            .current(&json_request(&serde_json::json!({}), Some(alice)))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(json["identifier"], "alice");
        assert_eq!(json["authorities"], serde_json::json!([DEFAULT_AUTHORITY]));
    }

    #[test]
    fn test_current_without_identity_is_unauthorized() {
        let svc = service();
        let err = svc
            .current(&json_request(&serde_json::json!({}), None))
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
