//! The per-request authentication and authorization gate.
//!
//! [`AuthenticationGate`] runs as a [`Middleware`] in front of every route:
//!
//! 1. Extract HTTP Basic credentials from the `Authorization` header.
//! 2. If present, verify them. Any failure is a 401 with a generic message.
//! 3. Ask the [`AuthorizationPolicy`] about `(method, path, identity)`.
//! 4. On ALLOW, attach the identity as an [`AuthenticatedIdentity`] request
//!    extension and let the request through. On DENY, answer 401 when the
//!    caller is anonymous and 403 when it is authenticated.
//!
//! The plaintext secret is never logged.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use beagle_core::error::BeagleError;
use beagle_http::{HttpRequest, HttpResponse, Middleware};
use http::{HeaderValue, StatusCode};

use crate::identity::Identity;
use crate::policy::{AuthorizationPolicy, Decision};
use crate::verifier::{CredentialVerifier, Credentials};

/// Request extension holding the identity the gate verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity(pub Identity);

/// Returns the identity the gate attached to `request`, if any.
pub fn authenticated_identity(request: &HttpRequest) -> Option<&Identity> {
    request
        .extensions()
        .get::<AuthenticatedIdentity>()
        .map(|AuthenticatedIdentity(identity)| identity)
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Credentials were supplied but did not verify, or were malformed.
    InvalidCredentials,
    /// No credentials on a route that needs them.
    AuthenticationRequired,
    /// Verified identity without the required authority.
    Forbidden,
    /// A collaborator failed while verifying.
    Internal,
}

impl Rejection {
    /// Returns the HTTP status for this rejection.
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials.",
            Self::AuthenticationRequired => "Authentication required.",
            Self::Forbidden => "Permission denied.",
            Self::Internal => "Internal server error.",
        }
    }
}

/// The gate's verdict on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Let the request through, with the verified identity if there was one.
    Forward(Option<Identity>),
    /// Refuse the request.
    Reject(Rejection),
}

/// Authentication and authorization middleware.
///
/// Cloning is cheap and shares the verifier and policy.
#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    verifier: Arc<CredentialVerifier>,
    policy: Arc<AuthorizationPolicy>,
    challenge: HeaderValue,
}

impl AuthenticationGate {
    /// Creates a gate that announces `realm` in its `WWW-Authenticate`
    /// challenge.
    pub fn new(
        verifier: Arc<CredentialVerifier>,
        policy: Arc<AuthorizationPolicy>,
        realm: &str,
    ) -> Result<Self, BeagleError> {
        let escaped = realm.replace('\\', "\\\\").replace('"', "\\\"");
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{escaped}\"")).map_err(
            |_| BeagleError::ConfigurationError(format!("realm is not a valid header value: {realm:?}")),
        )?;
        Ok(Self {
            verifier,
            policy,
            challenge,
        })
    }

    /// Runs the gate's state machine for one request.
    pub async fn handle(&self, request: &HttpRequest) -> GateOutcome {
        let identity = match authenticated_identity(request) {
            Some(existing) => Some(existing.clone()),
            None => match self.resolve_identity(request).await {
                Ok(identity) => identity,
                Err(rejection) => return GateOutcome::Reject(rejection),
            },
        };

        match self
            .policy
            .decide(request.method(), request.path(), identity.as_ref())
        {
            Decision::Allow => GateOutcome::Forward(identity),
            Decision::Deny if identity.is_none() => {
                GateOutcome::Reject(Rejection::AuthenticationRequired)
            }
            Decision::Deny => GateOutcome::Reject(Rejection::Forbidden),
        }
    }

    /// Builds the response for a rejection. 401s carry the Basic challenge.
    pub fn rejection_response(&self, rejection: Rejection) -> HttpResponse {
        let message = rejection.message();
        match rejection {
            Rejection::InvalidCredentials | Rejection::AuthenticationRequired => {
                HttpResponse::unauthorized(message)
                    .set_header(http::header::WWW_AUTHENTICATE, self.challenge.clone())
            }
            Rejection::Forbidden => HttpResponse::forbidden(message),
            Rejection::Internal => HttpResponse::server_error(message),
        }
    }

    async fn resolve_identity(&self, request: &HttpRequest) -> Result<Option<Identity>, Rejection> {
        let credentials = match extract_basic_credentials(request) {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting malformed Authorization header");
                return Err(Rejection::InvalidCredentials);
            }
        };

        match self.verifier.verify(&credentials).await {
            Ok(result) if result.succeeded() => {
                tracing::debug!(identifier = %credentials.identifier, "authenticated");
                Ok(result.into_identity())
            }
            Ok(result) => {
                tracing::info!(
                    identifier = %credentials.identifier,
                    reason = ?result.failure_reason(),
                    "authentication failed"
                );
                Err(Rejection::InvalidCredentials)
            }
            Err(e) => {
                tracing::error!(error = %e, "credential verification failed");
                Err(Rejection::Internal)
            }
        }
    }
}

#[async_trait]
impl Middleware for AuthenticationGate {
    async fn process_request(&self, request: &mut HttpRequest) -> Option<HttpResponse> {
        match self.handle(request).await {
            GateOutcome::Forward(identity) => {
                if let Some(identity) = identity {
                    request
                        .extensions_mut()
                        .insert(AuthenticatedIdentity(identity));
                }
                None
            }
            GateOutcome::Reject(rejection) => {
                tracing::debug!(
                    method = %request.method(),
                    path = request.path(),
                    status = rejection.status().as_u16(),
                    "request rejected by gate"
                );
                Some(self.rejection_response(rejection))
            }
        }
    }
}

/// Reads HTTP Basic credentials from the `Authorization` header.
///
/// Returns `Ok(None)` when the header is absent or uses another scheme, and
/// `Err` when a Basic header cannot be decoded into `identifier:password`.
pub fn extract_basic_credentials(request: &HttpRequest) -> Result<Option<Credentials>, BeagleError> {
    let Some(raw) = request.headers().get(http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let malformed = |why: &str| BeagleError::Unauthorized(format!("malformed Basic credentials: {why}"));

    let value = raw.to_str().map_err(|_| malformed("non-ASCII header"))?;
    let Some((scheme, encoded)) = value.trim().split_once(' ') else {
        return if value.trim().eq_ignore_ascii_case("basic") {
            Err(malformed("missing payload"))
        } else {
            Ok(None)
        };
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| malformed("invalid base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed("invalid UTF-8"))?;
    let (identifier, password) = decoded
        .split_once(':')
        .ok_or_else(|| malformed("missing ':' separator"))?;

    Ok(Some(Credentials::new(identifier, password)))
}
