//! Credential verification.
//!
//! [`CredentialVerifier`] checks a supplied identifier and plaintext secret
//! against the user store. It is the "authentication manager" of the server:
//! the gate uses it per request and handlers may use it directly through
//! [`SecurityConfiguration::authentication_manager`](crate::SecurityConfiguration::authentication_manager).
//!
//! An unknown identifier and a wrong secret are distinct in the returned
//! [`AuthenticationResult`] but must look the same from outside. The unknown
//! path therefore still runs a full bcrypt verification against a dummy hash
//! computed at the configured cost.

use std::fmt;
use std::sync::Arc;

use beagle_core::error::BeagleError;
use rand::distributions::{Alphanumeric, DistString};

use crate::hashers::PasswordHasher;
use crate::identity::Identity;
use crate::store::UserStore;

/// An identifier and plaintext secret supplied by a caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The identifier (username).
    pub identifier: String,
    /// The plaintext password. Never logged.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from an identifier and password.
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why a verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No identity is stored under the identifier.
    NotFound,
    /// The identity exists but the secret did not match, its password is
    /// unusable, or it is inactive.
    BadCredential,
}

/// The outcome of [`CredentialVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    succeeded: bool,
    identity: Option<Identity>,
    failure_reason: Option<FailureReason>,
}

impl AuthenticationResult {
    /// A successful result carrying the verified identity.
    pub const fn success(identity: Identity) -> Self {
        Self {
            succeeded: true,
            identity: Some(identity),
            failure_reason: None,
        }
    }

    /// A failed result.
    pub const fn failure(reason: FailureReason) -> Self {
        Self {
            succeeded: false,
            identity: None,
            failure_reason: Some(reason),
        }
    }

    /// Returns `true` if the credentials were accepted.
    pub const fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Returns the verified identity on success.
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns the failure reason on failure.
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    /// Consumes the result, returning the verified identity on success.
    pub fn into_identity(self) -> Option<Identity> {
        self.identity
    }
}

/// Verifies credentials against a [`UserStore`] with a [`PasswordHasher`].
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    dummy_hash: String,
}

impl CredentialVerifier {
    /// Creates a verifier.
    ///
    /// Hashes a random throwaway secret up front so that failures for unknown
    /// identifiers cost as much as failures for wrong secrets.
    pub async fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, BeagleError> {
        let throwaway = Alphanumeric.sample_string(&mut rand::thread_rng(), 24);
        let dummy_hash = hasher.hash(&throwaway).await?;
        Ok(Self {
            store,
            hasher,
            dummy_hash,
        })
    }

    /// Returns the hasher this verifier checks secrets with.
    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }

    /// Verifies `credentials`.
    ///
    /// Returns `Err` only when a collaborator fails (store lookup, hasher).
    /// Calling this twice with the same input and an unchanged store gives the
    /// same result.
    pub async fn verify(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticationResult, BeagleError> {
        let identifier = credentials.identifier.as_str();

        let Some(identity) = self.store.find_by_identifier(identifier).await? else {
            self.burn_verification(&credentials.password).await?;
            tracing::debug!(identifier, "authentication failed: unknown identifier");
            return Ok(AuthenticationResult::failure(FailureReason::NotFound));
        };

        if !identity.has_usable_password() {
            self.burn_verification(&credentials.password).await?;
            tracing::debug!(identifier, "authentication failed: unusable password");
            return Ok(AuthenticationResult::failure(FailureReason::BadCredential));
        }

        let matched = self
            .hasher
            .verify(&credentials.password, &identity.password)
            .await?;

        if !matched {
            tracing::debug!(identifier, "authentication failed: bad credential");
            return Ok(AuthenticationResult::failure(FailureReason::BadCredential));
        }

        if !identity.is_active {
            tracing::debug!(identifier, "authentication failed: inactive identity");
            return Ok(AuthenticationResult::failure(FailureReason::BadCredential));
        }

        if self.hasher.must_update(&identity.password) {
            tracing::info!(
                identifier,
                algorithm = self.hasher.algorithm(),
                "stored hash is weaker than configured, rehash on next password change"
            );
        }

        Ok(AuthenticationResult::success(identity))
    }

    async fn burn_verification(&self, password: &str) -> Result<(), BeagleError> {
        self.hasher.verify(password, &self.dummy_hash).await?;
        Ok(())
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("algorithm", &self.hasher.algorithm())
            .finish_non_exhaustive()
    }
}
