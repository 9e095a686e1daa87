//! The identity record held by the user store.
//!
//! An [`Identity`] is what a successful credential check yields: the stored
//! identifier, the bcrypt hash of its secret, and the set of authorities
//! (role names) the authorization policy checks against.
//!
//! The stored hash never leaves this type in readable form: `Debug` redacts
//! it and `Serialize` skips it.

use std::collections::BTreeSet;
use std::fmt;

use beagle_core::error::BeagleError;
use serde::Serialize;

use crate::hashers::{self, PasswordHasher};

/// An account known to the user store.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// The unique identifier (username).
    pub identifier: String,
    /// The encoded password hash. Unusable values start with `!`.
    #[serde(skip)]
    pub password: String,
    /// Role names granted to this identity.
    pub authorities: BTreeSet<String>,
    /// Inactive identities never authenticate.
    pub is_active: bool,
}

impl Identity {
    /// Creates an active identity with an unusable password and no authorities.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: String::new(),
            authorities: BTreeSet::new(),
            is_active: true,
        }
    }

    /// Adds authorities to this identity.
    #[must_use]
    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities
            .extend(authorities.into_iter().map(Into::into));
        self
    }

    /// Sets an already-encoded password hash.
    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password = hash.into();
        self
    }

    /// Hashes `raw_password` with the given hasher and stores the result.
    pub async fn set_password(
        &mut self,
        raw_password: &str,
        hasher: &dyn PasswordHasher,
    ) -> Result<(), BeagleError> {
        self.password = hasher.hash(raw_password).await?;
        Ok(())
    }

    /// Replaces the password with a random unusable marker.
    pub fn set_unusable_password(&mut self) {
        self.password = hashers::make_unusable_password();
    }

    /// Returns `true` if the stored password can ever verify.
    pub fn has_usable_password(&self) -> bool {
        hashers::is_password_usable(&self.password)
    }

    /// Returns `true` if this identity holds `authority`.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .field("authorities", &self.authorities)
            .field("is_active", &self.is_active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashers::BcryptHasher;

    #[test]
    fn test_new_identity_defaults() {
        let identity = Identity::new("alice");
        assert_eq!(identity.identifier, "alice");
        assert!(identity.is_active);
        assert!(identity.authorities.is_empty());
        assert!(!identity.has_usable_password());
    }

    #[test]
    fn test_with_authorities() {
        let identity = Identity::new("alice").with_authorities(["ROLE_USER", "ROLE_ADMIN"]);
        assert!(identity.has_authority("ROLE_USER"));
        assert!(identity.has_authority("ROLE_ADMIN"));
        assert!(!identity.has_authority("ROLE_AUDITOR"));
    }

    #[tokio::test]
    async fn test_set_password_hashes() {
        let hasher = BcryptHasher::new(4).unwrap();
        let mut identity = Identity::new("alice");
        identity.set_password("secret123", &hasher).await.unwrap();
        assert!(identity.has_usable_password());
        assert_ne!(identity.password, "secret123");
        assert!(hasher.verify("secret123", &identity.password).await.unwrap());
    }

    #[test]
    fn test_set_unusable_password() {
        let mut identity = Identity::new("alice").with_password_hash("$2b$04$xyz");
        assert!(identity.has_usable_password());
        identity.set_unusable_password();
        assert!(!identity.has_usable_password());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let identity = Identity::new("alice").with_password_hash("$2b$04$secrethash");
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secrethash"));
    }

    #[test]
    fn test_serialize_skips_hash() {
        let identity = Identity::new("alice")
            .with_password_hash("$2b$04$secrethash")
            .with_authorities(["ROLE_USER"]);
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["identifier"], "alice");
        assert_eq!(json["authorities"], serde_json::json!(["ROLE_USER"]));
        assert!(json.get("password").is_none());
    }
}
