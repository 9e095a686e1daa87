//! User stores.
//!
//! The credential verifier only needs one thing from storage: look an
//! identity up by its identifier. [`UserStore`] is that seam. The server ships
//! with [`InMemoryUserStore`]; a database-backed store implements the same
//! trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use beagle_core::error::BeagleError;
use tokio::sync::RwLock;

use crate::identity::Identity;

/// Lookup of identities by identifier.
///
/// `Ok(None)` means the identifier is unknown. `Err` means the store itself
/// failed and is reported as a server error, never as bad credentials.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the identity stored under `identifier`, if any.
    async fn find_by_identifier(&self, identifier: &str)
        -> Result<Option<Identity>, BeagleError>;
}

/// A user store backed by a `HashMap` behind an async `RwLock`.
///
/// Cloning shares the underlying map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, Identity>>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new identity.
    ///
    /// Fails with [`BeagleError::Conflict`] if the identifier is taken.
    pub async fn insert(&self, identity: Identity) -> Result<(), BeagleError> {
        let mut users = self.users.write().await;
        if users.contains_key(&identity.identifier) {
            return Err(BeagleError::Conflict(format!(
                "identity '{}' already exists",
                identity.identifier
            )));
        }
        users.insert(identity.identifier.clone(), identity);
        drop(users);
        Ok(())
    }

    /// Inserts or overwrites an identity if `allow` accepts what is stored
    /// under its identifier.
    ///
    /// `allow` runs under the write lock, so no other writer can slip in
    /// between the check and the write. Returns `true` if the identity was
    /// created, `false` if it replaced an existing one, and
    /// [`BeagleError::PermissionDenied`] if `allow` refused.
    pub async fn replace_if<F>(&self, identity: Identity, allow: F) -> Result<bool, BeagleError>
    where
        F: FnOnce(Option<&Identity>) -> bool,
    {
        let mut users = self.users.write().await;
        if !allow(users.get(&identity.identifier)) {
            return Err(BeagleError::PermissionDenied(format!(
                "identity '{}' may not be replaced",
                identity.identifier
            )));
        }
        let created = users
            .insert(identity.identifier.clone(), identity)
            .is_none();
        drop(users);
        Ok(created)
    }

    /// Removes an identity, returning it if it existed.
    pub async fn remove(&self, identifier: &str) -> Option<Identity> {
        self.users.write().await.remove(identifier)
    }

    /// Returns the number of stored identities.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns `true` if the store holds no identities.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Identity>, BeagleError> {
        Ok(self.users.read().await.get(identifier).cloned())
    }
}
