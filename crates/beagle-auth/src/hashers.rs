//! Password hashing for the Beagle server.
//!
//! Credentials are stored as bcrypt hashes. Hashing and verification are CPU
//! bound and deliberately slow, so both run on `tokio::task::spawn_blocking`
//! to keep the async runtime responsive.
//!
//! The bcrypt cost is a startup setting (`security.bcrypt_cost`), never a
//! per-call argument.

use async_trait::async_trait;
use beagle_core::error::BeagleError;

/// Marker prefix for unusable passwords (accounts that cannot log in).
const UNUSABLE_PASSWORD_PREFIX: &str = "!";

/// Lowest cost the bcrypt crate accepts.
pub const MIN_BCRYPT_COST: u32 = 4;
/// Highest cost the bcrypt crate accepts.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Trait for password hashing backends.
///
/// Implementations must be `Send + Sync`; a single hasher is shared by every
/// request.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Returns the algorithm identifier (e.g. "bcrypt").
    fn algorithm(&self) -> &str;

    /// Hashes a password and returns the encoded hash string.
    async fn hash(&self, password: &str) -> Result<String, BeagleError>;

    /// Verifies a password against an encoded hash.
    ///
    /// Returns `Ok(false)` for a mismatch and `Err` only when the hash itself
    /// cannot be processed.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, BeagleError>;

    /// Returns `true` if the hash was produced with weaker parameters than
    /// this hasher is configured for.
    fn must_update(&self, hash: &str) -> bool;
}

/// Bcrypt password hasher.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self { cost: 12 }
    }
}

impl BcryptHasher {
    /// Creates a hasher with the given work factor.
    ///
    /// Costs outside `4..=31` are a configuration error.
    pub fn new(cost: u32) -> Result<Self, BeagleError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(BeagleError::ConfigurationError(format!(
                "bcrypt cost must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}, got {cost}"
            )));
        }
        Ok(Self { cost })
    }

    /// Returns the configured work factor.
    pub const fn cost(&self) -> u32 {
        self.cost
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> &'static str {
        "bcrypt"
    }

    async fn hash(&self, password: &str) -> Result<String, BeagleError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, cost)
                .map_err(|e| BeagleError::HashingError(format!("Bcrypt hash error: {e}")))
        })
        .await
        .map_err(|e| BeagleError::HashingError(format!("Task join error: {e}")))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, BeagleError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash)
                .map_err(|e| BeagleError::HashingError(format!("Bcrypt verify error: {e}")))
        })
        .await
        .map_err(|e| BeagleError::HashingError(format!("Task join error: {e}")))?
    }

    fn must_update(&self, hash: &str) -> bool {
        stored_bcrypt_cost(hash).is_some_and(|stored| stored < self.cost)
    }
}

/// Reads the cost field out of a `$2a$`/`$2b$`/`$2x$`/`$2y$` hash.
fn stored_bcrypt_cost(hash: &str) -> Option<u32> {
    let rest = ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .find_map(|prefix| hash.strip_prefix(prefix))?;
    rest.get(..2)?.parse().ok()
}

/// Returns `true` if the encoded hash represents a usable password.
///
/// Hashes that are empty or prefixed with `!` never verify.
pub fn is_password_usable(hash: &str) -> bool {
    !hash.is_empty() && !hash.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

/// Builds an unusable password marker with random padding, so that two
/// disabled accounts never share a stored value.
pub fn make_unusable_password() -> String {
    use rand::RngCore;
    use std::fmt::Write;

    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .fold(String::from(UNUSABLE_PASSWORD_PREFIX), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> BcryptHasher {
        BcryptHasher::new(MIN_BCRYPT_COST).unwrap()
    }

    #[tokio::test]
    async fn test_bcrypt_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("secret123").await.unwrap();
        assert!(hash.starts_with("$2b$04$"));
        assert!(hasher.verify("secret123", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_bcrypt_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("secret123").await.unwrap();
        assert!(!hasher.verify("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_bcrypt_unique_salts() {
        let hasher = fast_hasher();
        let hash1 = hasher.hash("same_password").await.unwrap();
        let hash2 = hasher.hash("same_password").await.unwrap();
        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same_password", &hash1).await.unwrap());
        assert!(hasher.verify("same_password", &hash2).await.unwrap());
    }

    #[tokio::test]
    async fn test_bcrypt_verify_malformed_hash_is_error() {
        let hasher = fast_hasher();
        let err = hasher.verify("x", "not-a-bcrypt-hash").await.unwrap_err();
        assert!(matches!(err, BeagleError::HashingError(_)));
    }

    #[tokio::test]
    async fn test_bcrypt_verifies_hash_from_other_cost() {
        let low = fast_hasher();
        let high = BcryptHasher::new(5).unwrap();
        let hash = low.hash("secret123").await.unwrap();
        assert!(high.verify("secret123", &hash).await.unwrap());
    }

    #[test]
    fn test_bcrypt_algorithm() {
        assert_eq!(BcryptHasher::default().algorithm(), "bcrypt");
        assert_eq!(BcryptHasher::default().cost(), 12);
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        assert!(BcryptHasher::new(3).is_err());
        assert!(BcryptHasher::new(32).is_err());
        assert!(BcryptHasher::new(4).is_ok());
        assert!(BcryptHasher::new(31).is_ok());
        assert!(BcryptHasher::new(0).unwrap_err().is_fatal());
    }

    #[test]
    fn test_bcrypt_must_update() {
        let hasher = BcryptHasher::new(12).unwrap();
        assert!(hasher.must_update("$2b$04$abcdefghijklmnopqrstuuMGzV2iWi7CiUvqzPaIXqVVwK..rJdm"));
        assert!(hasher.must_update("$2a$10$abcdefghijklmnopqrstuuMGzV2iWi7CiUvqzPaIXqVVwK..rJdm"));
        assert!(!hasher.must_update("$2y$12$abcdefghijklmnopqrstuuMGzV2iWi7CiUvqzPaIXqVVwK..rJdm"));
        assert!(!hasher.must_update("$2b$14$abcdefghijklmnopqrstuuMGzV2iWi7CiUvqzPaIXqVVwK..rJdm"));
        assert!(!hasher.must_update("garbage"));
    }

    #[test]
    fn test_is_password_usable() {
        assert!(is_password_usable("$2b$04$abc"));
        assert!(!is_password_usable(""));
        assert!(!is_password_usable("!"));
        assert!(!is_password_usable("!disabled"));
    }

    #[test]
    fn test_make_unusable_password() {
        let a = make_unusable_password();
        let b = make_unusable_password();
        assert!(!is_password_usable(&a));
        assert_eq!(a.len(), 41);
        assert_ne!(a, b);
    }
}
