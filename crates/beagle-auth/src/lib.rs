//! # beagle-auth
//!
//! Authentication and authorization for the Beagle server.
//!
//! ## Modules
//!
//! - [`hashers`] - Bcrypt password hashing on the blocking pool
//! - [`identity`] - The stored identity record and its authorities
//! - [`store`] - The [`UserStore`](store::UserStore) lookup trait and an in-memory store
//! - [`verifier`] - Credential verification against the store
//! - [`policy`] - Ordered rule table, first match wins
//! - [`gate`] - Per-request middleware: extract, verify, authorize
//! - [`csrf`] - Double-submit CSRF protection, toggled by configuration
//! - [`configuration`] - Assembles the pieces above from settings
//!
//! ## Request Flow
//!
//! 1. The CSRF middleware (when enabled) rejects unsafe requests without a
//!    matching token.
//! 2. The [`AuthenticationGate`](gate::AuthenticationGate) reads HTTP Basic
//!    credentials and verifies them with the
//!    [`CredentialVerifier`](verifier::CredentialVerifier).
//! 3. The [`AuthorizationPolicy`](policy::AuthorizationPolicy) decides on the
//!    `(method, path, identity)` triple.
//! 4. Allowed requests reach the handler with the identity attached as a
//!    request extension.

pub mod configuration;
pub mod csrf;
pub mod gate;
pub mod hashers;
pub mod identity;
pub mod policy;
pub mod store;
pub mod verifier;

pub use configuration::SecurityConfiguration;
pub use gate::{authenticated_identity, AuthenticatedIdentity, AuthenticationGate};
pub use hashers::{BcryptHasher, PasswordHasher};
pub use identity::Identity;
pub use policy::{AuthorizationPolicy, Decision, RuleTable};
pub use store::{InMemoryUserStore, UserStore};
pub use verifier::{AuthenticationResult, CredentialVerifier, Credentials, FailureReason};
