//! # beagle
//!
//! The Beagle server. Re-exports the sub-crates and provides the
//! [`BeagleApp`](server::BeagleApp) that serves the user API behind the
//! security pipeline.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use beagle::auth::{InMemoryUserStore, SecurityConfiguration};
//! use beagle::core::Settings;
//! use beagle::server::BeagleApp;
//!
//! # async fn example() -> Result<(), beagle::core::BeagleError> {
//! let settings = Settings::default();
//! let store = InMemoryUserStore::new();
//! let security = SecurityConfiguration::new(&settings.security, Arc::new(store.clone())).await?;
//! BeagleApp::new(settings, &security, store).run().await?;
//! # Ok(())
//! # }
//! ```

/// Errors, settings, and logging.
pub use beagle_core as core;

/// Request, response, and the middleware pipeline.
pub use beagle_http as http;

/// Credential verification, authorization policy, request gate, CSRF.
pub use beagle_auth as auth;

pub mod server;
pub mod users;
