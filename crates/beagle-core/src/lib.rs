//! # beagle-core
//!
//! Core types for the Beagle server: the framework error enum, settings and
//! their loaders, and tracing-based logging setup. This crate has no framework
//! dependencies and is the foundation for the HTTP and auth crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Server and security settings
//! - [`settings_loader`] - TOML/JSON loading with environment overrides
//! - [`logging`] - Tracing subscriber setup and request spans

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{BeagleError, BeagleResult};
pub use settings::{RuleSettings, SecuritySettings, Settings};
