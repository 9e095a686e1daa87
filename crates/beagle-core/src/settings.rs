//! Settings system for the Beagle server.
//!
//! [`Settings`] holds all server and security configuration. It is loaded once
//! at startup (see [`settings_loader`](crate::settings_loader)) and passed by
//! value to the components that need it.

use serde::{Deserialize, Serialize};

/// One entry of the ordered authorization rule list, as written in config.
///
/// Parsed and validated by the auth crate at startup. `method` is an HTTP verb
/// or `"ANY"`; `path` is an ant-style pattern (`?`, `*`, `**`); `authority` is
/// `"ANONYMOUS"`, `"AUTHENTICATED"`, or a role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// HTTP method, or `"ANY"`.
    pub method: String,
    /// Ant-style path pattern.
    pub path: String,
    /// Required authority.
    pub authority: String,
}

impl RuleSettings {
    /// Creates a rule entry.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            authority: authority.into(),
        }
    }
}

/// Authentication and authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Whether CSRF protection runs on unsafe methods.
    ///
    /// Only disable this for stateless clients that never authenticate through
    /// browser cookies. Credentials here travel in the `Authorization` header,
    /// which browsers do not attach cross-site on their own.
    pub csrf_enabled: bool,
    /// The name of the CSRF cookie.
    pub csrf_cookie_name: String,
    /// The header carrying the CSRF token.
    pub csrf_header_name: String,
    /// Origins that are trusted for CSRF checks.
    pub csrf_trusted_origins: Vec<String>,
    /// Bcrypt work factor used for new hashes and the timing-equalizing dummy.
    pub bcrypt_cost: u32,
    /// Realm announced in `WWW-Authenticate` challenges.
    pub realm: String,
    /// Ordered authorization rules, first match wins.
    pub rules: Vec<RuleSettings>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            csrf_enabled: true,
            csrf_cookie_name: "csrftoken".to_string(),
            csrf_header_name: "X-CSRFToken".to_string(),
            csrf_trusted_origins: Vec::new(),
            bcrypt_cost: 12,
            realm: "beagle".to_string(),
            rules: vec![
                RuleSettings::new("POST", "/api/user", "ANONYMOUS"),
                RuleSettings::new("PUT", "/api/user", "ANONYMOUS"),
                RuleSettings::new("ANY", "/**", "AUTHENTICATED"),
            ],
        }
    }
}

/// The complete set of server settings.
///
/// # Examples
///
/// ```
/// use beagle_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert!(settings.security.csrf_enabled);
/// assert_eq!(settings.security.rules.len(), 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// Address the HTTP listener binds to.
    pub bind_address: String,

    // ── Security ─────────────────────────────────────────────────────

    /// Authentication and authorization configuration.
    pub security: SecuritySettings,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter (e.g. "info", "`beagle_auth=debug`").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            bind_address: "127.0.0.1:8080".to_string(),
            security: SecuritySettings::default(),
            log_level: "info".to_string(),
        }
    }
}
