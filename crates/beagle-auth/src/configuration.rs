//! Assembly of the security layer from settings.
//!
//! [`SecurityConfiguration::new`] turns [`SecuritySettings`] and a user store
//! into the immutable pieces the server runs with: the bcrypt hasher, the
//! credential verifier (exposed as the authentication manager), the
//! authorization policy, the gate, and the optional CSRF middleware.
//!
//! Every configuration problem (bad rule, bad bcrypt cost, bad realm) is
//! reported here, at startup, as a fatal error.
//!
//! The binary installs the result process-wide with
//! [`SecurityConfiguration::install`]; it cannot be replaced afterwards.

use std::sync::{Arc, OnceLock};

use beagle_core::error::BeagleError;
use beagle_core::settings::SecuritySettings;
use beagle_http::MiddlewarePipeline;

use crate::csrf::CsrfMiddleware;
use crate::gate::AuthenticationGate;
use crate::hashers::{BcryptHasher, PasswordHasher};
use crate::policy::AuthorizationPolicy;
use crate::store::UserStore;
use crate::verifier::CredentialVerifier;

static INSTALLED: OnceLock<SecurityConfiguration> = OnceLock::new();

/// The assembled security layer.
pub struct SecurityConfiguration {
    hasher: Arc<dyn PasswordHasher>,
    verifier: Arc<CredentialVerifier>,
    policy: Arc<AuthorizationPolicy>,
    gate: AuthenticationGate,
    csrf: Option<CsrfMiddleware>,
}

impl std::fmt::Debug for SecurityConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfiguration")
            .field("algorithm", &self.hasher.algorithm())
            .field("rules", &self.policy.table().len())
            .field("csrf_enabled", &self.csrf_enabled())
            .finish_non_exhaustive()
    }
}

impl SecurityConfiguration {
    /// Builds the security layer.
    ///
    /// Computes one bcrypt hash at the configured cost for the verifier's
    /// timing dummy, so expect this to take as long as one login.
    pub async fn new(
        settings: &SecuritySettings,
        store: Arc<dyn UserStore>,
    ) -> Result<Self, BeagleError> {
        let policy = Arc::new(AuthorizationPolicy::from_settings(&settings.rules)?);
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(settings.bcrypt_cost)?);
        let verifier = Arc::new(CredentialVerifier::new(store, hasher.clone()).await?);
        let gate = AuthenticationGate::new(verifier.clone(), policy.clone(), &settings.realm)?;

        for rule in policy.table().rules() {
            tracing::debug!(%rule, "authorization rule");
        }

        let csrf = if settings.csrf_enabled {
            tracing::info!(
                cookie = %settings.csrf_cookie_name,
                header = %settings.csrf_header_name,
                "CSRF protection enabled"
            );
            Some(CsrfMiddleware::from_settings(settings))
        } else {
            tracing::warn!("CSRF protection disabled by security.csrf_enabled = false");
            None
        };

        Ok(Self {
            hasher,
            verifier,
            policy,
            gate,
            csrf,
        })
    }

    /// Returns the shared credential verifier for programmatic
    /// authentication.
    pub fn authentication_manager(&self) -> Arc<CredentialVerifier> {
        Arc::clone(&self.verifier)
    }

    /// Returns the configured password hasher.
    pub fn password_hasher(&self) -> Arc<dyn PasswordHasher> {
        Arc::clone(&self.hasher)
    }

    /// Returns the authorization policy.
    pub const fn policy(&self) -> &Arc<AuthorizationPolicy> {
        &self.policy
    }

    /// Returns the request gate.
    pub const fn gate(&self) -> &AuthenticationGate {
        &self.gate
    }

    /// Returns `true` if CSRF tokens are issued and checked.
    pub const fn csrf_enabled(&self) -> bool {
        self.csrf.is_some()
    }

    /// Builds the request pipeline: CSRF (when enabled), then the gate.
    pub fn build_pipeline(&self) -> MiddlewarePipeline {
        let mut pipeline = MiddlewarePipeline::new();
        if let Some(csrf) = &self.csrf {
            pipeline.add(csrf.clone());
        }
        pipeline.add(self.gate.clone());
        pipeline
    }

    /// Installs this configuration process-wide.
    ///
    /// Fails with [`BeagleError::ImproperlyConfigured`] if one is already
    /// installed.
    pub fn install(self) -> Result<&'static Self, BeagleError> {
        INSTALLED.set(self).map_err(|_| {
            BeagleError::ImproperlyConfigured(
                "security configuration has already been installed".to_string(),
            )
        })?;
        Self::global().ok_or_else(|| {
            BeagleError::ImproperlyConfigured("security configuration missing after install".into())
        })
    }

    /// Returns the installed configuration, if any.
    pub fn global() -> Option<&'static Self> {
        INSTALLED.get()
    }
}
