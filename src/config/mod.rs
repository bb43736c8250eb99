//! Scanning policy configuration.
//!
//! [`PolicyConfig`] decides whether scanning happens at all and which
//! remote detector (if any) governs it.  The process-lifetime copy lives
//! in a [`PolicyStore`] (an injected service object, not a module-level
//! global) and is mutated only through [`PolicyStore::update`].
//!
//! ## Configuration sources
//!
//! Resolved in order (later wins):
//!
//! 1. Compiled defaults (scanning on, no remote credentials)
//! 2. Environment variables (`PALISADE_*`), loaded via [`PolicyBuilder`]
//! 3. Runtime updates through the configuration endpoint

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Errors that can occur while building or updating the policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable parsing error.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// Environment variable key.
        key: String,
        /// Error message.
        message: String,
    },

    /// A policy update failed field validation.
    #[error("policy validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

// ── PolicyConfig ───────────────────────────────────────────────────────

/// The scanning policy in force for the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Global enable/disable flag for scanning.
    pub enabled: bool,
    /// Credential for the remote detection API.  Empty means "not
    /// configured"; the heuristic detector governs scans instead.
    pub api_key: String,
    /// Endpoint of the remote detection API.
    pub api_url: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true, // secure by default
            api_key: String::new(),
            api_url: String::new(),
        }
    }
}

impl PolicyConfig {
    /// Whether a remote detector is usable: both credential fields set.
    #[must_use]
    pub fn has_remote_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_url.is_empty()
    }
}

// ── PolicyUpdate ───────────────────────────────────────────────────────

/// A partial policy update.  Absent fields are left untouched; each
/// present field is applied atomically under one write lock.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PolicyUpdate {
    /// New value for the enabled flag.
    pub enabled: Option<bool>,
    /// New remote API key.  Explicit empty strings are rejected; to
    /// drop credentials, disable scanning instead.
    #[validate(length(min = 1, message = "api_key must not be empty"))]
    pub api_key: Option<String>,
    /// New remote API endpoint.
    #[validate(url(message = "api_url must be a valid URL"))]
    pub api_url: Option<String>,
}

impl PolicyUpdate {
    /// An update that only toggles the enabled flag.
    #[must_use]
    pub fn enabled(value: bool) -> Self {
        Self {
            enabled: Some(value),
            ..Self::default()
        }
    }
}

// ── PolicyStore ────────────────────────────────────────────────────────

/// Shared, lock-protected home of the process-wide [`PolicyConfig`].
///
/// Reads take a consistent snapshot; writes are last-write-wins.  The
/// lock is never held across an await point.
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<PolicyConfig>,
}

impl PolicyStore {
    /// Create a store with compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given configuration.
    #[must_use]
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// A consistent snapshot of the current policy.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> PolicyConfig {
        self.inner.read().unwrap().clone()
    }

    /// Apply a partial update and return the resulting policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any provided field fails
    /// validation; in that case no field is applied.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn update(&self, update: PolicyUpdate) -> Result<PolicyConfig, ConfigError> {
        update.validate()?;

        let mut config = self.inner.write().unwrap();
        if let Some(enabled) = update.enabled {
            config.enabled = enabled;
        }
        if let Some(api_key) = update.api_key {
            config.api_key = api_key;
        }
        if let Some(api_url) = update.api_url {
            config.api_url = api_url;
        }

        tracing::info!(
            enabled = config.enabled,
            remote_configured = config.has_remote_credentials(),
            "scanning policy updated",
        );
        Ok(config.clone())
    }
}

// ── PolicyBuilder ──────────────────────────────────────────────────────

/// Builds the initial policy from defaults and environment overrides.
///
/// Recognized variables:
/// - `PALISADE_SCANNING_ENABLED`: `true` / `false`
/// - `PALISADE_GUARD_API_KEY`
/// - `PALISADE_GUARD_API_URL`
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    base: PolicyConfig,
    use_env: bool,
}

impl PolicyBuilder {
    /// Create a builder seeded with compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable loading overrides from environment variables (and `.env`).
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Build the final policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvParse`] if an environment override is
    /// present but unparseable.
    pub fn build(mut self) -> Result<PolicyConfig, ConfigError> {
        if self.use_env {
            dotenvy::dotenv().ok();

            if let Ok(enabled) = std::env::var("PALISADE_SCANNING_ENABLED") {
                self.base.enabled = enabled.parse().map_err(|_| ConfigError::EnvParse {
                    key: "PALISADE_SCANNING_ENABLED".to_string(),
                    message: "must be 'true' or 'false'".to_string(),
                })?;
            }
            if let Ok(api_key) = std::env::var("PALISADE_GUARD_API_KEY") {
                self.base.api_key = api_key;
            }
            if let Ok(api_url) = std::env::var("PALISADE_GUARD_API_URL") {
                self.base.api_url = api_url;
            }
        }

        Ok(self.base)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
