//! Store configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. [`StoreConfig::default`]: reject duplicate keys, immediate commits.
//! 2. Environment variables, see [`StoreConfig::from_env`]:
//!    - `FTUI_ATOM_DUPLICATE_KEYS`: `reject` | `replace`
//!    - `FTUI_ATOM_COMMIT`: `immediate` | `debounced`
//!    - `FTUI_ATOM_COMMIT_WAIT_MS`: debounce wait in milliseconds
//! 3. With the `policy-config` feature, a TOML or JSON policy document using
//!    the same field names in lower case (`duplicate_keys`, `commit`,
//!    `commit_wait_ms`).
//!
//! Invalid settings never abort parsing: they are reported as
//! [`ConfigError`] diagnostics and the default for that field is kept.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::scheduler::CommitPolicy;

pub const ENV_DUPLICATE_KEYS: &str = "FTUI_ATOM_DUPLICATE_KEYS";
pub const ENV_COMMIT: &str = "FTUI_ATOM_COMMIT";
pub const ENV_COMMIT_WAIT_MS: &str = "FTUI_ATOM_COMMIT_WAIT_MS";

/// What registering an already-used key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeyPolicy {
    /// Fail with [`AtomError::DuplicateKey`](crate::AtomError::DuplicateKey).
    #[default]
    Reject,
    /// The new atom takes over the registration.
    Replace,
}

impl DuplicateKeyPolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" | "error" => Some(Self::Reject),
            "replace" | "override" => Some(Self::Replace),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for an [`AtomStore`](crate::AtomStore).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Registration conflict handling.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Commit policy for atoms that do not set their own.
    pub commit: CommitPolicy,
}

impl StoreConfig {
    /// Set the duplicate key policy.
    #[must_use]
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// Set the default commit policy.
    #[must_use]
    pub fn with_commit(mut self, policy: CommitPolicy) -> Self {
        self.commit = policy;
        self
    }

    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> StoreConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Parse config from a TOML policy document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document itself is malformed.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> Result<ConfigParse, ConfigError> {
        let doc: policy::PolicyDocument = toml::from_str(text)
            .map_err(|err| ConfigError::new("policy", err.to_string(), "malformed TOML policy"))?;
        Ok(doc.into_parse())
    }

    /// Parse config from a JSON policy document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document itself is malformed.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(text: &str) -> Result<ConfigParse, ConfigError> {
        let doc: policy::PolicyDocument = serde_json::from_str(text)
            .map_err(|err| ConfigError::new("policy", err.to_string(), "malformed JSON policy"))?;
        Ok(doc.into_parse())
    }
}

/// A rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: &'static str,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: &'static str) -> Self {
        Self {
            field,
            value: value.into(),
            message,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed configuration plus every rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParse {
    pub config: StoreConfig,
    pub errors: Vec<ConfigError>,
}

/// Raw string settings, shared by every source.
#[derive(Debug, Default)]
struct RawSettings {
    duplicate_keys: Option<String>,
    commit: Option<String>,
    commit_wait_ms: Option<String>,
}

fn from_env_with<F>(mut get: F) -> ConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    apply(RawSettings {
        duplicate_keys: get(ENV_DUPLICATE_KEYS),
        commit: get(ENV_COMMIT),
        commit_wait_ms: get(ENV_COMMIT_WAIT_MS),
    })
}

fn apply(raw: RawSettings) -> ConfigParse {
    let mut config = StoreConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = raw.duplicate_keys {
        match DuplicateKeyPolicy::parse(&value) {
            Some(parsed) => config.duplicate_keys = parsed,
            None => errors.push(ConfigError::new(
                "duplicate_keys",
                value,
                "expected reject|replace",
            )),
        }
    }

    let wait = match raw.commit_wait_ms {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => {
                errors.push(ConfigError::new(
                    "commit_wait_ms",
                    value,
                    "expected non-negative integer",
                ));
                None
            }
        },
        None => None,
    };

    if let Some(value) = raw.commit {
        match value.trim().to_ascii_lowercase().as_str() {
            "immediate" => {
                if let Some(wait) = wait {
                    errors.push(ConfigError::new(
                        "commit_wait_ms",
                        wait.as_millis().to_string(),
                        "commit_wait_ms requires commit=debounced",
                    ));
                }
            }
            "debounced" => {
                config.commit = CommitPolicy::debounced(wait.unwrap_or(Duration::ZERO));
            }
            _ => errors.push(ConfigError::new(
                "commit",
                value,
                "expected immediate|debounced",
            )),
        }
    } else if let Some(wait) = wait {
        config.commit = CommitPolicy::debounced(wait);
    }

    ConfigParse { config, errors }
}

#[cfg(feature = "policy-config")]
mod policy {
    use serde::Deserialize;

    use super::{ConfigParse, RawSettings, apply};

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub(super) struct PolicyDocument {
        duplicate_keys: Option<String>,
        commit: Option<String>,
        commit_wait_ms: Option<u64>,
    }

    impl PolicyDocument {
        pub(super) fn into_parse(self) -> ConfigParse {
            apply(RawSettings {
                duplicate_keys: self.duplicate_keys,
                commit: self.commit,
                commit_wait_ms: self.commit_wait_ms.map(|ms| ms.to_string()),
            })
        }
    }
}
