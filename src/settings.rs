//! Cache settings
//!
//! The storage root is a required external dependency: there is no default
//! location, and constructing settings from the environment fails without it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Environment variable naming the storage root directory (required).
pub const STORAGE_ENV_VAR: &str = "TRITON_DEJAVU_STORAGE";

/// Environment variable naming the tag segment (optional).
pub const TAG_ENV_VAR: &str = "TRITON_DEJAVU_TAG";

/// Environment variable bounding the wait for a kernel's code hash, in seconds.
pub const HASH_TIMEOUT_ENV_VAR: &str = "TRITON_DEJAVU_HASH_TIMEOUT_S";

/// Tag used when [`TAG_ENV_VAR`] is unset.
pub const DEFAULT_TAG: &str = "default";

/// Settings errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("the environment variable TRITON_DEJAVU_STORAGE must be set")]
    MissingStorageRoot,

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("tag must be a single path segment, got {0:?}")]
    InvalidTag(String),

    #[error("TRITON_DEJAVU_HASH_TIMEOUT_S must be a number of seconds, got {0:?}")]
    InvalidHashTimeout(String),
}

/// Which records a mutating `add` writes back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Write every record known to this process.
    #[default]
    Full,
    /// Write only records changed since the last flush.
    Dirty,
}

/// Settings for a [`CacheStore`](crate::CacheStore).
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Configured storage root prefix
    pub storage_prefix: PathBuf,
    /// Machine/runtime identifier appended to the prefix
    pub storage_identifier: String,
    /// Namespace segment appended to every record path
    pub tag: String,
    /// Bound on waiting for the compiler's code hash (`None` waits forever)
    pub hash_timeout: Option<Duration>,
    pub flush_policy: FlushPolicy,
    /// Merge with the on-disk record under a file lock before each write
    pub merge_on_write: bool,
    /// How long to wait for a record lock when `merge_on_write` is set
    pub lock_timeout: Duration,
}

impl CacheSettings {
    /// Create settings with the default tag and policies.
    pub fn new(storage_prefix: impl Into<PathBuf>, storage_identifier: impl Into<String>) -> Self {
        Self {
            storage_prefix: storage_prefix.into(),
            storage_identifier: storage_identifier.into(),
            tag: DEFAULT_TAG.to_string(),
            hash_timeout: None,
            flush_policy: FlushPolicy::default(),
            merge_on_write: false,
            lock_timeout: Duration::from_secs(30),
        }
    }

    /// Read settings from the process environment.
    ///
    /// The identifier comes from the caller's environment discovery.
    pub fn from_env(storage_identifier: impl Into<String>) -> Result<Self, SettingsError> {
        Self::from_lookup(storage_identifier, |name| std::env::var(name).ok())
    }

    /// Read settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(
        storage_identifier: impl Into<String>,
        lookup: F,
    ) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = lookup(STORAGE_ENV_VAR)
            .filter(|v| !v.is_empty())
            .ok_or(SettingsError::MissingStorageRoot)?;

        let mut settings = Self::new(prefix, storage_identifier);

        if let Some(tag) = lookup(TAG_ENV_VAR).filter(|v| !v.is_empty()) {
            settings.tag = tag;
        }

        if let Some(raw) = lookup(HASH_TIMEOUT_ENV_VAR) {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| SettingsError::InvalidHashTimeout(raw.clone()))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(SettingsError::InvalidHashTimeout(raw));
            }
            settings.hash_timeout = Some(Duration::from_secs_f64(secs));
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_hash_timeout(mut self, timeout: Duration) -> Self {
        self.hash_timeout = Some(timeout);
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_merge_on_write(mut self, lock_timeout: Duration) -> Self {
        self.merge_on_write = true;
        self.lock_timeout = lock_timeout;
        self
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.storage_prefix.as_os_str().is_empty() {
            return Err(SettingsError::Empty {
                field: "storage_prefix",
            });
        }
        if self.storage_identifier.is_empty() {
            return Err(SettingsError::Empty {
                field: "storage_identifier",
            });
        }
        if self.tag.is_empty() {
            return Err(SettingsError::Empty { field: "tag" });
        }
        if self.tag.contains('/') || self.tag.contains('\\') || self.tag == "." || self.tag == ".." {
            return Err(SettingsError::InvalidTag(self.tag.clone()));
        }
        Ok(())
    }
}
