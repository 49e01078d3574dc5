//! Composite identity derivation
//!
//! A record is identified by four hashes:
//! - the kernel code hash, published by the compiler
//! - the config-space hash, over the ordered candidate configurations
//! - the runtime-key hash, over the names of the autotuning key arguments
//! - the parameter hash, over the static autotuner parameters
//!
//! They map to a hierarchical path:
//!
//! ```text
//! <kernel>/autotune_config-<param>/kernel_configs-<configs>/code_version-<sha256(code-key)>/<tag>
//! ```
//!
//! All digests are SHA-256 in lowercase hex.

mod code_hash;

pub use code_hash::{code_hash_channel, CodeHashPublisher, CodeHashReceiver, Kernel};

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hash derivation errors
#[derive(Debug, Error)]
pub enum HashError {
    #[error("kernel {kernel} did not publish a code hash within {timeout:?}")]
    Timeout { kernel: String, timeout: Duration },

    #[error("compiler for kernel {0} went away without publishing a code hash")]
    CompilerGone(String),

    #[error("invalid kernel name {0:?}")]
    InvalidKernelName(String),
}

/// SHA-256 hex digest of a string.
pub fn string_hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of an ordered list of strings joined by `|`.
pub fn list_hash<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("|");
    string_hash(&joined)
}

/// Digest over the textual form of each candidate configuration.
///
/// Every entry is terminated by `|`, with a leading `|`. Order matters:
/// callers must pass configurations in a reproducible order.
pub fn config_space_hash<C: Display>(configs: &[C]) -> String {
    let mut s = String::from("|");
    for c in configs {
        s.push_str(&c.to_string());
        s.push('|');
    }
    string_hash(&s)
}

/// Build the record path for a set of hashes.
///
/// The code-version segment hashes `code_hash` together with `key_hash`;
/// config-space and parameter changes get segments of their own.
pub fn derive_path(
    kernel_name: &str,
    code_hash: &str,
    configs_hash: &str,
    key_hash: &str,
    param_hash: &str,
    tag: &str,
) -> PathBuf {
    let code_version = string_hash(&format!("{}-{}", code_hash, key_hash));
    PathBuf::from(kernel_name)
        .join(format!("autotune_config-{}", param_hash))
        .join(format!("kernel_configs-{}", configs_hash))
        .join(format!("code_version-{}", code_version))
        .join(tag)
}

/// The caller-supplied hashes of a composite identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityHashes {
    pub configs_hash: String,
    pub key_hash: String,
    pub param_hash: String,
}

impl IdentityHashes {
    pub fn new(
        configs_hash: impl Into<String>,
        key_hash: impl Into<String>,
        param_hash: impl Into<String>,
    ) -> Self {
        Self {
            configs_hash: configs_hash.into(),
            key_hash: key_hash.into(),
            param_hash: param_hash.into(),
        }
    }
}

/// A fully resolved composite identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeIdentity {
    pub kernel_name: String,
    pub code_hash: String,
    pub hashes: IdentityHashes,
}

impl CompositeIdentity {
    pub fn new(kernel_name: &str, code_hash: &str, hashes: IdentityHashes) -> Self {
        Self {
            kernel_name: kernel_name.to_string(),
            code_hash: code_hash.to_string(),
            hashes,
        }
    }

    /// Record path relative to the storage root.
    pub fn relative_path(&self, tag: &str) -> PathBuf {
        derive_path(
            &self.kernel_name,
            &self.code_hash,
            &self.hashes.configs_hash,
            &self.hashes.key_hash,
            &self.hashes.param_hash,
            tag,
        )
    }
}

/// Resolves composite identities for kernels.
#[derive(Debug, Clone, Default)]
pub struct HashDeriver {
    hash_timeout: Option<Duration>,
}

impl HashDeriver {
    /// `hash_timeout` bounds the wait for the compiler; `None` waits forever.
    pub fn new(hash_timeout: Option<Duration>) -> Self {
        Self { hash_timeout }
    }

    /// Trigger compilation of `kernel` and wait for its code hash.
    pub async fn kernel_code_hash(&self, kernel: &dyn Kernel) -> Result<String, HashError> {
        let name = kernel.name();
        let mut receiver = kernel.compile();

        match self.hash_timeout {
            Some(timeout) => tokio::time::timeout(timeout, receiver.wait(name))
                .await
                .map_err(|_| HashError::Timeout {
                    kernel: name.to_string(),
                    timeout,
                })?,
            None => receiver.wait(name).await,
        }
    }

    /// Resolve the composite identity of `kernel` under `hashes`.
    pub async fn identity(
        &self,
        kernel: &dyn Kernel,
        hashes: &IdentityHashes,
    ) -> Result<CompositeIdentity, HashError> {
        let name = kernel.name();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(HashError::InvalidKernelName(name.to_string()));
        }

        let code_hash = self.kernel_code_hash(kernel).await?;
        Ok(CompositeIdentity::new(name, &code_hash, hashes.clone()))
    }
}
