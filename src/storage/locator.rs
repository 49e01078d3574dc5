//! Storage root resolution

use std::io;
use std::path::{Path, PathBuf};

use super::ensure_dir;

/// File name of a storage record inside its directory.
pub const RECORD_FILENAME: &str = "cache.json";

/// Resolves where records live on disk.
#[derive(Debug, Clone)]
pub struct StorageLocator {
    prefix: PathBuf,
    identifier: String,
    root: PathBuf,
}

impl StorageLocator {
    /// Resolve `<prefix>/<identifier>` to an absolute path and create it.
    pub fn new(prefix: &Path, identifier: &str) -> io::Result<Self> {
        let joined = prefix.join(identifier);
        let root = if joined.is_absolute() {
            joined
        } else {
            std::env::current_dir()?.join(joined)
        };

        ensure_dir(&root)?;

        Ok(Self {
            prefix: prefix.to_path_buf(),
            identifier: identifier.to_string(),
            root,
        })
    }

    /// The configured prefix, as given.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Absolute storage root for this runtime.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the record at `relative`.
    pub fn record_dir(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Path of the record file at `relative`.
    pub fn record_file(&self, relative: &Path) -> PathBuf {
        self.record_dir(relative).join(RECORD_FILENAME)
    }

    /// Create the record directory at `relative` and return it.
    pub fn ensure_record_dir(&self, relative: &Path) -> io::Result<PathBuf> {
        let dir = self.record_dir(relative);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}
