//! On-disk layout of the cache
//!
//! ```text
//! <prefix>/<identifier>/<kernel>/autotune_config-<p>/kernel_configs-<c>/code_version-<h>/<tag>/cache.json
//! ```
//!
//! Directories are created world-writable so records can be shared between
//! users (containers and host commonly run as different uids). Failing to
//! relax permissions is logged and otherwise ignored.
//!
//! Record files are replaced atomically (write to a temp file in the same
//! directory, then rename), so readers never observe a partial record.

mod locator;
mod lock;

pub use locator::{StorageLocator, RECORD_FILENAME};
pub use lock::{LockError, LockResult, RecordLock};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Mode applied to every directory the cache creates.
pub const DIR_MODE: u32 = 0o777;

/// Create `dir` and any missing ancestors, relaxing permissions on each
/// directory this call created.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(dir);
    while let Some(p) = cursor {
        if p.as_os_str().is_empty() || p.exists() {
            break;
        }
        missing.push(p.to_path_buf());
        cursor = p.parent();
    }

    fs::create_dir_all(dir)?;

    for created in missing.iter().rev() {
        set_permissive(created);
    }
    Ok(())
}

/// Relax permissions on `dir`, logging on failure.
pub fn set_permissive(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE)) {
            tracing::warn!(dir = %dir.display(), error = %e, "can't set permission of directory");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

/// Write `contents` to `path` atomically (write-then-rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

    fs::write(&temp_path, contents)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
