use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// `<file>.bak`, next to the file.
pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut name = OsString::from(source_file.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Check if a backup file exists from a previous interrupted run.
pub fn check_interrupted_run(source_file: &Path) -> Option<PathBuf> {
    let bak = backup_path(source_file);
    if bak.exists() { Some(bak) } else { None }
}

/// Refuse to start while any file still has a backup lying around; testing
/// would overwrite the only copy of the original.
pub fn ensure_no_orphaned_backups<P: AsRef<Path>>(files: &[P]) -> Result<()> {
    for file in files {
        let file = file.as_ref();
        if let Some(backup) = check_interrupted_run(file) {
            return Err(Error::OrphanedBackup {
                file: file.to_path_buf(),
                backup,
            });
        }
    }
    Ok(())
}

/// Move the backup over the file. A rename never leaves a half-written file.
pub fn restore_from_backup(source_file: &Path, backup_file: &Path) -> Result<()> {
    fs::rename(backup_file, source_file)?;
    clear_pycache_for(source_file);
    Ok(())
}

/// Remove the __pycache__ .pyc files for a given source file.
/// A mutant written within the same second as the original can otherwise be
/// served from a stale bytecode cache.
pub fn clear_pycache_for(source_file: &Path) {
    let (Some(parent), Some(stem)) = (source_file.parent(), source_file.file_stem()) else {
        return;
    };
    let cache_dir = parent.join("__pycache__");
    let Ok(entries) = fs::read_dir(&cache_dir) else {
        return;
    };
    let stem = stem.to_string_lossy();
    let prefix = format!("{stem}.");
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".pyc") {
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::debug!("could not remove {}: {e}", entry.path().display());
            }
        }
    }
}
