use std::fs;
use std::path::{Component, Path, PathBuf};

use camino::Utf8PathBuf;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// Directories that never hold code worth mutating.
const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "build",
    "dist",
];

pub const DEFAULT_TESTS_DIR: &str = "tests/:test/";

/// Drops `.` components so `./tests` and `tests/` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Source files and directories left out of mutation.
#[derive(Debug, Default)]
pub struct SourceFilter {
    tests_dirs: Vec<PathBuf>,
    excluded: Vec<glob::Pattern>,
}

impl SourceFilter {
    pub fn new(tests_dirs: &[PathBuf], exclude_patterns: &[String]) -> Result<Self> {
        let excluded = exclude_patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| glob::Pattern::new(p.trim()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(SourceFilter {
            tests_dirs: tests_dirs.iter().map(|p| normalize(p)).collect(),
            excluded,
        })
    }

    /// Patterns match either the entry's own name or its whole path. An
    /// excluded directory takes its subtree with it.
    fn is_excluded(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        if self.tests_dirs.iter().any(|dir| *dir == normalized) {
            return true;
        }
        let name = path.file_name().map(|n| n.to_string_lossy());
        self.excluded.iter().any(|pattern| {
            name.as_deref().is_some_and(|n| pattern.matches(n)) || pattern.matches_path(&normalized)
        })
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() && SKIP_NAMES.contains(&name.as_ref()) {
            return false;
        }
        !self.is_excluded(entry.path())
    }
}

/// Files under `path` with one of `extensions`, in a stable walk order.
/// A path naming a file is returned as is.
pub fn source_files(path: &Path, extensions: &[&str], filter: &SourceFilter) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| filter.keep(e))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches_extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if !matches_extension && entry.depth() > 0 {
            continue;
        }
        let file = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(Error::NonUtf8Path)?;
        files.push(file);
    }
    debug!("found {} files under {}", files.len(), path.display());
    Ok(files)
}

/// Expands a `:`-separated list of test directory patterns, both relative
/// to the working directory and nested anywhere under the paths to mutate.
pub fn resolve_tests_dirs(tests_dir: &str, paths_to_mutate: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for pattern in tests_dir.split(':').map(str::trim).filter(|p| !p.is_empty()) {
        let pattern = pattern.trim_end_matches('/');
        let mut candidates = vec![pattern.to_string()];
        for path in paths_to_mutate {
            candidates.push(format!("{}/**/{}", path.display(), pattern));
        }
        for candidate in candidates {
            let Ok(matches) = glob::glob(&candidate) else {
                continue;
            };
            for dir in matches.flatten() {
                if dir.is_dir() && !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
    }
    dirs
}

/// Fingerprint of every file in the test directories. Results recorded
/// against another fingerprint are re-tested, except kills.
pub fn hash_of_tests(tests_dirs: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    for dir in tests_dirs {
        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().is_some_and(|e| e == "pyc") {
                continue;
            }
            hasher.update(entry.path().to_string_lossy().as_bytes());
            hasher.update(fs::read(entry.path())?);
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Picks the code directory when none was given: `lib`, `src`, or a package
/// named after the project directory.
pub fn guess_paths_to_mutate(project_dir: &Path) -> Result<PathBuf> {
    for candidate in ["lib", "src"] {
        if project_dir.join(candidate).is_dir() {
            return Ok(PathBuf::from(candidate));
        }
    }
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or(Error::NoPathsToMutate)?;
    let variants = [
        name.clone(),
        name.replace('-', "_"),
        name.replace(' ', "_"),
        name.replace('-', ""),
        name.replace(' ', ""),
    ];
    variants
        .into_iter()
        .find(|v| project_dir.join(v).is_dir())
        .map(PathBuf::from)
        .ok_or(Error::NoPathsToMutate)
}
