use std::fmt;
use std::fs;
use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::error::{Error, Result};
use crate::safety;

/// Identifies a mutation by the line it sits on rather than by byte offset,
/// so it survives edits elsewhere in the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId {
    /// Text of the line, without the newline.
    pub line: String,
    /// Position among the mutations found on this line.
    pub index: usize,
    /// Zero-based.
    pub line_number: usize,
}

impl MutationId {
    pub fn new(line: impl Into<String>, index: usize, line_number: usize) -> Self {
        MutationId {
            line: line.into(),
            index,
            line_number,
        }
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} on line {} ({:?})",
            self.index,
            self.line_number + 1,
            self.line.trim()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutantStatus {
    Untested,
    OkKilled,
    OkSuspicious,
    BadTimeout,
    BadSurvived,
}

impl MutantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MutantStatus::Untested => "untested",
            MutantStatus::OkKilled => "killed",
            MutantStatus::OkSuspicious => "suspicious",
            MutantStatus::BadTimeout => "timeout",
            MutantStatus::BadSurvived => "survived",
        }
    }

    pub fn is_tested(self) -> bool {
        self != MutantStatus::Untested
    }
}

impl fmt::Display for MutantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rewritten copy of one file, plus the bookkeeping to put it on disk
/// and take it off again.
#[derive(Debug, Clone)]
pub struct Mutant {
    pub filename: Utf8PathBuf,
    pub id: MutationId,
    pub source: Arc<str>,
    pub mutated_source: String,
    pub status: MutantStatus,
    applied: bool,
}

impl Mutant {
    pub fn new(filename: Utf8PathBuf, id: MutationId, source: Arc<str>, mutated_source: String) -> Self {
        Mutant {
            filename,
            id,
            source,
            mutated_source,
            status: MutantStatus::Untested,
            applied: false,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Saves the original next to the file as `<file>.bak`, then writes the
    /// mutated source in its place.
    pub fn apply(&mut self) -> Result<()> {
        if self.applied {
            return Err(Error::AlreadyApplied(self.filename.clone()));
        }
        let path = self.filename.as_std_path();
        fs::write(safety::backup_path(path), self.source.as_bytes())?;
        fs::write(path, &self.mutated_source)?;
        safety::clear_pycache_for(path);
        self.applied = true;
        Ok(())
    }

    /// Moves the backup back over the file.
    pub fn revert(&mut self) -> Result<()> {
        if !self.applied {
            return Err(Error::NotApplied(self.filename.clone()));
        }
        let path = self.filename.as_std_path();
        safety::restore_from_backup(path, &safety::backup_path(path))?;
        self.applied = false;
        Ok(())
    }

    /// Writes the mutated source for good, optionally keeping a backup.
    pub fn write_permanently(&self, backup: bool) -> Result<()> {
        let path = self.filename.as_std_path();
        if backup {
            fs::write(safety::backup_path(path), self.source.as_bytes())?;
        }
        fs::write(path, &self.mutated_source)?;
        safety::clear_pycache_for(path);
        Ok(())
    }

    /// Unified diff from the original to the mutated source.
    pub fn diff(&self) -> String {
        let name = self.filename.as_str();
        TextDiff::from_lines(&*self.source, &self.mutated_source)
            .unified_diff()
            .context_radius(3)
            .header(name, name)
            .to_string()
    }

    /// The first removed and first added line, trimmed, for one-line reports.
    pub fn changed_lines(&self) -> (String, String) {
        let diff = TextDiff::from_lines(&*self.source, &self.mutated_source);
        let mut removed = String::new();
        let mut added = String::new();
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete if removed.is_empty() => removed = change.value().trim().to_string(),
                ChangeTag::Insert if added.is_empty() => added = change.value().trim().to_string(),
                _ => {}
            }
        }
        (removed, added)
    }
}
