use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, capture_diff_slices};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mutants::{MutantStatus, MutationId};

pub const CACHE_FILE_NAME: &str = ".mutator-cache.json";

/// Bumped whenever the layout below changes. A cache written with another
/// version is discarded on open.
pub const CACHE_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    version: u32,
    baseline_time: Option<f64>,
    next_id: u64,
    files: BTreeMap<Utf8PathBuf, CachedFile>,
}

impl Default for CacheData {
    fn default() -> Self {
        CacheData {
            version: CACHE_VERSION,
            baseline_time: None,
            next_id: 1,
            files: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedFile {
    lines: Vec<CachedLine>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedLine {
    line: String,
    line_number: usize,
    mutants: Vec<CachedMutant>,
}

impl CachedLine {
    fn new(line: &str, line_number: usize) -> Self {
        CachedLine {
            line: line.to_string(),
            line_number,
            mutants: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedMutant {
    id: u64,
    index: usize,
    status: MutantStatus,
    tested_against_hash: Option<String>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// One row of the `results` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub id: u64,
    pub filename: Utf8PathBuf,
    pub mutation: MutationId,
    pub status: MutantStatus,
}

/// Per-project store of mutant outcomes, kept as JSON in the working
/// directory and rewritten atomically on every change.
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    data: CacheData,
}

impl ResultCache {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CACHE_FILE_NAME);
        let data = match fs::read_to_string(&path) {
            Ok(text) => Self::decode(&path, &text),
            Err(e) if e.kind() == ErrorKind::NotFound => CacheData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(ResultCache { path, data })
    }

    fn decode(path: &Path, text: &str) -> CacheData {
        let version = serde_json::from_str::<VersionProbe>(text)
            .ok()
            .and_then(|probe| probe.version);
        if version != Some(CACHE_VERSION) {
            warn!(
                "cache {} has version {:?}, expected {}; starting from scratch",
                path.display(),
                version,
                CACHE_VERSION
            );
            return CacheData::default();
        }
        match serde_json::from_str(text) {
            Ok(data) => data,
            Err(e) => {
                warn!("cache {} is unreadable ({e}); starting from scratch", path.display());
                CacheData::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.data)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("saved cache to {}", self.path.display());
        Ok(())
    }

    pub fn baseline_time(&self) -> Option<f64> {
        self.data.baseline_time
    }

    pub fn set_baseline_time(&mut self, seconds: f64) -> Result<()> {
        self.data.baseline_time = Some(seconds);
        self.save()
    }

    pub fn clear_baseline_time(&mut self) -> Result<()> {
        self.data.baseline_time = None;
        self.save()
    }

    /// Re-aligns cached lines with the file's current content. Lines that
    /// survive an edit keep their mutants under their new line number;
    /// removed lines take their mutants with them.
    pub fn update_line_numbers(&mut self, filename: &Utf8Path, source: &str) {
        let current: Vec<&str> = source.split('\n').collect();
        let file = self.data.files.entry(filename.to_path_buf()).or_default();
        if file.lines.is_empty() {
            file.lines = current
                .iter()
                .enumerate()
                .map(|(n, line)| CachedLine::new(line, n))
                .collect();
            return;
        }

        let ops = {
            let previous: Vec<&str> = file.lines.iter().map(|l| l.line.as_str()).collect();
            capture_diff_slices(Algorithm::Myers, &previous, &current)
        };
        let mut previous = std::mem::take(&mut file.lines);
        let mut lines = Vec::with_capacity(current.len());
        for op in ops {
            match op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => {
                    for k in 0..len {
                        let mut line = std::mem::take(&mut previous[old_index + k]);
                        line.line_number = new_index + k;
                        lines.push(line);
                    }
                }
                DiffOp::Delete { .. } => {}
                DiffOp::Insert {
                    new_index, new_len, ..
                }
                | DiffOp::Replace {
                    new_index, new_len, ..
                } => {
                    for k in 0..new_len {
                        lines.push(CachedLine::new(current[new_index + k], new_index + k));
                    }
                }
            }
        }
        file.lines = lines;
    }

    /// Makes sure every id has a row. New rows start out untested.
    pub fn register_mutants(&mut self, filename: &Utf8Path, ids: &[MutationId]) -> Result<()> {
        for id in ids {
            let next_id = self.data.next_id;
            let line = self.line_mut(filename, id)?;
            if !line.mutants.iter().any(|m| m.index == id.index) {
                line.mutants.push(CachedMutant {
                    id: next_id,
                    index: id.index,
                    status: MutantStatus::Untested,
                    tested_against_hash: None,
                });
                self.data.next_id += 1;
            }
        }
        Ok(())
    }

    /// The status to trust for this mutant. A kill is trusted whatever the
    /// test suite looks like now; anything else only while the suite is
    /// unchanged.
    pub fn cached_status(&self, filename: &Utf8Path, id: &MutationId, tests_hash: &str) -> MutantStatus {
        let Some(mutant) = self.find(filename, id) else {
            return MutantStatus::Untested;
        };
        if mutant.status == MutantStatus::OkKilled {
            return MutantStatus::OkKilled;
        }
        if mutant.tested_against_hash.as_deref() == Some(tests_hash) {
            mutant.status
        } else {
            MutantStatus::Untested
        }
    }

    pub fn set_status(
        &mut self,
        filename: &Utf8Path,
        id: &MutationId,
        status: MutantStatus,
        tests_hash: &str,
    ) -> Result<()> {
        let next_id = self.data.next_id;
        let line = self.line_mut(filename, id)?;
        match line.mutants.iter_mut().find(|m| m.index == id.index) {
            Some(mutant) => {
                mutant.status = status;
                mutant.tested_against_hash = Some(tests_hash.to_string());
            }
            None => {
                line.mutants.push(CachedMutant {
                    id: next_id,
                    index: id.index,
                    status,
                    tested_against_hash: Some(tests_hash.to_string()),
                });
                self.data.next_id += 1;
            }
        }
        self.save()
    }

    /// Numeric id shown to users for this mutant.
    pub fn mutant_id(&self, filename: &Utf8Path, id: &MutationId) -> Option<u64> {
        self.find(filename, id).map(|m| m.id)
    }

    pub fn lookup(&self, id: u64) -> Result<(Utf8PathBuf, MutationId)> {
        for (filename, file) in &self.data.files {
            for line in &file.lines {
                if let Some(mutant) = line.mutants.iter().find(|m| m.id == id) {
                    let mutation = MutationId::new(line.line.clone(), mutant.index, line.line_number);
                    return Ok((filename.clone(), mutation));
                }
            }
        }
        Err(Error::UnknownMutant(id))
    }

    /// Every cached mutant, by file, line and index.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for (filename, file) in &self.data.files {
            for line in &file.lines {
                let mut mutants: Vec<&CachedMutant> = line.mutants.iter().collect();
                mutants.sort_by_key(|m| m.index);
                for mutant in mutants {
                    entries.push(CacheEntry {
                        id: mutant.id,
                        filename: filename.clone(),
                        mutation: MutationId::new(line.line.clone(), mutant.index, line.line_number),
                        status: mutant.status,
                    });
                }
            }
        }
        entries
    }

    fn find(&self, filename: &Utf8Path, id: &MutationId) -> Option<&CachedMutant> {
        self.data
            .files
            .get(filename)?
            .lines
            .iter()
            .find(|l| l.line_number == id.line_number && l.line == id.line)?
            .mutants
            .iter()
            .find(|m| m.index == id.index)
    }

    fn line_mut(&mut self, filename: &Utf8Path, id: &MutationId) -> Result<&mut CachedLine> {
        self.data
            .files
            .get_mut(filename)
            .and_then(|file| {
                file.lines
                    .iter_mut()
                    .find(|l| l.line_number == id.line_number && l.line == id.line)
            })
            .ok_or_else(|| Error::UnknownLine {
                filename: filename.to_path_buf(),
                line: id.line.clone(),
                line_number: id.line_number,
            })
    }
}
