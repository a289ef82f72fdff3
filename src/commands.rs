//! Entry points behind the command line: generate, run, apply, diff.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::error::{Error, Result};
use crate::mutants::Mutant;
use crate::orchestrator::FileMutations;
use crate::safety;
use crate::walker::Mutator;

/// Lists the mutants of one file and registers them in the cache.
pub fn add_mutations_by_file(
    mutator: &Mutator<'_>,
    cache: &mut ResultCache,
    filename: &Utf8Path,
) -> Result<FileMutations> {
    let source = fs::read_to_string(filename)?;
    let ids = mutator.list_mutations(filename, &source)?;
    cache.update_line_numbers(filename, &source);
    cache.register_mutants(filename, &ids)?;
    Ok(FileMutations {
        filename: filename.to_path_buf(),
        ids,
    })
}

/// Mutation ids for every file, in walk order. A file that fails to parse
/// stops everything unless `keep_going` is set, in which case it is logged
/// and skipped.
pub fn gen_mutations_by_file(
    mutator: &Mutator<'_>,
    cache: &mut ResultCache,
    files: &[Utf8PathBuf],
    keep_going: bool,
) -> Result<Vec<FileMutations>> {
    let mut by_file = Vec::with_capacity(files.len());
    for filename in files {
        match add_mutations_by_file(mutator, cache, filename) {
            Ok(mutations) => by_file.push(mutations),
            Err(e) if keep_going => warn!("skipping {filename}: {e}"),
            Err(e) => {
                return Err(Error::Generation {
                    filename: filename.clone(),
                    source: Box::new(e),
                });
            }
        }
    }
    cache.save()?;
    let total: usize = by_file.iter().map(|f| f.ids.len()).sum();
    info!("generated {total} mutants in {} files", by_file.len());
    Ok(by_file)
}

/// A single cached mutant, to re-run just that one.
pub fn mutations_from_cache(cache: &ResultCache, id: u64) -> Result<Vec<FileMutations>> {
    let (filename, mutation) = cache.lookup(id)?;
    Ok(vec![FileMutations {
        filename,
        ids: vec![mutation],
    }])
}

/// Rebuilds a cached mutant against the file as it is now.
pub fn mutant_by_id(mutator: &Mutator<'_>, cache: &mut ResultCache, id: u64) -> Result<Mutant> {
    let (filename, _) = cache.lookup(id)?;
    let source = fs::read_to_string(&filename)?;
    cache.update_line_numbers(&filename, &source);
    cache.save()?;
    let (_, mutation) = cache.lookup(id)?;
    mutator
        .mutant(&filename, &source, &mutation)?
        .ok_or(Error::MutantNotFound {
            filename,
            id: mutation,
        })
}

/// Writes a mutant to disk for good. Nothing reverts it. Refuses while the
/// file still has a backup, which may be the only copy of the original.
pub fn apply_mutant(mutator: &Mutator<'_>, cache: &mut ResultCache, id: u64, backup: bool) -> Result<Mutant> {
    let (filename, _) = cache.lookup(id)?;
    safety::ensure_no_orphaned_backups(&[filename.as_std_path()])?;
    let mutant = mutant_by_id(mutator, cache, id)?;
    mutant.write_permanently(backup)?;
    Ok(mutant)
}

pub fn unified_diff(mutator: &Mutator<'_>, cache: &mut ResultCache, id: u64) -> Result<String> {
    Ok(mutant_by_id(mutator, cache, id)?.diff())
}
