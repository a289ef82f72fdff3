use camino::Utf8PathBuf;
use std::path::PathBuf;

use crate::mutants::MutationId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The parser rejected the source. Line is 1-based.
    #[error("syntax error in {filename} on line {line}: {text:?}")]
    Syntax {
        filename: Utf8PathBuf,
        line: usize,
        text: String,
    },

    #[error("failed while creating mutations for file {filename}")]
    Generation {
        filename: Utf8PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("mutant for {0} is already applied, call revert before applying again")]
    AlreadyApplied(Utf8PathBuf),

    #[error("mutant for {0} is not applied, call apply before reverting")]
    NotApplied(Utf8PathBuf),

    #[error("tests don't run cleanly without mutations. Test command was: {command}\n\nOutput:\n\n{output}")]
    RedBaseline { command: String, output: String },

    #[error("subprocess running command '{command}' timed out after {seconds:.2} seconds")]
    Timeout { command: String, seconds: f64 },

    /// A file backing an optional feature (coverage, patch) is absent.
    #[error("{feature} requires {}, which does not exist", path.display())]
    MissingInput { feature: &'static str, path: PathBuf },

    #[error(
        "backup {} exists from an interrupted run; restore it with `mutator restore {}` or delete it",
        backup.display(),
        file.display()
    )]
    OrphanedBackup { file: PathBuf, backup: PathBuf },

    #[error("no mutant with id {0} in the cache")]
    UnknownMutant(u64),

    #[error("mutant {id} no longer exists in {filename}; the file changed since it was generated")]
    MutantNotFound {
        filename: Utf8PathBuf,
        id: MutationId,
    },

    #[error("cache has no line {line_number} ({line:?}) for {filename}")]
    UnknownLine {
        filename: Utf8PathBuf,
        line: String,
        line_number: usize,
    },

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("could not figure out where the code to mutate is; pass --paths-to-mutate")]
    NoPathsToMutate,

    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to load grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}
