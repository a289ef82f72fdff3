use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{Error, Result};

/// Module-level dunder assignments that hold package metadata.
pub const DUNDER_WHITELIST: &[&str] = &[
    "all",
    "version",
    "title",
    "package_name",
    "author",
    "description",
    "email",
    "license",
    "copyright",
];

const NAMESPACE_DECLARATION: &str = "__import__('pkg_resources').declare_namespace(__name__)";

/// Decides whether a line is worth mutating. Lines are 1-based.
pub trait LineFilter {
    fn is_of_interest(&self, filename: &Utf8Path, line: usize) -> bool;
}

impl<F> LineFilter for F
where
    F: Fn(&Utf8Path, usize) -> bool,
{
    fn is_of_interest(&self, filename: &Utf8Path, line: usize) -> bool {
        self(filename, line)
    }
}

/// Everything that can keep a line from being mutated.
#[derive(Default)]
pub struct ExclusionPolicy {
    filter: Option<Box<dyn LineFilter>>,
}

impl ExclusionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: impl LineFilter + 'static) -> Self {
        ExclusionPolicy {
            filter: Some(Box::new(filter)),
        }
    }

    pub fn for_file(&self, filename: &Utf8Path, source: &str) -> FileExclusions<'_> {
        let lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let pragma_lines = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| has_no_mutate_pragma(line))
            .map(|(n, _)| n)
            .collect();
        FileExclusions {
            filename: filename.to_path_buf(),
            lines,
            pragma_lines,
            filter: self.filter.as_deref(),
        }
    }
}

impl std::fmt::Debug for ExclusionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusionPolicy")
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// The policy bound to one file's lines.
pub struct FileExclusions<'a> {
    filename: Utf8PathBuf,
    lines: Vec<String>,
    pragma_lines: HashSet<usize>,
    filter: Option<&'a dyn LineFilter>,
}

impl FileExclusions<'_> {
    /// Text of a zero-based line, empty past the end of the file.
    pub fn line(&self, line_number: usize) -> &str {
        self.lines.get(line_number).map(String::as_str).unwrap_or("")
    }

    pub fn is_excluded(&self, line_number: usize) -> bool {
        let line = self.line(line_number);
        if is_dunder_metadata(line) || line.trim() == NAMESPACE_DECLARATION {
            return true;
        }
        if self.pragma_lines.contains(&line_number) {
            return true;
        }
        self.filter
            .is_some_and(|filter| !filter.is_of_interest(&self.filename, line_number + 1))
    }
}

/// `__version__ = "1.0"` and friends.
pub fn is_dunder_metadata(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("__") else {
        return false;
    };
    let Some((name, rest)) = rest.split_once("__") else {
        return false;
    };
    DUNDER_WHITELIST.contains(&name) && rest.trim_start().starts_with('=')
}

pub fn has_no_mutate_pragma(line: &str) -> bool {
    line.split_once("# pragma:")
        .is_some_and(|(_, pragma)| pragma.contains("no mutate"))
}

/// Per-file sets of 1-based line numbers worth mutating, loaded from a
/// coverage report or a patch. Files the source does not mention are
/// excluded entirely.
#[derive(Debug, Default, Clone)]
pub struct CoveredLines {
    by_file: HashMap<Utf8PathBuf, BTreeSet<usize>>,
}

impl CoveredLines {
    /// Lines added by a unified diff, keyed by their new-side path.
    pub fn from_patch(patch: &str) -> Self {
        let mut covered = CoveredLines::default();
        let mut current: Option<Utf8PathBuf> = None;
        let mut hunk: Option<Hunk> = None;

        for line in patch.lines() {
            if let Some(h) = hunk.as_mut().filter(|h| !h.is_done()) {
                match line.chars().next() {
                    Some('+') => {
                        if let Some(file) = &current {
                            covered.insert(file.clone(), h.new_line);
                        }
                        h.new_line += 1;
                        h.new_left = h.new_left.saturating_sub(1);
                    }
                    Some('-') => h.old_left = h.old_left.saturating_sub(1),
                    Some('\\') => {}
                    _ => {
                        h.new_line += 1;
                        h.new_left = h.new_left.saturating_sub(1);
                        h.old_left = h.old_left.saturating_sub(1);
                    }
                }
                continue;
            }

            if let Some(path) = line.strip_prefix("+++ ") {
                let path = path.split('\t').next().unwrap_or(path).trim();
                current = match path {
                    "/dev/null" => None,
                    _ => Some(normalize(Utf8Path::new(path.strip_prefix("b/").unwrap_or(path)))),
                };
            } else if let Some(header) = line.strip_prefix("@@ ") {
                hunk = Hunk::parse(header);
            }
        }
        covered
    }

    pub fn read_patch(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput {
                feature: "--use-patch-file",
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_patch(&fs::read_to_string(path)?))
    }

    /// Reads a `{"path/to/file.py": [1, 2, 5], ...}` coverage map.
    pub fn read_coverage_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput {
                feature: "--use-coverage",
                path: path.to_path_buf(),
            });
        }
        let raw: HashMap<Utf8PathBuf, Vec<usize>> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let mut covered = CoveredLines::default();
        for (file, lines) in raw {
            let file = normalize(&file);
            for line in lines {
                covered.insert(file.clone(), line);
            }
        }
        Ok(covered)
    }

    pub fn insert(&mut self, filename: Utf8PathBuf, line: usize) {
        self.by_file.entry(filename).or_default().insert(line);
    }

    pub fn lines(&self, filename: &Utf8Path) -> Option<&BTreeSet<usize>> {
        self.by_file.get(&normalize(filename))
    }
}

impl LineFilter for CoveredLines {
    fn is_of_interest(&self, filename: &Utf8Path, line: usize) -> bool {
        self.lines(filename).is_some_and(|lines| lines.contains(&line))
    }
}

struct Hunk {
    new_line: usize,
    new_left: usize,
    old_left: usize,
}

impl Hunk {
    /// Parses the part of `@@ -a,b +c,d @@` after the leading `@@ `.
    fn parse(header: &str) -> Option<Hunk> {
        let mut parts = header.split_whitespace();
        let (_, old_left) = parse_range(parts.next()?.strip_prefix('-')?)?;
        let (new_line, new_left) = parse_range(parts.next()?.strip_prefix('+')?)?;
        Some(Hunk {
            new_line,
            new_left,
            old_left,
        })
    }

    fn is_done(&self) -> bool {
        self.new_left == 0 && self.old_left == 0
    }
}

/// `start,count` or `start` (count 1).
fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = path;
    while let Ok(stripped) = normalized.strip_prefix(".") {
        normalized = stripped;
    }
    normalized.to_path_buf()
}
