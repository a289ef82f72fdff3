pub mod cache;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exclusion;
pub mod mutants;
pub mod operators;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod runner;
pub mod safety;
pub mod tree;
pub mod walker;

pub use error::{Error, Result};
pub use mutants::{Mutant, MutantStatus, MutationId};
pub use walker::Mutator;

use std::path::Path;

use parser::{Frontend, PythonFrontend};

/// The grammar handling files with this extension, if any.
pub fn frontend_for(path: &Path) -> Option<&'static dyn Frontend> {
    static PYTHON: PythonFrontend = PythonFrontend;
    let extension = path.extension()?.to_str()?;
    PYTHON.extensions().contains(&extension).then_some(&PYTHON as &dyn Frontend)
}
