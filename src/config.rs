use std::path::PathBuf;
use std::time::Duration;

use crate::runner::TestRunner;

pub const DEFAULT_TEST_COMMAND: &str = "python -m pytest -x";
pub const DEFAULT_TEST_TIME_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_TEST_TIME_BASE: f64 = 0.0;
pub const DEFAULT_HARD_TIMEOUT_FACTOR: f64 = 10.0;

/// Settings for one mutation run. Built once from the command line and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub test_command: String,
    pub swallow_output: bool,
    pub cache_only: bool,
    /// Extra seconds granted on top of the scaled baseline.
    pub test_time_base: f64,
    /// A mutant whose run takes longer than `base + baseline * multiplier`
    /// is suspicious.
    pub test_time_multiplier: f64,
    /// The run is killed after `base + baseline * hard_timeout_factor`.
    pub hard_timeout_factor: f64,
    pub pre_mutation: Option<String>,
    pub post_mutation: Option<String>,
    pub dict_synonyms: Vec<String>,
    /// Hash of the test suite the results are validated against.
    pub tests_hash: String,
    /// Carry on with the other files when one fails to parse.
    pub keep_going: bool,
    /// Directory holding testmon's data files.
    pub project_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test_command: DEFAULT_TEST_COMMAND.to_string(),
            swallow_output: true,
            cache_only: false,
            test_time_base: DEFAULT_TEST_TIME_BASE,
            test_time_multiplier: DEFAULT_TEST_TIME_MULTIPLIER,
            hard_timeout_factor: DEFAULT_HARD_TIMEOUT_FACTOR,
            pre_mutation: None,
            post_mutation: None,
            dict_synonyms: Vec::new(),
            tests_hash: String::new(),
            keep_going: false,
            project_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// testmon selects tests incrementally; "nothing selected" is a pass.
    pub fn incremental(&self) -> bool {
        self.test_command.contains("--testmon")
    }

    pub fn suspicious_threshold(&self, baseline: Duration) -> Duration {
        secs(self.test_time_base + baseline.as_secs_f64() * self.test_time_multiplier)
    }

    pub fn test_runner(&self) -> TestRunner {
        TestRunner::new(&self.test_command, self.swallow_output).with_data_dir(&self.project_dir)
    }

    pub fn kill_timeout(&self, baseline: Duration) -> Duration {
        secs(self.test_time_base + baseline.as_secs_f64() * self.hard_timeout_factor)
    }
}

fn secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}
