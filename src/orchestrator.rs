use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mutants::{MutantStatus, MutationId};
use crate::runner::{self, TestRunner};
use crate::walker::Mutator;

pub const EXIT_FATAL: i32 = 1;
pub const EXIT_SURVIVED: i32 = 2;
pub const EXIT_TIMEOUT: i32 = 4;
pub const EXIT_SUSPICIOUS: i32 = 8;

/// The mutants of one file, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMutations {
    pub filename: camino::Utf8PathBuf,
    pub ids: Vec<MutationId>,
}

/// Running counts, owned by the orchestrator loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub progress: usize,
    pub killed: usize,
    pub timeout: usize,
    pub suspicious: usize,
    pub survived: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, status: MutantStatus) {
        match status {
            MutantStatus::OkKilled => self.killed += 1,
            MutantStatus::BadTimeout => self.timeout += 1,
            MutantStatus::OkSuspicious => self.suspicious += 1,
            MutantStatus::BadSurvived => self.survived += 1,
            MutantStatus::Untested => self.skipped += 1,
        }
        self.progress += 1;
    }
}

/// Bitmask of what went wrong, so callers can test for each category.
pub fn compute_exit_code(tally: &Tally, fatal: bool) -> i32 {
    let mut code = 0;
    if fatal {
        code |= EXIT_FATAL;
    }
    if tally.survived > 0 {
        code |= EXIT_SURVIVED;
    }
    if tally.timeout > 0 {
        code |= EXIT_TIMEOUT;
    }
    if tally.suspicious > 0 {
        code |= EXIT_SUSPICIOUS;
    }
    code
}

/// Receives progress from the run loop.
pub trait Reporter {
    fn progress(&mut self, _tally: &Tally) {}

    fn mutant_done(&mut self, _filename: &Utf8Path, _id: &MutationId, _status: MutantStatus) {}

    /// Output of the clean run and of hooks.
    fn output(&mut self, _line: &str) {}
}

/// Reports nothing.
pub struct Silent;

impl Reporter for Silent {}

#[derive(Debug)]
pub struct RunOutcome {
    pub tally: Tally,
    pub error: Option<Error>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        compute_exit_code(&self.tally, self.error.is_some())
    }
}

/// Classifies one finished test run.
///
/// Any failure to run the suite counts as a timeout. A run that finished
/// but took longer than `threshold` is suspicious whether or not it passed.
pub fn classify(outcome: &Result<bool>, elapsed: Duration, threshold: Duration) -> MutantStatus {
    match outcome {
        Err(_) => MutantStatus::BadTimeout,
        Ok(_) if elapsed > threshold => MutantStatus::OkSuspicious,
        Ok(true) => MutantStatus::BadSurvived,
        Ok(false) => MutantStatus::OkKilled,
    }
}

/// Times the unmutated suite, or reuses the time stored in the cache. A red
/// suite aborts the run.
pub fn time_test_suite(
    config: &Config,
    cache: &mut ResultCache,
    reporter: &mut dyn Reporter,
) -> Result<Duration> {
    if let Some(seconds) = cache.baseline_time() {
        info!("using cached time for baseline tests: {seconds:.3}s");
        return Ok(Duration::from_secs_f64(seconds.max(0.0)));
    }

    let runner = config.test_runner();
    let mut output = Vec::new();
    let start = Instant::now();
    let passed = runner.baseline_passes(|line| {
        output.push(line.to_string());
        reporter.output(line);
    })?;
    let elapsed = start.elapsed();

    if !passed {
        return Err(Error::RedBaseline {
            command: config.test_command.clone(),
            output: output.join("\n"),
        });
    }
    info!("baseline tests took {:.3}s", elapsed.as_secs_f64());
    if runner.incremental {
        runner::snapshot_incremental_data(&config.project_dir)?;
    }
    cache.set_baseline_time(elapsed.as_secs_f64())?;
    Ok(elapsed)
}

/// Tests every mutant in order, consulting and updating the cache.
pub struct Orchestrator<'a> {
    config: &'a Config,
    mutator: &'a Mutator<'a>,
    cache: &'a mut ResultCache,
    reporter: &'a mut dyn Reporter,
    runner: TestRunner,
    baseline: Duration,
    tally: Tally,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        mutator: &'a Mutator<'a>,
        cache: &'a mut ResultCache,
        reporter: &'a mut dyn Reporter,
        baseline: Duration,
    ) -> Self {
        Orchestrator {
            runner: config.test_runner(),
            config,
            mutator,
            cache,
            reporter,
            baseline,
            tally: Tally::default(),
        }
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn run_mutation_tests(&mut self, mutations: &[FileMutations]) -> Result<()> {
        self.tally.total = mutations.iter().map(|f| f.ids.len()).sum();
        self.reporter.progress(&self.tally);

        for file in mutations {
            let mut source: Option<String> = None;
            for id in &file.ids {
                let status = self.run_mutation(&file.filename, id, &mut source)?;
                self.tally.record(status);
                self.reporter.mutant_done(&file.filename, id, status);
                self.reporter.progress(&self.tally);
            }
        }
        Ok(())
    }

    /// Tests one mutant unless the cache already knows the answer.
    pub fn run_mutation(
        &mut self,
        filename: &Utf8Path,
        id: &MutationId,
        source: &mut Option<String>,
    ) -> Result<MutantStatus> {
        let config = self.config;
        let cached = self.cache.cached_status(filename, id, &config.tests_hash);
        if cached != MutantStatus::Untested {
            debug!("{filename} {id}: cached {cached}");
            return Ok(cached);
        }
        if config.cache_only {
            return Ok(MutantStatus::Untested);
        }

        if source.is_none() {
            *source = Some(std::fs::read_to_string(filename)?);
        }
        let source = source.as_deref().unwrap_or_default();
        let mut mutant = self
            .mutator
            .mutant(filename, source, id)?
            .ok_or_else(|| Error::MutantNotFound {
                filename: filename.to_path_buf(),
                id: id.clone(),
            })?;

        if let Some(hook) = &config.pre_mutation {
            self.echo(runner::run_hook(hook));
        }

        mutant.apply()?;
        let start = Instant::now();
        let outcome = self
            .runner
            .tests_pass(Some(config.kill_timeout(self.baseline)), |_| {});
        let elapsed = start.elapsed();
        let reverted = mutant.revert();

        if let Some(hook) = &config.post_mutation {
            self.echo(runner::run_hook(hook));
        }
        reverted?;

        if let Err(e) = &outcome {
            if !matches!(e, Error::Timeout { .. }) {
                warn!("running tests for {filename} {id} failed: {e}");
            }
        }
        let status = classify(&outcome, elapsed, config.suspicious_threshold(self.baseline));
        mutant.status = status;
        self.cache.set_status(filename, id, status, &config.tests_hash)?;
        Ok(status)
    }

    fn echo(&mut self, output: String) {
        for line in output.lines() {
            self.reporter.output(line);
        }
    }
}

/// Times the suite, then tests every mutant. Fatal errors end the run but
/// keep the counts gathered so far.
pub fn run(
    config: &Config,
    mutator: &Mutator<'_>,
    cache: &mut ResultCache,
    mutations: &[FileMutations],
    reporter: &mut dyn Reporter,
) -> RunOutcome {
    let baseline = if config.cache_only {
        Duration::ZERO
    } else {
        match time_test_suite(config, cache, reporter) {
            Ok(baseline) => baseline,
            Err(error) => {
                return RunOutcome {
                    tally: Tally::default(),
                    error: Some(error),
                };
            }
        }
    };

    let mut orchestrator = Orchestrator::new(config, mutator, cache, reporter, baseline);
    let result = orchestrator.run_mutation_tests(mutations);
    RunOutcome {
        tally: *orchestrator.tally(),
        error: result.err(),
    }
}
