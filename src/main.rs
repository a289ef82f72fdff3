use mutator::cache::ResultCache;
use mutator::commands;
use mutator::config::{self, Config};
use mutator::discovery::{self, SourceFilter};
use mutator::exclusion::{CoveredLines, ExclusionPolicy};
use mutator::operators::RuleTable;
use mutator::orchestrator::{self, EXIT_FATAL};
use mutator::output::{self, ConsoleReporter};
use mutator::parser::{Frontend, PythonFrontend};
use mutator::safety;
use mutator::walker::Mutator;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mutator", version, about = "Mutation testing with a persistent result cache")]
struct Cli {
    /// More logging (-v info, -vv debug). MUTATOR_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation testing, resuming from the cache
    Run(RunArgs),
    /// List cached mutants that were not killed
    Results {
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Show the diff of a mutant
    Show {
        /// Mutant id from `mutator results`
        id: u64,
        /// Comma separated extra names treated like `dict`
        #[arg(long, env = "MUTATOR_DICT_SYNONYMS", default_value = "")]
        dict_synonyms: String,
    },
    /// Write a mutant to disk
    Apply {
        /// Mutant id from `mutator results`
        id: u64,
        /// Don't keep a .bak copy of the original
        #[arg(long)]
        no_backup: bool,
        /// Comma separated extra names treated like `dict`
        #[arg(long, env = "MUTATOR_DICT_SYNONYMS", default_value = "")]
        dict_synonyms: String,
    },
    /// Put back a file left mutated by an interrupted run
    Restore {
        /// The mutated source file (not the .bak)
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Only test this mutant id
    id: Option<u64>,
    /// Comma separated files or directories to mutate
    #[arg(long, env = "MUTATOR_PATHS_TO_MUTATE", value_delimiter = ',')]
    paths_to_mutate: Vec<PathBuf>,
    /// Colon separated test directory patterns
    #[arg(long, env = "MUTATOR_TESTS_DIR", default_value = discovery::DEFAULT_TESTS_DIR)]
    tests_dir: String,
    /// Comma separated glob patterns of paths not to mutate
    #[arg(long, env = "MUTATOR_PATHS_TO_EXCLUDE", value_delimiter = ',')]
    paths_to_exclude: Vec<String>,
    /// Test command, run through the shell
    #[arg(long, env = "MUTATOR_RUNNER", default_value = config::DEFAULT_TEST_COMMAND)]
    runner: String,
    /// Only mutate lines listed in this JSON map of file -> covered lines
    #[arg(long, conflicts_with = "use_patch_file")]
    use_coverage: Option<PathBuf>,
    /// Only mutate lines added by this unified diff
    #[arg(long)]
    use_patch_file: Option<PathBuf>,
    /// Comma separated extra names treated like `dict`
    #[arg(long, env = "MUTATOR_DICT_SYNONYMS", default_value = "")]
    dict_synonyms: String,
    #[arg(long, env = "MUTATOR_TEST_TIME_MULTIPLIER", default_value_t = config::DEFAULT_TEST_TIME_MULTIPLIER)]
    test_time_multiplier: f64,
    /// Seconds added to every deadline
    #[arg(long, env = "MUTATOR_TEST_TIME_BASE", default_value_t = config::DEFAULT_TEST_TIME_BASE)]
    test_time_base: f64,
    #[arg(long, env = "MUTATOR_HARD_TIMEOUT_FACTOR", default_value_t = config::DEFAULT_HARD_TIMEOUT_FACTOR)]
    hard_timeout_factor: f64,
    /// Echo test output instead of hiding it
    #[arg(short = 's', long)]
    show_output: bool,
    /// Don't run tests, just report what the cache knows
    #[arg(long)]
    cache_only: bool,
    /// Time the clean test run again instead of using the cached time
    #[arg(long)]
    rerun_baseline: bool,
    /// Skip files that fail to parse instead of stopping
    #[arg(long)]
    keep_going: bool,
    /// Shell command run before each mutant is tested
    #[arg(long, env = "MUTATOR_PRE_MUTATION")]
    pre_mutation: Option<String>,
    /// Shell command run after each mutant is tested
    #[arg(long, env = "MUTATOR_POST_MUTATION")]
    post_mutation: Option<String>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("MUTATOR_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Results { json } => cmd_results(json),
        Commands::Show { id, dict_synonyms } => cmd_show(id, &dict_synonyms),
        Commands::Apply {
            id,
            no_backup,
            dict_synonyms,
        } => cmd_apply(id, !no_backup, &dict_synonyms),
        Commands::Restore { file } => cmd_restore(&file),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            EXIT_FATAL
        }
    };
    process::exit(exit_code);
}

fn split_synonyms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn open_cache() -> anyhow::Result<ResultCache> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(ResultCache::open(&cwd)?)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let paths_to_mutate = if args.paths_to_mutate.is_empty() {
        vec![discovery::guess_paths_to_mutate(&cwd)?]
    } else {
        args.paths_to_mutate.clone()
    };
    for path in &paths_to_mutate {
        if !path.exists() {
            bail!("path to mutate does not exist: {}", path.display());
        }
        if path.is_file() && mutator::frontend_for(path).is_none() {
            bail!("unsupported file type: {}. Supported: .py", path.display());
        }
    }

    let policy = if let Some(coverage) = &args.use_coverage {
        ExclusionPolicy::with_filter(CoveredLines::read_coverage_json(coverage)?)
    } else if let Some(patch) = &args.use_patch_file {
        ExclusionPolicy::with_filter(CoveredLines::read_patch(patch)?)
    } else {
        ExclusionPolicy::new()
    };

    let frontend = PythonFrontend;
    let tests_dirs = discovery::resolve_tests_dirs(&args.tests_dir, &paths_to_mutate);
    let filter = SourceFilter::new(&tests_dirs, &args.paths_to_exclude)?;
    let mut files: Vec<Utf8PathBuf> = Vec::new();
    for path in &paths_to_mutate {
        files.extend(discovery::source_files(path, frontend.extensions(), &filter)?);
    }
    safety::ensure_no_orphaned_backups(&files)?;

    let config = Config {
        test_command: args.runner.clone(),
        swallow_output: !args.show_output,
        cache_only: args.cache_only,
        test_time_base: args.test_time_base,
        test_time_multiplier: args.test_time_multiplier,
        hard_timeout_factor: args.hard_timeout_factor,
        pre_mutation: args.pre_mutation.clone(),
        post_mutation: args.post_mutation.clone(),
        dict_synonyms: split_synonyms(&args.dict_synonyms),
        tests_hash: discovery::hash_of_tests(&tests_dirs)?,
        keep_going: args.keep_going,
        project_dir: cwd.clone(),
    };

    let mut cache = ResultCache::open(&cwd)?;
    if args.rerun_baseline {
        cache.clear_baseline_time()?;
    }

    let rules = RuleTable::python(&config.dict_synonyms);
    let mutator = Mutator::new(&frontend, &rules, &policy);

    let mut mutations = commands::gen_mutations_by_file(&mutator, &mut cache, &files, config.keep_going)?;
    if let Some(id) = args.id {
        mutations = commands::mutations_from_cache(&cache, id)?;
    }

    output::print_legend(&config.test_command);
    let mut reporter = ConsoleReporter::new();
    let outcome = orchestrator::run(&config, &mutator, &mut cache, &mutations, &mut reporter);
    reporter.finish();

    output::print_summary(&outcome.tally);
    if let Some(error) = &outcome.error {
        output::print_error(&error.to_string());
    }
    Ok(outcome.exit_code())
}

fn cmd_results(json: bool) -> anyhow::Result<i32> {
    let cache = open_cache()?;
    let entries = cache.entries();
    if json {
        println!("{}", serde_json::to_string(&entries)?);
    } else if entries.is_empty() {
        output::print_success("No mutants in the cache. Run `mutator run` first.");
    } else {
        output::print_results(&entries);
    }
    Ok(0)
}

fn cmd_show(id: u64, dict_synonyms: &str) -> anyhow::Result<i32> {
    let mut cache = open_cache()?;
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&split_synonyms(dict_synonyms));
    let policy = ExclusionPolicy::new();
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let diff = commands::unified_diff(&mutator, &mut cache, id)?;
    output::print_diff(&diff);
    Ok(0)
}

fn cmd_apply(id: u64, backup: bool, dict_synonyms: &str) -> anyhow::Result<i32> {
    let mut cache = open_cache()?;
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&split_synonyms(dict_synonyms));
    let policy = ExclusionPolicy::new();
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let mutant = commands::apply_mutant(&mutator, &mut cache, id, backup)?;
    output::print_success(&format!("Applied mutant {id} to {}", mutant.filename));
    Ok(0)
}

fn cmd_restore(file: &Path) -> anyhow::Result<i32> {
    match safety::check_interrupted_run(file) {
        Some(backup) => {
            safety::restore_from_backup(file, &backup)?;
            output::print_success(&format!("Restored {} from {}", file.display(), backup.display()));
            Ok(0)
        }
        None => {
            output::print_error(&format!("No backup found for {}", file.display()));
            Ok(EXIT_FATAL)
        }
    }
}
