use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use conform_config::{Config, ConfigLoader};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod commands;
mod config;
mod testing;

/// Corpus conformance harness for compiler binaries.
///
/// Runs the subject binary on every corpus file twice, once as-is and once
/// with the optimization flag, and counts passes by exit status.
///
/// EXAMPLES:
///     conform run                          Run the whole corpus
///     conform run loops                    Only files whose name contains "loops"
///     conform run --subject build/pcc      Use another compiler binary
///     conform run --timeout 30             Kill invocations after 30 seconds
///     conform list                         Show which files would run
///
/// ENVIRONMENT VARIABLES:
///     CONFORM_CORPUS_DIR  Corpus directory (default: impl/test)
///     CONFORM_SUFFIX      Corpus file suffix (default: .pf)
///     CONFORM_SUBJECT     Subject binary (default: target/pcc)
///     CONFORM_TIMEOUT     Per-invocation deadline in seconds, 0 disables
///     CONFORM_JSON        Set to '1' for JSON output by default
///     NO_COLOR            Set to disable colored output
///     RUST_LOG            Diagnostic log filter (default: warn)
#[derive(Parser)]
#[command(name = "conform")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to conform.toml (default: searched upwards from the current directory)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the subject binary over the corpus
    ///
    /// Every matching file is compiled twice: with the verbose flag only,
    /// then with the optimization flag added. Each invocation is reported as
    /// soon as it finishes. Exits with status 1 if any invocation failed.
    ///
    /// EXAMPLES:
    ///     conform run                             Run everything
    ///     conform run arith --verbose             Filter and show all output
    ///     conform run --dir=cases --suffix=.src   Another corpus layout
    ///     conform run --json > results.jsonl      Machine-readable output
    ///     conform run --results-log run.jsonl     Keep a log that survives interruption
    #[command(visible_alias = "r")]
    Run {
        /// Only run files whose name contains this pattern
        pattern: Option<String>,
        /// Corpus directory
        #[arg(long, short = 'd', value_parser = non_empty_path)]
        dir: Option<PathBuf>,
        /// Corpus file name suffix
        #[arg(long, short = 's', value_parser = NonEmptyStringValueParser::new())]
        suffix: Option<String>,
        /// Subject binary to invoke
        #[arg(long, value_parser = non_empty_path)]
        subject: Option<PathBuf>,
        /// Per-invocation deadline in seconds (0 disables)
        #[arg(long, short = 't', value_name = "SECS")]
        timeout: Option<u64>,
        /// Show captured output for passing invocations too
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
        /// Output one JSON object per invocation plus a summary
        #[arg(long)]
        json: bool,
        /// Append each result to this file as JSON lines
        #[arg(long, value_name = "FILE")]
        results_log: Option<PathBuf>,
    },

    /// List the corpus files a run would use
    ///
    /// EXAMPLES:
    ///     conform list                 List the default corpus
    ///     conform list --dir=cases     List another directory
    #[command(visible_alias = "l")]
    List {
        /// Only list files whose name contains this pattern
        pattern: Option<String>,
        /// Corpus directory
        #[arg(long, short = 'd', value_parser = non_empty_path)]
        dir: Option<PathBuf>,
        /// Corpus file name suffix
        #[arg(long, short = 's', value_parser = NonEmptyStringValueParser::new())]
        suffix: Option<String>,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     conform completions bash > ~/.bash_completions/conform.bash
    ///     conform completions zsh > ~/.zfunc/_conform
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    // Diagnostics go to stderr so they never mix with report lines
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let cli = Cli::parse();
    let cli_config = config::CliConfig::from_env();

    match cli.command {
        Commands::Run {
            pattern,
            dir,
            suffix,
            subject,
            timeout,
            verbose,
            no_color,
            json,
            results_log,
        } => {
            let harness = load_config(cli.config.as_deref())?;
            let mut args = commands::run::RunArgs::from_config(&harness);

            // Command-line flags override config file and environment
            args.pattern = pattern;
            if let Some(dir) = dir {
                args.dir = dir;
            }
            if let Some(suffix) = suffix {
                args.suffix = suffix;
            }
            if let Some(subject) = subject {
                args.subject = subject;
            }
            if let Some(secs) = timeout {
                args.timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            args.verbose = verbose;
            args.no_color = no_color || cli_config.no_color;
            args.json = json || cli_config.default_json;
            args.results_log = results_log;

            if args.no_color {
                colored::control::set_override(false);
            }

            let summary = commands::run::run(&args)?;
            tracing::debug!(elapsed = ?summary.elapsed, success = summary.success(), "harness finished");
            if !summary.success() {
                std::process::exit(1);
            }
        }
        Commands::List {
            pattern,
            dir,
            suffix,
        } => {
            let harness = load_config(cli.config.as_deref())?;
            let args = commands::list::ListArgs {
                dir: dir.unwrap_or_else(|| harness.corpus_dir()),
                suffix: suffix.unwrap_or_else(|| harness.suffix().to_string()),
                pattern,
            };
            commands::list::run(&args)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn non_empty_path(value: &str) -> Result<PathBuf, String> {
    if value.trim().is_empty() {
        Err("path must not be empty".to_string())
    } else {
        Ok(PathBuf::from(value))
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let loader = ConfigLoader::new();
    let config = match path {
        Some(path) => loader.load_from_file(path),
        None => loader.load_from_directory(&std::env::current_dir()?),
    };
    config.context("Failed to load configuration")
}
