//! Run command - drive the subject binary over the corpus

use crate::testing::{
    BuildMode, Counters, InvocationResult, Invoker, OutputFormat, Recorder, ResultsLog,
    TestReporter, TestSuite,
};
use anyhow::{Context, Result};
use colored::*;
use conform_config::Config;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Arguments for the run command
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Only run corpus files whose name contains this pattern
    pub pattern: Option<String>,
    /// Corpus directory
    pub dir: PathBuf,
    /// File name suffix selecting corpus inputs
    pub suffix: String,
    /// Subject binary
    pub subject: PathBuf,
    pub verbose_flag: String,
    pub optimize_flag: String,
    /// Per-invocation deadline
    pub timeout: Option<Duration>,
    /// Show output of passing invocations too
    pub verbose: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Output in JSON format
    pub json: bool,
    /// Append every result to this file as it completes
    pub results_log: Option<PathBuf>,
}

impl RunArgs {
    /// Arguments taken entirely from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            pattern: None,
            dir: config.corpus_dir(),
            suffix: config.suffix().to_string(),
            subject: config.binary(),
            verbose_flag: config.verbose_flag().to_string(),
            optimize_flag: config.optimize_flag().to_string(),
            timeout: config.timeout(),
            verbose: false,
            no_color: false,
            json: false,
            results_log: None,
        }
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self::from_config(&Config::defaults())
    }
}

/// Final state of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub counters: Counters,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the harness should exit successfully
    pub fn success(&self) -> bool {
        self.counters.success()
    }
}

/// Run the harness, reporting to stdout
pub fn run(args: &RunArgs) -> Result<RunSummary> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

/// Run the harness, reporting to `out`
///
/// Discovery errors abort before any invocation. Invocation failures are
/// recorded and never stop the loop.
pub fn run_with_output<W: Write>(args: &RunArgs, out: &mut W) -> Result<RunSummary> {
    let start = Instant::now();

    let mut suite = TestSuite::discover(&args.dir, &args.suffix)
        .with_context(|| format!("Cannot discover tests in {}", args.dir.display()))?;

    if let Some(pattern) = &args.pattern {
        suite = suite.filter(pattern);
    }

    let mut log = args
        .results_log
        .as_deref()
        .map(ResultsLog::open)
        .transpose()
        .context("Cannot open results log")?;

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    if format == OutputFormat::Human {
        print_header(out, args, &suite)?;
    }

    let invoker = Invoker::new(&args.subject)
        .with_verbose_flag(&args.verbose_flag)
        .with_optimize_flag(&args.optimize_flag)
        .with_timeout(args.timeout);
    let reporter = TestReporter::new(args.verbose)
        .with_no_color(args.no_color)
        .with_format(format);
    let mut recorder = Recorder::new();

    for case in &suite.cases {
        for mode in BuildMode::ALL {
            let id = recorder.begin();
            let execution = invoker.invoke(case, mode);
            recorder.record(&execution.outcome);

            let result = InvocationResult::new(id, case.file.clone(), mode, execution);
            reporter.report_invocation(out, &result)?;

            if let Some(log) = log.as_mut() {
                log.append_invocation(&result)
                    .with_context(|| format!("Cannot write to {}", log.path().display()))?;
            }
        }
    }

    let counters = recorder.counters();
    let elapsed = start.elapsed();

    reporter.report_summary(out, counters, elapsed)?;
    if let Some(log) = log.as_mut() {
        log.append_summary(counters, elapsed)
            .with_context(|| format!("Cannot write to {}", log.path().display()))?;
    }

    info!(
        total = counters.total,
        passed = counters.passed,
        failed = counters.failed,
        "run complete"
    );

    Ok(RunSummary { counters, elapsed })
}

fn print_header<W: Write>(out: &mut W, args: &RunArgs, suite: &TestSuite) -> io::Result<()> {
    if suite.is_empty() {
        let msg = format!(
            "No '{}' files found in {}",
            args.suffix,
            args.dir.display()
        );
        let msg = if args.no_color {
            msg
        } else {
            msg.yellow().to_string()
        };
        return writeln!(out, "{}", msg);
    }

    writeln!(
        out,
        "Found {} test file{} ({} invocations)",
        suite.len(),
        if suite.len() == 1 { "" } else { "s" },
        suite.len() * BuildMode::ALL.len()
    )?;
    writeln!(out)
}
