//! Test reporter - stream invocation results and the final summary

use crate::testing::invoker::{BuildMode, Outcome};
use crate::testing::recorder::{Counters, InvocationId, InvocationResult};
use colored::{Color, Colorize};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// JSON record for one invocation
#[derive(Debug, Serialize)]
pub struct InvocationRecord<'a> {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub id: InvocationId,
    pub file: String,
    pub mode: BuildMode,
    pub command: &'a str,
    pub outcome: &'static str,
    pub passed: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    pub output: &'a str,
}

impl<'a> From<&'a InvocationResult> for InvocationRecord<'a> {
    fn from(result: &'a InvocationResult) -> Self {
        Self {
            record_type: "invocation",
            id: result.id,
            file: result.file.display().to_string(),
            mode: result.mode,
            command: &result.command,
            outcome: result.outcome.kind(),
            passed: result.outcome.is_pass(),
            exit_code: result.outcome.exit_code(),
            duration_ms: result.duration.as_millis(),
            output: result.outcome.output(),
        }
    }
}

/// JSON record for the end-of-run summary
#[derive(Debug, Serialize)]
pub struct SummaryRecord {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub elapsed_secs: u64,
    pub success: bool,
}

impl SummaryRecord {
    pub fn new(counters: Counters, elapsed: Duration) -> Self {
        Self {
            record_type: "summary",
            total: counters.total,
            passed: counters.passed,
            failed: counters.failed,
            elapsed_secs: rounded_secs(elapsed),
            success: counters.success(),
        }
    }
}

/// Wall-clock seconds rounded to the nearest whole second
pub fn rounded_secs(elapsed: Duration) -> u64 {
    elapsed.as_secs_f64().round() as u64
}

/// Test reporter with output configuration
#[derive(Debug, Clone, Default)]
pub struct TestReporter {
    /// Show captured output for passing invocations too
    verbose: bool,
    /// Disable colored output
    no_color: bool,
    format: OutputFormat,
}

impl TestReporter {
    /// Create a new test reporter
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
            format: OutputFormat::Human,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Report one invocation as soon as it is classified
    pub fn report_invocation<W: Write>(
        &self,
        out: &mut W,
        result: &InvocationResult,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let record = InvocationRecord::from(result);
                serde_json::to_writer(&mut *out, &record)?;
                writeln!(out)?;
            }
            OutputFormat::Human => self.print_invocation(out, result)?,
        }
        out.flush()
    }

    /// Report the totals once every invocation has completed
    pub fn report_summary<W: Write>(
        &self,
        out: &mut W,
        counters: Counters,
        elapsed: Duration,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &SummaryRecord::new(counters, elapsed))?;
                writeln!(out)?;
            }
            OutputFormat::Human => self.print_summary(out, counters, elapsed)?,
        }
        out.flush()
    }

    fn print_invocation<W: Write>(&self, out: &mut W, result: &InvocationResult) -> io::Result<()> {
        match &result.outcome {
            Outcome::Passed { output } => {
                writeln!(
                    out,
                    "Test #{} {}: {}",
                    result.id,
                    self.paint("passed", Color::Green),
                    result.command
                )?;
                if self.verbose {
                    write_block(out, output)?;
                }
            }
            Outcome::Failed { code, output } => {
                writeln!(
                    out,
                    "Test #{} {}: {}",
                    result.id,
                    self.paint("failed", Color::Red),
                    result.command
                )?;
                write_block(out, output)?;
                match code {
                    Some(code) => writeln!(out, "{}", self.dim(&format!("exit status: {}", code)))?,
                    None => writeln!(out, "{}", self.dim("terminated by signal"))?,
                }
            }
            Outcome::TimedOut { after, output } => {
                writeln!(
                    out,
                    "Test #{} {} after {:.2?}: {}",
                    result.id,
                    self.paint("timed out", Color::Yellow),
                    after,
                    result.command
                )?;
                write_block(out, output)?;
            }
            Outcome::SpawnFailed { error } => {
                writeln!(
                    out,
                    "Test #{} {}: {}",
                    result.id,
                    self.paint("failed", Color::Red),
                    result.command
                )?;
                write_block(out, error)?;
            }
        }
        Ok(())
    }

    fn print_summary<W: Write>(
        &self,
        out: &mut W,
        counters: Counters,
        elapsed: Duration,
    ) -> io::Result<()> {
        let failed = if counters.failed > 0 {
            self.paint(&counters.failed.to_string(), Color::Red)
        } else {
            counters.failed.to_string()
        };

        writeln!(out)?;
        writeln!(out, "Test report:")?;
        writeln!(out, "Total tests: {}", counters.total)?;
        writeln!(out, "Passed tests: {}", counters.passed)?;
        writeln!(out, "Failed tests: {}", failed)?;
        writeln!(out, "Time elapsed: {} seconds", rounded_secs(elapsed))?;
        Ok(())
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.color(color).bold().to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }
}

fn write_block<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    let text = text.trim_end();
    if !text.is_empty() {
        writeln!(out, "{}", text)?;
    }
    Ok(())
}
