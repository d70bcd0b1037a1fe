//! Invoker - run the subject binary against one corpus input

use crate::testing::discovery::TestCase;
use serde::Serialize;
use std::io::{self, PipeReader, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long output may keep arriving once the subject itself is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Build mode a corpus input is compiled under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// No optimization flag
    Default,
    /// Optimization flag appended
    Optimized,
}

impl BuildMode {
    /// Every mode, in the order a case runs them
    pub const ALL: [BuildMode; 2] = [BuildMode::Default, BuildMode::Optimized];

    pub fn is_optimized(self) -> bool {
        matches!(self, BuildMode::Optimized)
    }

    pub fn label(self) -> &'static str {
        match self {
            BuildMode::Default => "default",
            BuildMode::Optimized => "optimized",
        }
    }
}

/// How a single invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit status 0
    Passed { output: String },
    /// Nonzero exit, or killed by a signal (`code` is `None`)
    Failed { code: Option<i32>, output: String },
    /// Deadline expired; the child was killed
    TimedOut { after: Duration, output: String },
    /// The process could not be launched
    SpawnFailed { error: String },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed { .. })
    }

    /// Captured output, or the launch error when there is none
    pub fn output(&self) -> &str {
        match self {
            Outcome::Passed { output }
            | Outcome::Failed { output, .. }
            | Outcome::TimedOut { output, .. } => output,
            Outcome::SpawnFailed { error } => error,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Outcome::Passed { .. } => Some(0),
            Outcome::Failed { code, .. } => *code,
            Outcome::TimedOut { .. } | Outcome::SpawnFailed { .. } => None,
        }
    }

    /// Stable machine-readable name of the outcome
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Passed { .. } => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::TimedOut { .. } => "timed_out",
            Outcome::SpawnFailed { .. } => "spawn_failed",
        }
    }
}

/// What the invoker observed for one (file, mode) pair
#[derive(Debug, Clone)]
pub struct Execution {
    /// Shell-style rendering of the command that was run
    pub command: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Spawns the subject binary; holds no counters and no shared state
#[derive(Debug, Clone)]
pub struct Invoker {
    subject: PathBuf,
    verbose_flag: String,
    optimize_flag: String,
    timeout: Option<Duration>,
}

enum Waited {
    Exited(ExitStatus),
    Expired,
}

impl Invoker {
    /// Create an invoker with the default `-v` / `-O` flags and no deadline
    pub fn new(subject: impl Into<PathBuf>) -> Self {
        Self {
            subject: subject.into(),
            verbose_flag: "-v".to_string(),
            optimize_flag: "-O".to_string(),
            timeout: None,
        }
    }

    /// Set the per-invocation deadline (`None` waits forever)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose_flag(mut self, flag: impl Into<String>) -> Self {
        self.verbose_flag = flag.into();
        self
    }

    pub fn with_optimize_flag(mut self, flag: impl Into<String>) -> Self {
        self.optimize_flag = flag.into();
        self
    }

    /// Arguments passed after the program name
    pub fn args(&self, case: &TestCase, mode: BuildMode) -> Vec<String> {
        let mut args = vec![
            case.file.display().to_string(),
            self.verbose_flag.clone(),
        ];
        if mode.is_optimized() {
            args.push(self.optimize_flag.clone());
        }
        args
    }

    /// Render the command as `<binary> "<file>" -v [-O]`
    pub fn command_line(&self, case: &TestCase, mode: BuildMode) -> String {
        let mut cmd = format!(
            "{} \"{}\" {}",
            self.subject.display(),
            case.file.display(),
            self.verbose_flag
        );
        if mode.is_optimized() {
            cmd.push(' ');
            cmd.push_str(&self.optimize_flag);
        }
        cmd
    }

    /// Run the subject once and block until it exits or the deadline expires
    pub fn invoke(&self, case: &TestCase, mode: BuildMode) -> Execution {
        let command = self.command_line(case, mode);
        let start = Instant::now();

        debug!(command = %command, mode = mode.label(), "spawning subject");

        let outcome = match self.spawn(case, mode) {
            Ok((child, reader)) => self.wait(child, drain(reader), start),
            Err(e) => {
                debug!(error = %e, "subject failed to launch");
                Outcome::SpawnFailed {
                    error: format!("failed to launch {}: {}", self.subject.display(), e),
                }
            }
        };

        Execution {
            command,
            outcome,
            duration: start.elapsed(),
        }
    }

    /// Spawn the subject with stdout and stderr sharing one pipe
    fn spawn(&self, case: &TestCase, mode: BuildMode) -> io::Result<(Child, PipeReader)> {
        let (reader, writer) = io::pipe()?;

        let mut cmd = Command::new(&self.subject);
        cmd.args(self.args(case, mode))
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        // Our copies of the write end must close, or the reader never sees EOF
        drop(cmd);
        Ok((child, reader))
    }

    fn wait(&self, mut child: Child, output: Drain, start: Instant) -> Outcome {
        let waited = match self.timeout {
            Some(timeout) => wait_with_deadline(&mut child, timeout),
            None => child.wait().map(Waited::Exited),
        };

        // Anything still holding the pipe after the subject is gone gets the
        // rest of the deadline, then the process group is killed.
        let limit = match (&waited, self.timeout) {
            (Ok(Waited::Exited(_)), Some(timeout)) => {
                Some(timeout.saturating_sub(start.elapsed()) + DRAIN_GRACE)
            }
            (Ok(Waited::Exited(_)), None) => None,
            _ => Some(DRAIN_GRACE),
        };
        let (mut output, complete) = output.collect(limit);
        if !complete {
            warn!(pid = child.id(), "subject left processes holding its output, killing");
            kill_group(&mut child);
        }

        match waited {
            Ok(Waited::Exited(status)) if status.success() => Outcome::Passed { output },
            Ok(Waited::Exited(status)) => Outcome::Failed {
                code: status.code(),
                output,
            },
            Ok(Waited::Expired) => Outcome::TimedOut {
                after: self.timeout.unwrap_or_default(),
                output,
            },
            Err(e) => {
                output.push_str(&format!("failed to wait for subject: {}", e));
                Outcome::Failed { code: None, output }
            }
        }
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Waited> {
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }

        if started.elapsed() >= timeout {
            warn!(pid = child.id(), ?timeout, "subject exceeded deadline, killing");
            kill_group(child);
            child.wait()?;
            return Ok(Waited::Expired);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the subject and every process it started in its group
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The subject leads its own group, so its pid is the group id
    let ret = unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL) };
    if ret == -1 {
        let e = io::Error::last_os_error();
        debug!(error = %e, "failed to signal process group");
        if let Err(e) = child.kill() {
            debug!(error = %e, "failed to kill subject");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "failed to kill subject");
    }
}

/// Output read so far, plus a signal once the pipe hits EOF
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl Drain {
    /// Wait up to `limit` for EOF; returns the text and whether EOF was seen
    fn collect(self, limit: Option<Duration>) -> (String, bool) {
        let complete = match limit {
            Some(limit) => self.done.recv_timeout(limit).is_ok(),
            None => self.done.recv().is_ok(),
        };
        let bytes = match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        (String::from_utf8_lossy(&bytes).into_owned(), complete)
    }
}

// Drained on its own thread so a chatty child cannot block on a full pipe
// while we wait on it.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Drain {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buf);

    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(0) | Err(_) => break,
                Ok(n) => match sink.lock() {
                    Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                },
            }
        }
        let _ = tx.send(());
    });

    Drain { buf, done }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    // Corpus files are shell scripts and the subject is `sh`, so the command
    // `sh "<file>" -v [-O]` runs the script with the flags as arguments.
    fn script(content: &str) -> (TempDir, TestCase) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case.pf");
        fs::write(&path, content).unwrap();
        (dir, TestCase::new(path))
    }

    #[test]
    fn test_command_line_default_mode() {
        let invoker = Invoker::new("target/pcc");
        let case = TestCase::new("impl/test/a.pf");

        assert_eq!(
            invoker.command_line(&case, BuildMode::Default),
            "target/pcc \"impl/test/a.pf\" -v"
        );
        assert_eq!(
            invoker.args(&case, BuildMode::Default),
            vec!["impl/test/a.pf", "-v"]
        );
    }

    #[test]
    fn test_command_line_optimized_mode() {
        let invoker = Invoker::new("target/pcc");
        let case = TestCase::new("impl/test/a.pf");

        assert_eq!(
            invoker.command_line(&case, BuildMode::Optimized),
            "target/pcc \"impl/test/a.pf\" -v -O"
        );
        assert_eq!(
            invoker.args(&case, BuildMode::Optimized),
            vec!["impl/test/a.pf", "-v", "-O"]
        );
    }

    #[test]
    fn test_custom_flags() {
        let invoker = Invoker::new("pcc")
            .with_verbose_flag("--verbose")
            .with_optimize_flag("--release");
        let case = TestCase::new("x.pf");

        assert_eq!(
            invoker.command_line(&case, BuildMode::Optimized),
            "pcc \"x.pf\" --verbose --release"
        );
    }

    #[test]
    fn test_invoke_pass_keeps_output() {
        let (_dir, case) = script("echo compiled ok\nexit 0\n");

        let execution = Invoker::new("sh").invoke(&case, BuildMode::Default);

        assert!(execution.outcome.is_pass());
        assert!(execution.outcome.output().contains("compiled ok"));
        assert_eq!(execution.outcome.exit_code(), Some(0));
    }

    #[test]
    fn test_invoke_nonzero_exit_fails_with_merged_output() {
        let (_dir, case) = script("echo on stdout\necho on stderr >&2\nexit 3\n");

        let execution = Invoker::new("sh").invoke(&case, BuildMode::Default);

        match &execution.outcome {
            Outcome::Failed { code, output } => {
                assert_eq!(*code, Some(3));
                assert!(output.contains("on stdout"));
                assert!(output.contains("on stderr"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_invoke_passes_flags_to_subject() {
        // Fails unless the optimize flag arrives as the second argument
        let (_dir, case) = script("[ \"$1\" = \"-v\" ] && [ \"$2\" = \"-O\" ]\n");

        let invoker = Invoker::new("sh");
        assert!(invoker.invoke(&case, BuildMode::Optimized).outcome.is_pass());
        assert!(!invoker.invoke(&case, BuildMode::Default).outcome.is_pass());
    }

    #[test]
    fn test_invoke_missing_binary_is_spawn_failure() {
        let case = TestCase::new("whatever.pf");

        let execution =
            Invoker::new("/nonexistent/bin/pcc").invoke(&case, BuildMode::Default);

        match &execution.outcome {
            Outcome::SpawnFailed { error } => {
                assert!(error.contains("failed to launch /nonexistent/bin/pcc"));
            }
            other => panic!("expected SpawnFailed, got {:?}", other),
        }
        assert!(!execution.outcome.is_pass());
        assert!(!execution.outcome.output().is_empty());
    }

    #[test]
    fn test_invoke_times_out() {
        let (_dir, case) = script("echo started\nexec sleep 5\n");

        let invoker = Invoker::new("sh").with_timeout(Some(Duration::from_millis(200)));
        let execution = invoker.invoke(&case, BuildMode::Default);

        match &execution.outcome {
            Outcome::TimedOut { after, output } => {
                assert_eq!(*after, Duration::from_millis(200));
                assert!(output.contains("started"));
            }
            other => panic!("expected TimedOut, got {:?}", other),
        }
        assert!(execution.duration < Duration::from_secs(5));
        assert_eq!(execution.outcome.kind(), "timed_out");
    }

    #[test]
    fn test_deadline_kills_processes_started_by_subject() {
        // `sleep` runs as a child of `sh` and inherits its output
        let (_dir, case) = script("echo started\nsleep 30\necho unreachable\n");

        let invoker = Invoker::new("sh").with_timeout(Some(Duration::from_millis(200)));
        let execution = invoker.invoke(&case, BuildMode::Default);

        assert_eq!(execution.outcome.kind(), "timed_out");
        assert!(execution.outcome.output().contains("started"));
        assert!(!execution.outcome.output().contains("unreachable"));
        assert!(
            execution.duration < Duration::from_secs(3),
            "invoke blocked for {:?}",
            execution.duration
        );
    }

    #[test]
    fn test_background_process_cannot_outlive_deadline() {
        // The subject exits at once but leaves a process holding its output
        let (_dir, case) = script("echo done\nsleep 30 &\nexit 0\n");

        let invoker = Invoker::new("sh").with_timeout(Some(Duration::from_millis(300)));
        let execution = invoker.invoke(&case, BuildMode::Default);

        assert!(execution.outcome.is_pass());
        assert!(execution.outcome.output().contains("done"));
        assert!(execution.duration < Duration::from_secs(3));
    }

    #[test]
    fn test_output_keeps_write_order_across_streams() {
        let (_dir, case) = script("echo 'error: line 3' >&2\necho 'after error'\nexit 1\n");

        let execution = Invoker::new("sh").invoke(&case, BuildMode::Default);

        assert_eq!(execution.outcome.output(), "error: line 3\nafter error\n");
    }

    #[test]
    fn test_invoke_within_deadline_passes() {
        let (_dir, case) = script("exit 0\n");

        let invoker = Invoker::new("sh").with_timeout(Some(Duration::from_secs(10)));
        assert!(invoker.invoke(&case, BuildMode::Default).outcome.is_pass());
    }

    #[test]
    fn test_outcome_kinds() {
        let failed = Outcome::Failed {
            code: Some(1),
            output: String::new(),
        };
        assert_eq!(failed.kind(), "failed");
        assert_eq!(failed.exit_code(), Some(1));

        let spawn = Outcome::SpawnFailed {
            error: "no such file".to_string(),
        };
        assert_eq!(spawn.output(), "no such file");
        assert_eq!(spawn.exit_code(), None);
    }
}
