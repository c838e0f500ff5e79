use std::fmt;
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{detector, harness};
use crate::config::AppConfig;
use crate::error::AppError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for pipe readers once the child's process group is gone.
/// Only a descendant that left the group can hold a pipe open past this.
const READER_GRACE: Duration = Duration::from_secs(5);
/// Same, after a timeout or cancel.
const KILLED_READER_GRACE: Duration = Duration::from_millis(250);
const READ_CHUNK: usize = 8192;

/// Source code to run plus the wall-clock budget for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Result<Self, AppError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(AppError::InvalidRequest(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            )));
        }
        self.timeout = Duration::from_secs_f64(secs);
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NonZeroExit,
    Timeout,
    NoFigureProduced,
    LaunchError,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::NonZeroExit => "non-zero exit",
            FailureReason::Timeout => "timeout",
            FailureReason::NoFigureProduced => "no figure produced",
            FailureReason::LaunchError => "launch error",
            FailureReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub stderr_text: String,
    pub exit_code: i32,
    pub reason: FailureReason,
}

/// Outcome of one sandboxed run. Failures are values, never `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Image { png_base64: String },
    Failure(ExecutionFailure),
}

impl ExecutionResult {
    fn failure(reason: FailureReason, exit_code: i32, stderr_text: impl Into<String>) -> Self {
        ExecutionResult::Failure(ExecutionFailure {
            stderr_text: stderr_text.into(),
            exit_code,
            reason,
        })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ExecutionResult::Image { .. })
    }

    pub fn png_base64(&self) -> Option<&str> {
        match self {
            ExecutionResult::Image { png_base64 } => Some(png_base64),
            ExecutionResult::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            ExecutionResult::Failure(failure) => Some(failure),
            ExecutionResult::Image { .. } => None,
        }
    }
}

/// Shared flag that aborts an in-flight execution.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum Completion {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(std::io::Error),
}

/// Runs plotting code in a fresh Python child process.
///
/// Holds no mutable state, so one executor can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    python: PathBuf,
}

impl SandboxExecutor {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        detector::resolve_interpreter(config).map(Self::new)
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute_with_cancel(request, &CancelToken::new())
    }

    pub fn execute_with_cancel(
        &self,
        request: &ExecutionRequest,
        cancel: &CancelToken,
    ) -> ExecutionResult {
        let started = Instant::now();

        // Removed when `script` drops, on every return path below.
        let script = match write_script(&request.source_code) {
            Ok(script) => script,
            Err(e) => {
                warn!(error = %e, "could not write sandbox script");
                return ExecutionResult::failure(
                    FailureReason::LaunchError,
                    -1,
                    format!("Could not write script file: {}", e),
                );
            }
        };

        debug!(
            python = %self.python.display(),
            script = %script.path().display(),
            timeout_ms = request.timeout.as_millis() as u64,
            "spawning sandbox"
        );

        let mut command = Command::new(&self.python);
        command
            .arg(script.path())
            .env("MPLBACKEND", "Agg")
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so anything the script spawns is killed with it.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(python = %self.python.display(), error = %e, "failed to launch interpreter");
                return ExecutionResult::failure(
                    FailureReason::LaunchError,
                    -1,
                    format!("Failed to launch {}: {}", self.python.display(), e),
                );
            }
        };

        let stdout_pipe = drain(child.stdout.take());
        let stderr_pipe = drain(child.stderr.take());

        let deadline = started + request.timeout;
        let completion = wait_for(&mut child, deadline, cancel);
        let elapsed = started.elapsed();

        let result = match completion {
            Completion::Exited(status) => {
                // Descendants still running would hold the pipes open.
                kill_group(&mut child);
                let readers_deadline = Instant::now() + READER_GRACE;
                let stdout = stdout_pipe.collect(readers_deadline);
                let mut stderr = stderr_pipe.collect(readers_deadline);
                debug!(
                    exit_code = status.code().unwrap_or(-1),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "sandbox exited"
                );
                if !(stdout.complete && stderr.complete) {
                    warn!(
                        grace_ms = READER_GRACE.as_millis() as u64,
                        "sandbox output pipes still open after exit, output may be truncated"
                    );
                    stderr.text = with_partial_stderr(truncation_note(&stdout, &stderr), &stderr.text);
                }
                classify(status, &stdout.text, stderr.text)
            }
            Completion::TimedOut => {
                let stderr = stderr_pipe.collect(Instant::now() + KILLED_READER_GRACE).text;
                warn!(
                    timeout_ms = request.timeout.as_millis() as u64,
                    "sandbox timed out, child killed"
                );
                ExecutionResult::failure(
                    FailureReason::Timeout,
                    -1,
                    with_partial_stderr(
                        format!(
                            "Execution timed out after {:.1}s",
                            request.timeout.as_secs_f64()
                        ),
                        &stderr,
                    ),
                )
            }
            Completion::Cancelled => {
                let stderr = stderr_pipe.collect(Instant::now() + KILLED_READER_GRACE).text;
                info!(elapsed_ms = elapsed.as_millis() as u64, "sandbox cancelled");
                ExecutionResult::failure(
                    FailureReason::Cancelled,
                    -1,
                    with_partial_stderr("Execution cancelled".to_string(), &stderr),
                )
            }
            Completion::WaitFailed(e) => {
                warn!(error = %e, "lost track of sandbox child");
                ExecutionResult::failure(
                    FailureReason::LaunchError,
                    -1,
                    format!("Failed to wait for child process: {}", e),
                )
            }
        };

        match &result {
            ExecutionResult::Image { png_base64 } => info!(
                png_bytes = png_base64.len() * 3 / 4,
                elapsed_ms = elapsed.as_millis() as u64,
                "sandbox produced image"
            ),
            ExecutionResult::Failure(failure) => info!(
                reason = %failure.reason,
                exit_code = failure.exit_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "sandbox failed"
            ),
        }
        result
    }

    /// Runs `execute` on tokio's blocking pool.
    pub async fn execute_async(&self, request: ExecutionRequest) -> ExecutionResult {
        self.execute_async_with_cancel(request, CancelToken::new())
            .await
    }

    pub async fn execute_async_with_cancel(
        &self,
        request: ExecutionRequest,
        cancel: CancelToken,
    ) -> ExecutionResult {
        let executor = self.clone();
        match tokio::task::spawn_blocking(move || executor.execute_with_cancel(&request, &cancel))
            .await
        {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(
                FailureReason::LaunchError,
                -1,
                format!("Execution task failed: {}", e),
            ),
        }
    }
}

/// Run `source_code` with the first Python found on the system.
///
/// Only an invalid timeout is an `Err`; a missing interpreter is reported
/// as a `LaunchError` failure like any other launch problem.
pub fn execute(source_code: &str, timeout_secs: f64) -> Result<ExecutionResult, AppError> {
    let request = ExecutionRequest::new(source_code).with_timeout_secs(timeout_secs)?;
    match detector::detect_python() {
        Ok(info) => Ok(SandboxExecutor::new(info.path).execute(&request)),
        Err(e) => Ok(ExecutionResult::failure(
            FailureReason::LaunchError,
            -1,
            e.to_string(),
        )),
    }
}

fn write_script(source_code: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("chartgen-")
        .suffix(".py")
        .tempfile()?;
    file.write_all(harness::wrap_source(source_code).as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// A child pipe being read on its own thread into a shared buffer.
struct PipeDrain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

/// Text read from a pipe; `complete` is false when the pipe never reached EOF.
struct Captured {
    text: String,
    complete: bool,
}

impl PipeDrain {
    /// Wait until `deadline` for EOF, then take whatever has arrived.
    fn collect(self, deadline: Instant) -> Captured {
        let wait = deadline.saturating_duration_since(Instant::now());
        let complete = !matches!(self.done.recv_timeout(wait), Err(mpsc::RecvTimeoutError::Timeout));
        let bytes = match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Captured {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            complete,
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> PipeDrain {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        let shared = Arc::clone(&buf);
        thread::spawn(move || {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match shared.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..n]),
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });
    }
    PipeDrain { buf, done }
}

fn truncation_note(stdout: &Captured, stderr: &Captured) -> String {
    let open: Vec<&str> = [("stdout", stdout), ("stderr", stderr)]
        .into_iter()
        .filter(|(_, captured)| !captured.complete)
        .map(|(name, _)| name)
        .collect();
    format!(
        "Output truncated: {} still open {:.1}s after exit (a detached process is holding it)",
        open.join(" and "),
        READER_GRACE.as_secs_f64()
    )
}

fn wait_for(child: &mut Child, deadline: Instant, cancel: &CancelToken) -> Completion {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Completion::Exited(status),
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(child);
                return Completion::WaitFailed(e);
            }
        }
        if cancel.is_cancelled() {
            kill_and_reap(child);
            return Completion::Cancelled;
        }
        if Instant::now() >= deadline {
            kill_and_reap(child);
            return Completion::TimedOut;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// SIGKILL the child's whole process group. A group that is already empty is not an error.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The child leads its own group, so its pid is the group id. The id is not
    // reused while any member of the group is alive.
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: killpg takes plain integers and touches no memory.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!(pgid, "killed sandbox process group");
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn classify(status: ExitStatus, stdout: &str, stderr: String) -> ExecutionResult {
    if !status.success() {
        return ExecutionResult::failure(
            FailureReason::NonZeroExit,
            status.code().unwrap_or(-1),
            stderr,
        );
    }

    let user_output = harness::strip_image_block(stdout);
    if !user_output.is_empty() {
        debug!(stdout = %user_output, "sandbox stdout");
    }

    match harness::extract_image_payload(stdout) {
        Some(payload) if harness::decode_png(&payload).is_some() => {
            ExecutionResult::Image { png_base64: payload }
        }
        Some(_) => ExecutionResult::failure(
            FailureReason::NoFigureProduced,
            0,
            with_partial_stderr("Image payload was not a valid PNG".to_string(), &stderr),
        ),
        None => ExecutionResult::failure(FailureReason::NoFigureProduced, 0, stderr),
    }
}

fn with_partial_stderr(summary: String, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        summary
    } else {
        format!("{}\n{}", summary, stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::installer;

    fn executor_or_skip() -> Option<SandboxExecutor> {
        match detector::detect_python() {
            Ok(info) => Some(SandboxExecutor::new(info.path)),
            Err(_) => {
                eprintln!("skipping: no python interpreter found");
                None
            }
        }
    }

    fn has_matplotlib(executor: &SandboxExecutor) -> bool {
        let found = installer::is_package_installed(executor.python(), "matplotlib");
        if !found {
            eprintln!("skipping image assertions: matplotlib not installed");
        }
        found
    }

    fn request(source: &str, secs: f64) -> ExecutionRequest {
        ExecutionRequest::new(source).with_timeout_secs(secs).unwrap()
    }

    fn png_width(png_base64: &str) -> u32 {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(png_base64)
            .unwrap();
        u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]])
    }

    const BAR_CHART: &str = r#"
import matplotlib.pyplot as plt
fig, ax = plt.subplots()
ax.bar(["A", "B", "C"], [3, 5, 2])
plt.show()
"#;

    #[test]
    fn test_request_defaults_to_thirty_seconds() {
        let req = ExecutionRequest::new("print(1)");
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_timeouts_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ExecutionRequest::new("x = 1").with_timeout_secs(bad).unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)));
        }
        assert!(execute("x = 1", 0.0).is_err());
    }

    #[test]
    fn test_missing_interpreter_is_launch_error() {
        let executor = SandboxExecutor::new("/nonexistent/chartgen/python3");
        let result = executor.execute(&request("print('hi')", 5.0));
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::LaunchError);
        assert_eq!(failure.exit_code, -1);
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = ExecutionResult::failure(FailureReason::NoFigureProduced, 0, "");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "no_figure_produced");

        let image = ExecutionResult::Image {
            png_base64: "iVBORw0KGgo=".into(),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["status"], "image");
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_bar_chart_produces_png() {
        let Some(executor) = executor_or_skip() else { return };
        if !has_matplotlib(&executor) {
            return;
        }
        let result = executor.execute(&request(BAR_CHART, 30.0));
        let png = result.png_base64().unwrap_or_else(|| panic!("expected image, got {:?}", result));
        assert!(harness::decode_png(png).is_some());
    }

    #[test]
    fn test_figure_closed_after_saving_is_still_captured() {
        let Some(executor) = executor_or_skip() else { return };
        if !has_matplotlib(&executor) {
            return;
        }
        let source = r#"
import io
import matplotlib.pyplot as plt
fig, ax = plt.subplots()
ax.plot([1, 2, 3], [2, 4, 1])
fig.savefig(io.BytesIO(), format="png")
plt.close(fig)
"#;
        assert!(executor.execute(&request(source, 30.0)).is_image());
    }

    #[test]
    fn test_most_recent_figure_wins() {
        let Some(executor) = executor_or_skip() else { return };
        if !has_matplotlib(&executor) {
            return;
        }
        let source = r#"
import matplotlib.pyplot as plt
small = plt.figure(figsize=(2, 2))
small.gca().plot([1, 2], [1, 2])
large = plt.figure(figsize=(8, 4))
large.gca().plot([1, 2], [2, 1])
"#;
        let result = executor.execute(&request(source, 30.0));
        let png = result.png_base64().unwrap();
        assert!(png_width(png) > 400);
    }

    #[test]
    fn test_plain_script_is_no_figure() {
        let Some(executor) = executor_or_skip() else { return };
        let result = executor.execute(&request("x = 1\nprint('done')", 30.0));
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NoFigureProduced);
        assert_eq!(failure.exit_code, 0);
    }

    #[test]
    fn test_forged_marker_without_png_is_no_figure() {
        let Some(executor) = executor_or_skip() else { return };
        let source = format!(
            "print('{}')\nprint('aGVsbG8=')\nprint('{}')",
            harness::IMAGE_START_MARKER,
            harness::IMAGE_END_MARKER
        );
        let result = executor.execute(&request(&source, 30.0));
        assert_eq!(
            result.as_failure().unwrap().reason,
            FailureReason::NoFigureProduced
        );
    }

    #[test]
    fn test_exception_is_non_zero_exit_with_traceback() {
        let Some(executor) = executor_or_skip() else { return };
        let result = executor.execute(&request("raise ValueError('bad data')", 30.0));
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NonZeroExit);
        assert_ne!(failure.exit_code, 0);
        assert!(failure.stderr_text.contains("ValueError"));
        assert!(failure.stderr_text.contains("bad data"));
    }

    #[test]
    fn test_syntax_error_is_non_zero_exit() {
        let Some(executor) = executor_or_skip() else { return };
        let result = executor.execute(&request("def broken(:\n    pass", 30.0));
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NonZeroExit);
        assert!(failure.stderr_text.contains("SyntaxError"));
    }

    #[test]
    fn test_sys_exit_codes() {
        let Some(executor) = executor_or_skip() else { return };
        let clean = executor.execute(&request("import sys\nsys.exit(0)", 30.0));
        assert_eq!(
            clean.as_failure().unwrap().reason,
            FailureReason::NoFigureProduced
        );

        let failed = executor.execute(&request("import sys\nsys.exit(3)", 30.0));
        let failure = failed.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NonZeroExit);
        assert_eq!(failure.exit_code, 3);
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let Some(executor) = executor_or_skip() else { return };
        let started = Instant::now();
        let result = executor.execute(&request("while True:\n    pass", 2.0));
        let elapsed = started.elapsed();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(failure.exit_code, -1);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[test]
    fn test_cancel_stops_running_child() {
        let Some(executor) = executor_or_skip() else { return };
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            remote.cancel();
        });

        let started = Instant::now();
        let result = executor.execute_with_cancel(&request("while True:\n    pass", 30.0), &token);
        canceller.join().unwrap();

        assert_eq!(result.as_failure().unwrap().reason, FailureReason::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_concurrent_calls_are_independent() {
        let Some(executor) = executor_or_skip() else { return };
        let with_mpl = has_matplotlib(&executor);

        let slow = executor.clone();
        let looping = thread::spawn(move || slow.execute(&request("while True:\n    pass", 2.0)));
        let quick_source = if with_mpl { BAR_CHART } else { "print('ok')" };
        let quick = executor.execute(&request(quick_source, 30.0));
        let looped = looping.join().unwrap();

        assert_eq!(looped.as_failure().unwrap().reason, FailureReason::Timeout);
        if with_mpl {
            assert!(quick.is_image());
        } else {
            assert_eq!(
                quick.as_failure().unwrap().reason,
                FailureReason::NoFigureProduced
            );
        }
    }

    /// Alive and not a zombie, per `/proc`.
    #[cfg(target_os = "linux")]
    fn process_running(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|stat| stat.rsplit_once(") ").and_then(|(_, rest)| rest.chars().next()))
            .is_some_and(|state| state != 'Z' && state != 'X')
    }

    #[cfg(target_os = "linux")]
    fn gone_within(pid: u32, limit: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if !process_running(pid) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        !process_running(pid)
    }

    const SPAWN_SLEEPER: &str = "import subprocess, sys\n\
        sleeper = subprocess.Popen([sys.executable, '-c', 'import time; time.sleep(30)'])\n";

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timeout_kills_spawned_descendants() {
        let Some(executor) = executor_or_skip() else { return };
        let source = format!(
            "{}sys.stderr.write('descendant=%d\\n' % sleeper.pid)\nsys.stderr.flush()\nwhile True:\n    pass\n",
            SPAWN_SLEEPER
        );
        let started = Instant::now();
        let result = executor.execute(&request(&source, 1.5));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::Timeout);
        let pid: u32 = failure
            .stderr_text
            .lines()
            .find_map(|l| l.trim().strip_prefix("descendant="))
            .unwrap_or_else(|| panic!("no pid in {:?}", failure.stderr_text))
            .parse()
            .unwrap();
        assert!(gone_within(pid, Duration::from_secs(2)), "descendant {} survived", pid);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_exit_with_lingering_descendant_keeps_image() {
        use base64::Engine;
        let Some(executor) = executor_or_skip() else { return };
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let payload = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        let source = format!(
            "{}open({}, 'w').write(str(sleeper.pid))\nprint('{}')\nprint('{}')\nprint('{}')\n",
            SPAWN_SLEEPER,
            serde_json::to_string(pid_file.to_str().unwrap()).unwrap(),
            harness::IMAGE_START_MARKER,
            payload,
            harness::IMAGE_END_MARKER
        );

        let started = Instant::now();
        let result = executor.execute(&request(&source, 30.0));
        let elapsed = started.elapsed();

        assert_eq!(result.png_base64(), Some(payload.as_str()), "{:?}", result);
        assert!(elapsed < READER_GRACE, "took {:?}", elapsed);
        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(gone_within(pid, Duration::from_secs(2)), "descendant {} survived", pid);
    }

    #[cfg(unix)]
    #[test]
    fn test_detached_descendant_holding_pipes_is_reported() {
        let Some(executor) = executor_or_skip() else { return };
        let source = "import subprocess, sys\n\
            subprocess.Popen([sys.executable, '-c', 'import time; time.sleep(10)'], start_new_session=True)\n\
            print('partial output')\n";
        let started = Instant::now();
        let result = executor.execute(&request(source, 30.0));
        // One shared grace period for both pipes, not one each.
        assert!(started.elapsed() < Duration::from_secs(8), "took {:?}", started.elapsed());
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NoFigureProduced);
        assert!(failure.stderr_text.contains("Output truncated"), "{:?}", failure.stderr_text);
        assert!(failure.stderr_text.contains("stdout"));
    }

    #[test]
    fn test_script_file_removed_after_run() {
        let Some(executor) = executor_or_skip() else { return };
        let report = "import sys\nsys.stderr.write('script=' + sys.argv[0] + '\\n')\nsys.stderr.flush()\n";
        let cases = [
            (format!("{}sys.exit(2)\n", report), 30.0, FailureReason::NonZeroExit),
            (format!("{}while True:\n    pass\n", report), 1.0, FailureReason::Timeout),
        ];
        for (source, secs, reason) in cases {
            let result = executor.execute(&request(&source, secs));
            let failure = result.as_failure().unwrap();
            assert_eq!(failure.reason, reason);
            let script = failure
                .stderr_text
                .lines()
                .find_map(|l| l.trim().strip_prefix("script="))
                .unwrap_or_else(|| panic!("no script path in {:?}", failure.stderr_text));
            let script = Path::new(script);
            assert!(script.file_name().unwrap().to_string_lossy().starts_with("chartgen-"));
            assert!(!script.exists(), "{} left behind", script.display());
        }
    }

    #[tokio::test]
    async fn test_execute_async_matches_blocking() {
        let Some(executor) = executor_or_skip() else { return };
        let result = executor
            .execute_async(request("raise RuntimeError('boom')", 30.0))
            .await;
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason, FailureReason::NonZeroExit);
        assert!(failure.stderr_text.contains("RuntimeError"));
    }
}
