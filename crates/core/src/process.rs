//! Shared subprocess execution for the external imaging tools.
//!
//! Every external collaborator (findscu, cfmm2tar, tar2bids, datalad, git,
//! ssh, scp) is launched through a [`CommandRunner`]. Production code uses
//! [`SystemRunner`]; tests substitute a runner that records invocations and
//! replays canned output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default wall-clock limit for a single external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(100_000);

/// A fully described command line, independent of how it is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Working directory for the child process (inherits ours if `None`).
    pub working_directory: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_directory: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Space-joined command line, used for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit code into [`CommandError::ExecutionFailed`].
    pub fn check(self, program: &str) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::ExecutionFailed {
                program: program.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }

    /// Stdout followed by stderr, the way task logs record tool output.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("{program} timed out after {elapsed_ms}ms")]
    Timeout { program: String, elapsed_ms: u64 },

    #[error("{program} failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can execute a [`CommandSpec`].
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> impl std::future::Future<Output = Result<CommandOutput, CommandError>> + Send;
}

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::NotFound(spec.program.clone()),
            _ => CommandError::Io(e),
        })?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        // On timeout `child` is dropped, which kills it.
        match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout_bytes = stdout_task.await.unwrap_or_default();
                let stderr_bytes = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                    exit_code: status.code().unwrap_or(-1),
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(CommandError::Io(e)),
            Err(_elapsed) => Err(CommandError::Timeout {
                program: spec.program,
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

/// Read an output stream to EOF, keeping at most [`MAX_OUTPUT_BYTES`].
///
/// Output past the cap is drained and discarded so the child never blocks
/// or dies of SIGPIPE on a closed pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let spec = CommandSpec::new("ssh").args(["-p", "22", "host"]);
        assert_eq!(spec.command_line(), "ssh -p 22 host");
    }

    #[test]
    fn check_passes_zero_exit_through() {
        let output = CommandOutput {
            stdout: "ok".into(),
            ..Default::default()
        };
        assert_eq!(output.check("true").unwrap().stdout, "ok");
    }

    #[test]
    fn check_rejects_nonzero_exit() {
        let output = CommandOutput {
            stderr: "boom".into(),
            exit_code: 3,
            ..Default::default()
        };
        let err = output.check("tool").unwrap_err();
        assert_eq!(err.to_string(), "tool failed with exit code 3: boom");
    }

    #[test]
    fn combined_skips_empty_streams() {
        let mut output = CommandOutput {
            stdout: "out".into(),
            ..Default::default()
        };
        assert_eq!(output.combined(), "out");
        output.stderr = "err".into();
        assert_eq!(output.combined(), "out\nerr");
        output.stdout.clear();
        assert_eq!(output.combined(), "err");
    }

    #[tokio::test]
    async fn system_runner_captures_both_streams() {
        let output = SystemRunner
            .run(sh("echo hello; echo oops >&2"))
            .await
            .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn system_runner_reports_exit_code() {
        let output = SystemRunner.run(sh("exit 42")).await.expect("run");
        assert_eq!(output.exit_code, 42);
    }

    #[tokio::test]
    async fn system_runner_applies_env_and_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = SystemRunner
            .run(sh("echo $GREETING; pwd").env("GREETING", "hi").current_dir(dir.path()))
            .await
            .expect("run");
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines[0], "hi");
        assert!(lines[1].ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
    }

    #[tokio::test]
    async fn system_runner_drains_output_past_the_cap() {
        let output = SystemRunner
            .run(sh("head -c 12582912 /dev/zero"))
            .await
            .expect("run");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.len(), MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn system_runner_times_out() {
        let result = SystemRunner
            .run(sh("sleep 30").timeout(Duration::from_millis(200)))
            .await;
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[tokio::test]
    async fn system_runner_missing_program() {
        let result = SystemRunner
            .run(CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .await;
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }
}
