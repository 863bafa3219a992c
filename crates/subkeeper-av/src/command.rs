//! Builder for executing external tool commands with timeout support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use subkeeper_common::{Error, Result};
use tokio::process::Command;

/// Default command timeout: 30 minutes. Remuxing a large container is slow.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Process exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Output of a process that exited with code 0.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Diagnostic text for logs: stderr, or stdout when stderr is empty.
    ///
    /// mkvtoolnix writes its errors to stdout.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use subkeeper_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> subkeeper_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("mkvmerge"))
///     .arg("-J")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    accepted_codes: Vec<i32>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            accepted_codes: vec![0],
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Treat these non-zero exit codes as success too.
    pub fn accept_exit_codes(&mut self, codes: impl IntoIterator<Item = i32>) -> &mut Self {
        self.accepted_codes.extend(codes);
        self
    }

    /// The program to run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The arguments, in order.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name for logs and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Whether `code` counts as a successful exit for this command.
    pub fn accepts(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| self.accepted_codes.contains(&c))
    }

    /// Turn captured output into a result according to the accepted exit
    /// codes.
    pub fn check(&self, output: ToolOutput) -> Result<ToolOutput> {
        if self.accepts(output.code) {
            return Ok(output);
        }
        let status = output
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(Error::tool(
            self.program_name(),
            format!("exited with status {status}: {}", output.diagnostic()),
        ))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Tool`] if the process times out (message includes
    ///   the timeout duration).
    /// - Returns [`Error::Tool`] if the process exits with a code that was not
    ///   accepted (message includes the captured diagnostic).
    /// - Returns [`Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("tool", &program_name)
            } else {
                Error::tool(&program_name, format!("failed to spawn: {e}"))
            }
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => self.check(ToolOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

/// Seam between the container logic and process spawning.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the command and return its output, or an error if it failed.
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        tracing::debug!(
            "running {} {}",
            command.program().display(),
            command.get_args().join(" ")
        );
        command.execute().await
    }
}
