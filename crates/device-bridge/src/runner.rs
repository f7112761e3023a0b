//! Process Runner
//!
//! Spawns the external tools with an argument vector and captures their output.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Process runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("could not start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {exit_code}: {stderr}")]
    Failed {
        program: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code as reported by the OS, `-1` when terminated by a signal
    pub exit_code: i32,
}

impl ProcessOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn a non-zero exit into `RunnerError::Failed`
    pub fn check(self, program: &Path) -> Result<Self, RunnerError> {
        if self.success() {
            return Ok(self);
        }
        Err(RunnerError::Failed {
            program: program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.display().to_string()),
            exit_code: self.exit_code,
            stderr: self.stderr_text().trim().to_string(),
        })
    }
}

/// Runs external executables.
///
/// Every argument reaches the child as a single unit; nothing is re-split by a shell.
pub trait ProcessRunner: Send + Sync + 'static {
    /// Run to completion with stdout and stderr captured
    fn run(
        &self,
        program: &Path,
        args: &[String],
    ) -> impl Future<Output = Result<ProcessOutput, RunnerError>> + Send;

    /// Run with the terminal handed over to the child, returning its exit code
    fn run_attached(
        &self,
        program: &Path,
        args: &[String],
    ) -> impl Future<Output = Result<i32, RunnerError>> + Send;
}

/// Production runner backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl TokioRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for TokioRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, RunnerError> {
        debug!("{} {:?}", program.display(), args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        Ok(ProcessOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn run_attached(&self, program: &Path, args: &[String]) -> Result<i32, RunnerError> {
        debug!("{} {:?} (attached)", program.display(), args);

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| RunnerError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_maps_exit_code() {
        let err = ProcessOutput::failed(2, "no permissions\n")
            .check(Path::new("/usr/bin/fastboot"))
            .unwrap_err();
        match err {
            RunnerError::Failed { program, exit_code, stderr } => {
                assert_eq!(program, "fastboot");
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "no permissions");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ProcessOutput::ok("x").check(Path::new("adb")).is_ok());
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let runner = TokioRunner::new();
        let result = runner
            .run(Path::new("/definitely/not/here/adb"), &["devices".to_string()])
            .await;

        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let runner = TokioRunner::new();
        let args = vec![
            "-c".to_string(),
            "printf 'out with spaces'; printf err >&2; exit 3".to_string(),
        ];
        let output = runner.run(Path::new("sh"), &args).await.unwrap();

        assert_eq!(output.stdout_text(), "out with spaces");
        assert_eq!(output.stderr_text(), "err");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_is_not_truncated() {
        let runner = TokioRunner::new();
        let args = vec!["-c".to_string(), "head -c 200000 /dev/zero".to_string()];
        let output = runner.run(Path::new("sh"), &args).await.unwrap();

        assert_eq!(output.stdout.len(), 200_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_argument_with_spaces_is_one_unit() {
        let runner = TokioRunner::new();
        let args = vec![
            "-c".to_string(),
            "printf '%s|' \"$@\"".to_string(),
            "sh".to_string(),
            "a b".to_string(),
            "\"quoted\"".to_string(),
        ];
        let output = runner.run(Path::new("sh"), &args).await.unwrap();

        assert_eq!(output.stdout_text(), "a b|\"quoted\"|");
    }
}
