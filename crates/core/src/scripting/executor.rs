//! Shared types for running child processes.
//!
//! Defines [`RunOptions`], [`ScriptOutput`], and [`ScriptError`], used by
//! both the dependency installer and the interpreter run.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a child process is launched and bounded.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Additional environment variables set on top of the inherited ones.
    pub env_vars: Vec<(String, OsString)>,
    /// Working directory for the child process (uses current dir if `None`).
    pub working_directory: Option<PathBuf>,
    /// Hard wall-clock deadline; the process group is killed when it expires.
    pub timeout: Duration,
}

impl RunOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            env_vars: Vec::new(),
            working_directory: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

/// Captured output from a process that exited on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Complete stdout captured from the process (capped).
    pub stdout: String,
    /// Complete stderr captured from the process (capped).
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Errors that can occur while preparing or running a process.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The process exceeded its deadline and was killed.
    #[error("Process timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
        /// Output read before the deadline.
        stdout: String,
        stderr: String,
    },

    /// The execution workspace could not be created or written.
    #[error("Workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// Spawning or waiting on the process failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let err = ScriptError::Timeout {
            elapsed_ms: 5000,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Process timed out after 5000ms");
    }

    #[test]
    fn display_workspace() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = ScriptError::Workspace(inner);
        assert!(err.to_string().starts_with("Workspace error:"));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn error_source_io() {
        let err = ScriptError::IoError(std::io::Error::other("boom"));
        assert!(
            std::error::Error::source(&err).is_some(),
            "IoError variant should have a source"
        );
    }

    #[test]
    fn error_source_none_for_timeout() {
        let err = ScriptError::Timeout {
            elapsed_ms: 100,
            stdout: "partial".into(),
            stderr: String::new(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn run_options_builder() {
        let opts = RunOptions::new(Duration::from_secs(3))
            .in_dir("/tmp")
            .env("A", "1");
        assert_eq!(opts.working_directory, Some(PathBuf::from("/tmp")));
        assert_eq!(opts.env_vars, vec![("A".to_string(), OsString::from("1"))]);
        assert_eq!(opts.timeout, Duration::from_secs(3));
    }
}
