//! Interpreter profiles and the single-attempt run.
//!
//! A [`ScriptRuntime`] describes how a stored script is turned into a
//! process: which interpreter runs it, what the source file is called, how
//! caller inputs are declared at the top of the source, and which installer
//! handles dependency specifiers. [`ScriptRuntime::run_attempt`] performs one
//! complete attempt inside a fresh [`Workspace`] and always returns a
//! terminal [`AttemptOutcome`]; it never leaves the workspace behind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;

use super::executor::{RunOptions, ScriptError};
use super::subprocess::run_command;
use super::workspace::Workspace;
use crate::execution::{
    setup_failure_marker, timeout_marker, ExecutionStatus, SETUP_FAILURE_EXIT_CODE,
    TIMEOUT_EXIT_CODE,
};

/// Default per-dependency install deadline.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How caller inputs are declared in front of the script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreludeStyle {
    /// `inputs = __import__("json").loads("...")`
    Python,
    /// `INPUTS='...'; export INPUTS`
    Shell,
}

/// The dependency installer command; each specifier is appended as the last
/// argument.
#[derive(Debug, Clone)]
pub struct Installer {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Installer {
    pub fn pip(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["install".into(), "--quiet".into()],
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

/// Interpreter profile used to run stored scripts.
#[derive(Debug, Clone)]
pub struct ScriptRuntime {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    /// Name of the source file written into the workspace.
    pub file_name: String,
    pub prelude: PreludeStyle,
    /// Module search path variable the workspace is prepended to.
    pub search_path_var: Option<String>,
    pub installer: Option<Installer>,
    /// Parent directory for workspaces; the system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
}

impl ScriptRuntime {
    /// `python3 script.py` with `pip install` for dependencies.
    pub fn python(interpreter: impl Into<String>, installer: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: Vec::new(),
            file_name: "script.py".into(),
            prelude: PreludeStyle::Python,
            search_path_var: Some("PYTHONPATH".into()),
            installer: Some(Installer::pip(installer)),
            workspace_root: None,
        }
    }

    /// `sh script.sh`, no installer.
    pub fn shell() -> Self {
        Self {
            interpreter: "sh".into(),
            interpreter_args: Vec::new(),
            file_name: "script.sh".into(),
            prelude: PreludeStyle::Shell,
            search_path_var: None,
            installer: None,
            workspace_root: None,
        }
    }

    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Prepend the inputs declaration to `source` unless `inputs` is empty.
    pub fn compose_source(&self, source: &str, inputs: &Value) -> String {
        if is_empty_inputs(inputs) {
            return source.to_string();
        }

        let json = inputs.to_string();
        let declaration = match self.prelude {
            PreludeStyle::Python => {
                let literal = Value::String(json).to_string();
                format!("inputs = __import__(\"json\").loads({literal})")
            }
            PreludeStyle::Shell => {
                let quoted = json.replace('\'', r"'\''");
                format!("INPUTS='{quoted}'; export INPUTS")
            }
        };
        format!("{declaration}\n{source}")
    }

    /// Run one complete attempt. Every failure mode is folded into the
    /// returned outcome, and the workspace is gone by the time this returns.
    pub async fn run_attempt(&self, request: AttemptRequest<'_>) -> AttemptOutcome {
        let workspace = match self.create_workspace() {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create execution workspace");
                return AttemptOutcome::setup_failure(&ScriptError::Workspace(e), Vec::new(), None);
            }
        };
        let workspace_path = workspace.path().to_path_buf();

        let mut installs = Vec::new();
        let result = self.run_in(&workspace, &request, &mut installs).await;

        if let Err(e) = workspace.close() {
            tracing::warn!(
                path = %workspace_path.display(),
                error = %e,
                "Failed to remove execution workspace",
            );
        }

        match result {
            Ok(output) => AttemptOutcome {
                status: ExecutionStatus::from_exit_code(output.exit_code),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
                installs,
                workspace_path: Some(workspace_path),
            },
            Err(ScriptError::Timeout {
                elapsed_ms,
                stdout,
                stderr,
            }) => {
                tracing::warn!(
                    elapsed_ms,
                    timeout_secs = request.timeout.as_secs(),
                    "Script exceeded its deadline and was killed",
                );
                AttemptOutcome {
                    status: ExecutionStatus::Timeout,
                    stdout,
                    stderr: with_marker(stderr, &timeout_marker(request.timeout.as_secs())),
                    exit_code: TIMEOUT_EXIT_CODE,
                    installs,
                    workspace_path: Some(workspace_path),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Script attempt failed during setup");
                AttemptOutcome::setup_failure(&e, installs, Some(workspace_path))
            }
        }
    }

    fn create_workspace(&self) -> std::io::Result<Workspace> {
        match &self.workspace_root {
            Some(root) => Workspace::create_in(root),
            None => Workspace::create(),
        }
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &AttemptRequest<'_>,
        installs: &mut Vec<InstallOutcome>,
    ) -> Result<super::executor::ScriptOutput, ScriptError> {
        let source = self.compose_source(request.source, request.inputs);
        let script_path = workspace
            .write_file(&self.file_name, &source)
            .await
            .map_err(ScriptError::Workspace)?;

        if let Some(installer) = &self.installer {
            for spec in request.dependencies {
                installs.push(install_one(installer, spec, workspace.path()).await);
            }
        } else if !request.dependencies.is_empty() {
            tracing::warn!(
                count = request.dependencies.len(),
                "No installer configured; skipping dependency installation",
            );
        }

        let mut options = RunOptions::new(request.timeout).in_dir(workspace.path());
        if let Some(var) = &self.search_path_var {
            options = options.env(var.clone(), search_path_with(var, workspace.path()));
        }

        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.interpreter_args).arg(&script_path);
        run_command(&mut cmd, options).await
    }
}

/// Inputs to one attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRequest<'a> {
    pub source: &'a str,
    pub dependencies: &'a [String],
    pub inputs: &'a Value,
    pub timeout: Duration,
}

/// Result of one dependency install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { spec: String },
    Failed { spec: String, reason: String },
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed { .. })
    }
}

/// Terminal result of one attempt.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub installs: Vec<InstallOutcome>,
    /// Where the workspace lived (already removed), if one was created.
    pub workspace_path: Option<PathBuf>,
}

impl AttemptOutcome {
    fn setup_failure(
        err: &ScriptError,
        installs: Vec<InstallOutcome>,
        workspace_path: Option<PathBuf>,
    ) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            stdout: String::new(),
            stderr: setup_failure_marker(&err.to_string()),
            exit_code: SETUP_FAILURE_EXIT_CODE,
            installs,
            workspace_path,
        }
    }
}

/// Best-effort install of one specifier. Never fails the attempt.
async fn install_one(installer: &Installer, spec: &str, workspace: &Path) -> InstallOutcome {
    let mut cmd = Command::new(&installer.program);
    cmd.args(&installer.args).arg(spec);
    let options = RunOptions::new(installer.timeout).in_dir(workspace);

    let failure = match run_command(&mut cmd, options).await {
        Ok(output) if output.exit_code == 0 => {
            tracing::debug!(spec, duration_ms = output.duration_ms, "Dependency installed");
            return InstallOutcome::Installed {
                spec: spec.to_string(),
            };
        }
        Ok(output) => format!(
            "installer exited with code {}: {}",
            output.exit_code,
            output.stderr.trim()
        ),
        Err(e) => e.to_string(),
    };

    tracing::warn!(spec, reason = %failure, "Dependency install failed; continuing");
    InstallOutcome::Failed {
        spec: spec.to_string(),
        reason: failure,
    }
}

fn is_empty_inputs(inputs: &Value) -> bool {
    match inputs {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// `stderr` followed by `marker` on a line of its own.
fn with_marker(mut stderr: String, marker: &str) -> String {
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        stderr.push('\n');
    }
    stderr.push_str(marker);
    stderr
}

/// `workspace` prepended to the current value of `var`.
fn search_path_with(var: &str, workspace: &Path) -> OsString {
    let mut paths = vec![workspace.to_path_buf()];
    if let Some(existing) = std::env::var_os(var) {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| workspace.as_os_str().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn request<'a>(source: &'a str, deps: &'a [String], inputs: &'a Value) -> AttemptRequest<'a> {
        AttemptRequest {
            source,
            dependencies: deps,
            inputs,
            timeout: Duration::from_secs(5),
        }
    }

    /// An installer that appends each specifier to `log` instead of installing.
    fn logging_installer(log: &Path) -> Installer {
        Installer {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                format!("echo \"$0\" >> '{}'", log.display()),
            ],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn empty_inputs_leave_source_untouched() {
        let runtime = ScriptRuntime::python("python3", "pip");
        for inputs in [Value::Null, json!({}), json!([]), json!("")] {
            assert_eq!(runtime.compose_source("print(1)", &inputs), "print(1)");
        }
    }

    #[test]
    fn python_prelude_is_a_single_first_line() {
        let runtime = ScriptRuntime::python("python3", "pip");
        let composed = runtime.compose_source("print(inputs)", &json!({"name": "a\"b"}));
        let mut lines = composed.lines();
        assert_eq!(
            lines.next(),
            Some(r#"inputs = __import__("json").loads("{\"name\":\"a\\\"b\"}")"#)
        );
        assert_eq!(lines.next(), Some("print(inputs)"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn shell_prelude_escapes_single_quotes() {
        let composed = ScriptRuntime::shell().compose_source("echo hi", &json!({"q": "it's"}));
        assert_eq!(
            composed.lines().next(),
            Some(r#"INPUTS='{"q":"it'\''s"}'; export INPUTS"#)
        );
    }

    #[tokio::test]
    async fn successful_script_completes_and_cleans_up() {
        let outcome = ScriptRuntime::shell()
            .run_attempt(request("echo hello", &[], &Value::Null))
            .await;
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "hello\n");
        let path = outcome.workspace_path.expect("workspace path");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn inputs_are_visible_to_the_script() {
        let inputs = json!({"n": 3});
        let outcome = ScriptRuntime::shell()
            .run_attempt(request("echo \"$INPUTS\"", &[], &inputs))
            .await;
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.stdout.trim(), r#"{"n":3}"#);
    }

    #[tokio::test]
    async fn script_runs_inside_its_workspace() {
        let outcome = ScriptRuntime::shell()
            .run_attempt(request("ls", &[], &Value::Null))
            .await;
        assert_eq!(outcome.stdout.trim(), "script.sh");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed_not_error() {
        let outcome = ScriptRuntime::shell()
            .run_attempt(request("echo bad >&2; exit 7", &[], &Value::Null))
            .await;
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.exit_code, 7);
        assert_eq!(outcome.stderr, "bad\n");
        assert!(!outcome.workspace_path.expect("path").exists());
    }

    #[tokio::test]
    async fn infinite_loop_times_out_and_cleans_up() {
        let start = Instant::now();
        let outcome = ScriptRuntime::shell()
            .run_attempt(AttemptRequest {
                source: "while true; do :; done",
                dependencies: &[],
                inputs: &Value::Null,
                timeout: Duration::from_secs(1),
            })
            .await;
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(outcome.status, ExecutionStatus::Timeout);
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
        assert_eq!(outcome.stderr, timeout_marker(1));
        assert!(!outcome.workspace_path.expect("path").exists());
    }

    #[tokio::test]
    async fn timeout_keeps_partial_output_and_appends_the_marker() {
        let outcome = ScriptRuntime::shell()
            .run_attempt(AttemptRequest {
                source: "echo progress\necho warming up >&2\nwhile true; do :; done",
                dependencies: &[],
                inputs: &Value::Null,
                timeout: Duration::from_secs(1),
            })
            .await;
        assert_eq!(outcome.status, ExecutionStatus::Timeout);
        assert_eq!(outcome.stdout, "progress\n");
        assert_eq!(
            outcome.stderr,
            format!("warming up\n{}", timeout_marker(1))
        );
    }

    #[tokio::test]
    async fn background_process_does_not_extend_the_run() {
        let start = Instant::now();
        let outcome = ScriptRuntime::shell()
            .run_attempt(AttemptRequest {
                source: "sleep 6 &\necho started",
                dependencies: &[],
                inputs: &Value::Null,
                timeout: Duration::from_secs(1),
            })
            .await;
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.stdout, "started\n");
    }

    #[test]
    fn marker_goes_on_its_own_line() {
        assert_eq!(with_marker(String::new(), "M"), "M");
        assert_eq!(with_marker("a".into(), "M"), "a\nM");
        assert_eq!(with_marker("a\n".into(), "M"), "a\nM");
    }

    #[tokio::test]
    async fn zero_dependencies_never_invoke_the_installer() {
        let log_dir = tempfile::tempdir().expect("log dir");
        let log = log_dir.path().join("installs.log");
        let runtime = ScriptRuntime::shell().with_installer(logging_installer(&log));

        let outcome = runtime.run_attempt(request("true", &[], &Value::Null)).await;
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert!(outcome.installs.is_empty());
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn dependencies_install_in_order() {
        let log_dir = tempfile::tempdir().expect("log dir");
        let log = log_dir.path().join("installs.log");
        let runtime = ScriptRuntime::shell().with_installer(logging_installer(&log));
        let deps = vec!["requests==2.32.3".to_string(), "pyyaml".to_string()];

        let outcome = runtime.run_attempt(request("true", &deps, &Value::Null)).await;
        assert_eq!(outcome.installs.len(), 2);
        assert!(outcome.installs.iter().all(InstallOutcome::is_installed));
        let logged = std::fs::read_to_string(&log).expect("read log");
        assert_eq!(logged, "requests==2.32.3\npyyaml\n");
    }

    #[tokio::test]
    async fn failed_install_is_not_fatal() {
        let runtime = ScriptRuntime::shell().with_installer(Installer {
            program: "scriptforge-missing-installer".into(),
            args: vec![],
            timeout: Duration::from_secs(5),
        });
        let deps = vec!["left-pad".to_string()];

        let outcome = runtime.run_attempt(request("echo ran", &deps, &Value::Null)).await;
        assert_matches!(&outcome.installs[..], [InstallOutcome::Failed { spec, .. }] if spec == "left-pad");
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.stdout, "ran\n");
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_setup_failure() {
        let mut runtime = ScriptRuntime::shell();
        runtime.interpreter = "scriptforge-missing-interpreter".into();

        let outcome = runtime.run_attempt(request("echo hi", &[], &Value::Null)).await;
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.exit_code, SETUP_FAILURE_EXIT_CODE);
        assert!(outcome.stderr.starts_with(crate::execution::ENGINE_MARKER));
        assert!(!outcome.workspace_path.expect("path").exists());
    }

    #[tokio::test]
    async fn unusable_workspace_root_is_a_setup_failure() {
        let runtime = ScriptRuntime::shell().with_workspace_root("/definitely/not/a/real/root");

        let outcome = runtime.run_attempt(request("echo hi", &[], &Value::Null)).await;
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.exit_code, SETUP_FAILURE_EXIT_CODE);
        assert!(outcome.stderr.contains("execution setup failed"));
        assert!(outcome.workspace_path.is_none());
    }

    #[tokio::test]
    async fn workspace_is_prepended_to_search_path() {
        let runtime = ScriptRuntime {
            search_path_var: Some("SCRIPTFORGE_TEST_PATH".into()),
            ..ScriptRuntime::shell()
        };
        let outcome = runtime
            .run_attempt(request("echo \"$SCRIPTFORGE_TEST_PATH\"", &[], &Value::Null))
            .await;
        let path = outcome.workspace_path.expect("path");
        assert_eq!(outcome.stdout.trim(), path.display().to_string());
    }
}
