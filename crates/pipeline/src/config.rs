use std::path::PathBuf;
use std::time::Duration;

use scriptforge_core::error::CoreError;
use scriptforge_core::job::JobKind;
use scriptforge_core::prompt::PromptTemplates;
use scriptforge_core::scripting::runtime::{Installer, ScriptRuntime};

/// Script execution configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Interpreter executable looked up on `PATH` (default: `python3`).
    pub interpreter: String,
    /// Dependency installer executable (default: `pip`).
    pub installer: String,
    /// Deadline when neither the request nor the script sets one.
    pub default_timeout_secs: u64,
    /// Upper bound every deadline is clamped to.
    pub max_timeout_secs: u64,
    /// Deadline for each dependency install.
    pub install_timeout_secs: u64,
    /// Parent directory for execution workspaces (system temp dir if unset).
    pub workspace_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            installer: "pip".into(),
            default_timeout_secs: 30,
            max_timeout_secs: 240,
            install_timeout_secs: 60,
            workspace_dir: None,
        }
    }
}

impl ExecutionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default   |
    /// |----------------------------------|-----------|
    /// | `SCRIPT_INTERPRETER`             | `python3` |
    /// | `SCRIPT_INSTALLER`               | `pip`     |
    /// | `EXECUTION_DEFAULT_TIMEOUT_SECS` | `30`      |
    /// | `EXECUTION_MAX_TIMEOUT_SECS`     | `240`     |
    /// | `EXECUTION_INSTALL_TIMEOUT_SECS` | `60`      |
    /// | `EXECUTION_WORKSPACE_DIR`        | temp dir  |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let interpreter =
            std::env::var("SCRIPT_INTERPRETER").unwrap_or(defaults.interpreter);
        let installer = std::env::var("SCRIPT_INSTALLER").unwrap_or(defaults.installer);

        let default_timeout_secs: u64 = std::env::var("EXECUTION_DEFAULT_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.default_timeout_secs.to_string())
            .parse()
            .expect("EXECUTION_DEFAULT_TIMEOUT_SECS must be a valid u64");

        let max_timeout_secs: u64 = std::env::var("EXECUTION_MAX_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.max_timeout_secs.to_string())
            .parse()
            .expect("EXECUTION_MAX_TIMEOUT_SECS must be a valid u64");

        let install_timeout_secs: u64 = std::env::var("EXECUTION_INSTALL_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.install_timeout_secs.to_string())
            .parse()
            .expect("EXECUTION_INSTALL_TIMEOUT_SECS must be a valid u64");

        assert!(
            default_timeout_secs > 0 && default_timeout_secs <= max_timeout_secs,
            "EXECUTION_DEFAULT_TIMEOUT_SECS must be between 1 and EXECUTION_MAX_TIMEOUT_SECS"
        );

        let workspace_dir = std::env::var_os("EXECUTION_WORKSPACE_DIR").map(PathBuf::from);

        Self {
            interpreter,
            installer,
            default_timeout_secs,
            max_timeout_secs,
            install_timeout_secs,
            workspace_dir,
        }
    }

    /// The Python runtime profile described by this configuration.
    pub fn runtime(&self) -> ScriptRuntime {
        let mut installer = Installer::pip(self.installer.clone());
        installer.timeout = Duration::from_secs(self.install_timeout_secs);

        let mut runtime =
            ScriptRuntime::python(self.interpreter.clone(), self.installer.clone())
                .with_installer(installer);
        if let Some(dir) = &self.workspace_dir {
            runtime = runtime.with_workspace_root(dir);
        }
        runtime
    }

    /// Pick the deadline for one attempt: the request's value, else the
    /// script's own setting, else the default; clamped to the maximum.
    ///
    /// An explicit request value of zero is rejected. A non-positive stored
    /// script setting is ignored.
    pub fn resolve_timeout(
        &self,
        requested_secs: Option<u64>,
        script_secs: Option<i32>,
    ) -> Result<Duration, CoreError> {
        if requested_secs == Some(0) {
            return Err(CoreError::Validation(
                "timeout_secs must be greater than zero".into(),
            ));
        }

        let secs = requested_secs
            .or_else(|| script_secs.and_then(|s| u64::try_from(s).ok()).filter(|s| *s > 0))
            .unwrap_or(self.default_timeout_secs)
            .min(self.max_timeout_secs);

        Ok(Duration::from_secs(secs))
    }
}

/// Prompt templates with per-kind overrides from `PROMPT_TEMPLATE_<KIND>`
/// (e.g. `PROMPT_TEMPLATE_GENERATION`).
pub fn templates_from_env() -> Result<PromptTemplates, CoreError> {
    let mut templates = PromptTemplates::default();
    for kind in JobKind::ALL {
        let key = format!("PROMPT_TEMPLATE_{}", kind.as_str().to_uppercase());
        if let Ok(template) = std::env::var(&key) {
            tracing::info!(kind = %kind, "Using prompt template override from {key}");
            templates = templates.with_template(kind, template)?;
        }
    }
    Ok(templates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
