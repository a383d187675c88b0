//! Prompt templates, one per job kind.
//!
//! Every job kind runs through the same generation pipeline; the only thing
//! that differs is the template the request text is rendered into.
//! Templates use `{prompt}` and `{context}` placeholders.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::CoreError;
use crate::job::{GenerationInput, JobKind};

pub const PROMPT_PLACEHOLDER: &str = "{prompt}";
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:prompt|context)\}").expect("valid regex"));

const HEADER_INSTRUCTIONS: &str = "\
Start the script with single-line comment headers, one per line:
# name: <short_snake_case_name>
# description: <one sentence>
# tags: <comma separated tags>
# python_version: <version>
# inputs: <what the `inputs` variable is expected to contain>
# timeout: <seconds>
# memory: <limit, e.g. 256M>
# cpu: <limit, e.g. 1>
Caller parameters are available in a global variable named `inputs`.
Return only the script inside a single fenced code block.";

fn default_template(kind: JobKind) -> String {
    match kind {
        JobKind::Generation => format!(
            "Write a self-contained Python script for the following task.\n\n\
             Task: {PROMPT_PLACEHOLDER}\n\nAdditional context: {CONTEXT_PLACEHOLDER}\n\n\
             {HEADER_INSTRUCTIONS}"
        ),
        JobKind::Analysis => format!(
            "Review the script below and rewrite it with its issues fixed.\n\n\
             Request: {PROMPT_PLACEHOLDER}\n\nScript:\n{CONTEXT_PLACEHOLDER}\n\n\
             {HEADER_INSTRUCTIONS}"
        ),
        JobKind::Annotation => format!(
            "Add accurate header comments to the script below without changing its \
             behaviour.\n\nNotes: {PROMPT_PLACEHOLDER}\n\nScript:\n{CONTEXT_PLACEHOLDER}\n\n\
             {HEADER_INSTRUCTIONS}"
        ),
    }
}

/// Per-kind prompt templates.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<JobKind, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let templates = JobKind::ALL
            .into_iter()
            .map(|kind| (kind, default_template(kind)))
            .collect();
        Self { templates }
    }
}

impl PromptTemplates {
    /// Replace the template for `kind`. The template must contain `{prompt}`.
    pub fn with_template(
        mut self,
        kind: JobKind,
        template: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let template = template.into();
        if !template.contains(PROMPT_PLACEHOLDER) {
            return Err(CoreError::Validation(format!(
                "Prompt template for {kind} must contain {PROMPT_PLACEHOLDER}"
            )));
        }
        self.templates.insert(kind, template);
        Ok(self)
    }

    /// Render the final model prompt for a job.
    pub fn render(&self, kind: JobKind, input: &GenerationInput) -> String {
        let template = self
            .templates
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| default_template(kind));

        let context = match &input.context {
            None | Some(serde_json::Value::Null) => "none".to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        // Single pass: substituted text is never scanned for placeholders.
        PLACEHOLDER_RE
            .replace_all(&template, |caps: &Captures<'_>| {
                if &caps[0] == PROMPT_PLACEHOLDER {
                    input.prompt.clone()
                } else {
                    context.clone()
                }
            })
            .into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
