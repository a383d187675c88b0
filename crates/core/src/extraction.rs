//! Metadata extraction from generated script text.
//!
//! Models wrap scripts in Markdown fences and describe them with comment
//! headers such as `# name: csv_cleaner` or `# tags: csv, cleanup`.
//! [`extract`] strips the fence and collects the recognized headers into a
//! [`ScriptMetadata`]. It is total: anything it does not understand is left
//! in the body and the corresponding metadata field keeps its default.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches a single-line comment directive: `# key: value`, `// @key: value`,
/// `-- key: value`.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#|//|--)\s*@?([A-Za-z][A-Za-z0-9_ -]*?)\s*:\s*(.*?)\s*$")
        .expect("valid regex")
});

const FENCE: &str = "```";

/// Header-declared properties of a generated script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub interpreter_version: String,
    /// Free-text description of the inputs the script expects.
    pub inputs: String,
    pub timeout_secs: Option<u32>,
    pub memory_limit: String,
    pub cpu_limit: String,
}

/// Script body plus the metadata found in its headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub body: String,
    pub metadata: ScriptMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Name,
    Description,
    Tags,
    InterpreterVersion,
    Inputs,
    Timeout,
    Memory,
    Cpu,
}

impl Directive {
    fn parse(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let directive = match key.as_str() {
            "name" | "title" => Directive::Name,
            "description" | "desc" => Directive::Description,
            "tags" | "tag" => Directive::Tags,
            "python" | "python_version" | "interpreter" | "interpreter_version" | "runtime" => {
                Directive::InterpreterVersion
            }
            "inputs" | "input" | "expected_inputs" | "parameters" => Directive::Inputs,
            "timeout" | "timeout_secs" | "timeout_seconds" => Directive::Timeout,
            "memory" | "memory_limit" | "mem" => Directive::Memory,
            "cpu" | "cpu_limit" | "cpus" => Directive::Cpu,
            _ => return None,
        };
        Some(directive)
    }
}

/// Split generated text into a runnable body and its header metadata.
pub fn extract(raw: &str) -> Extracted {
    let body = strip_fence(raw);
    let metadata = scan_headers(&body);
    Extracted { body, metadata }
}

/// Remove an enclosing Markdown code fence, if there is one.
///
/// Text without an opening fence is returned byte-for-byte unchanged. An
/// opening fence without a closing one (truncated output) is still removed.
fn strip_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with(FENCE) {
        return raw.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().is_some_and(|last| last.trim() == FENCE) {
        lines.pop();
    }
    lines.join("\n")
}

fn scan_headers(body: &str) -> ScriptMetadata {
    let mut meta = ScriptMetadata::default();
    let mut seen: Vec<Directive> = Vec::new();

    for line in body.lines() {
        let Some(caps) = DIRECTIVE_RE.captures(line) else {
            continue;
        };
        let Some(directive) = Directive::parse(&caps[1]) else {
            continue;
        };
        if seen.contains(&directive) {
            continue;
        }
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }

        match directive {
            Directive::Name => meta.name = value.to_string(),
            Directive::Description => meta.description = value.to_string(),
            Directive::Tags => meta.tags = split_tags(value),
            Directive::InterpreterVersion => meta.interpreter_version = value.to_string(),
            Directive::Inputs => meta.inputs = value.to_string(),
            Directive::Timeout => match parse_seconds(value) {
                Some(secs) => meta.timeout_secs = Some(secs),
                None => continue,
            },
            Directive::Memory => meta.memory_limit = value.to_string(),
            Directive::Cpu => meta.cpu_limit = value.to_string(),
        }
        seen.push(directive);
    }

    meta
}

fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts `30`, `30s`, and `30 seconds`.
fn parse_seconds(value: &str) -> Option<u32> {
    let digits = value
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
