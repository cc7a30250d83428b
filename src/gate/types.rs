use serde::{Deserialize, Serialize};
use std::fmt;

/// Strictness mode passed to the validator; controls how issues turn into blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Any error blocks the request
    #[default]
    Strict,
    /// Only severe errors block the request
    Lenient,
    /// Nothing blocks; issues are reported only
    Permissive,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Strict => "strict",
            Mode::Lenient => "lenient",
            Mode::Permissive => "permissive",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    #[default]
    Error,
    Warning,
    Info,
}

/// Origin of an issue inside a line-oriented document. Missing fields mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// A single validator finding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Semantic classification (serialized as `type`)
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: IssueKind,
    /// Stable machine-readable identifier
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
    /// Remediation hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

/// Result of one validator invocation, as emitted by the validator with `--output json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Required: output without it is not a verdict
    pub valid: bool,
    /// Admission decision already adjusted for the strictness mode
    #[serde(default)]
    pub should_block: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<Issue>,
    #[serde(default)]
    pub warnings: Vec<Issue>,
    #[serde(default)]
    pub info: Vec<Issue>,
    #[serde(default)]
    pub has_warnings: bool,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Verdict {
    /// Whether the request must be rejected. The validator's decision is final,
    /// even when it reports no errors.
    pub fn blocks(&self) -> bool {
        self.should_block
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Describe every way this verdict disagrees with itself.
    ///
    /// Returns an empty list for a well-formed verdict.
    pub fn inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.valid && !self.errors.is_empty() {
            problems.push(format!(
                "verdict is valid but carries {} errors",
                self.errors.len()
            ));
        }
        if self.should_block && self.errors.is_empty() {
            problems.push("verdict asks to block without any errors".to_string());
        }

        let buckets = [
            (IssueKind::Error, &self.errors),
            (IssueKind::Warning, &self.warnings),
            (IssueKind::Info, &self.info),
        ];
        for (expected, issues) in buckets {
            for issue in issues.iter().filter(|i| i.kind != expected) {
                problems.push(format!(
                    "issue '{}' of kind {:?} filed under {:?}",
                    issue.code, issue.kind, expected
                ));
            }
        }

        problems
    }
}
