//! Failure types for validation results

use crate::exercise::Language;
use serde::{Deserialize, Serialize};

/// Severity level for failures
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning - the rule itself is broken, not the student's code
    Warning,
    /// Error - the submission does not satisfy a rule
    #[default]
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// What went wrong when a rule was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The code does not satisfy the rule
    RuleViolation,
    /// The code could not be parsed for a structural check
    ParseFailure,
    /// The rule carries a pattern that does not compile
    InvalidPattern,
    /// The rule type is not recognized
    UnknownRule,
}

impl FailureKind {
    /// Default severity for this kind of failure
    pub fn severity(self) -> Severity {
        match self {
            FailureKind::InvalidPattern => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::RuleViolation => write!(f, "rule-violation"),
            FailureKind::ParseFailure => write!(f, "parse-failure"),
            FailureKind::InvalidPattern => write!(f, "invalid-pattern"),
            FailureKind::UnknownRule => write!(f, "unknown-rule"),
        }
    }
}

/// A single human-readable failure produced by a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Language whose code was checked
    pub language: Language,
    /// Rule type tag that produced this failure (e.g. "contains")
    pub rule_kind: String,
    /// Failure classification
    pub kind: FailureKind,
    /// Message shown to the student
    pub message: String,
}

impl Failure {
    /// Create a failure of the given kind
    pub fn new(language: Language, rule_kind: &str, kind: FailureKind, message: String) -> Self {
        Self {
            language,
            rule_kind: rule_kind.to_string(),
            kind,
            message,
        }
    }

    /// Create a plain rule violation
    pub fn violation(language: Language, rule_kind: &str, message: String) -> Self {
        Self::new(language, rule_kind, FailureKind::RuleViolation, message)
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Complete, ordered outcome of one check. Empty means pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResult {
    failures: Vec<Failure>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = Failure>) {
        self.failures.extend(failures);
    }

    /// True when no rule failed
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Messages in evaluation order
    pub fn messages(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.message.as_str()).collect()
    }

    /// Count failures at a given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.failures
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    /// Exit code (0 = pass, 1 = only warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.count(Severity::Error) > 0 {
            2
        } else if self.count(Severity::Warning) > 0 {
            1
        } else {
            0
        }
    }
}

impl IntoIterator for ValidationResult {
    type Item = Failure;
    type IntoIter = std::vec::IntoIter<Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}
