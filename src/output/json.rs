//! JSON output formatter

use super::{CheckReport, OutputFormatter};
use crate::diagnostic::{Failure, Severity};
use crate::exercise::{Language, Lesson};
use crate::maze::{MazeLevel, RunReport};
use crate::rule::Rule;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    language: Language,
    rule: &'a str,
    kind: String,
    severity: Severity,
    message: &'a str,
}

impl<'a> From<&'a Failure> for JsonFailure<'a> {
    fn from(failure: &'a Failure) -> Self {
        Self {
            language: failure.language,
            rule: &failure.rule_kind,
            kind: failure.kind.to_string(),
            severity: failure.severity(),
            message: &failure.message,
        }
    }
}

#[derive(Serialize)]
struct JsonCheck<'a> {
    lesson: &'a str,
    step: u32,
    passed: bool,
    failures: Vec<JsonFailure<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    error_count: usize,
    warning_count: usize,
}

#[derive(Serialize)]
struct JsonRun<'a> {
    level: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
    success: bool,
}

#[derive(Serialize)]
struct JsonStepRules<'a> {
    step: u32,
    instruction: &'a str,
    rules: Vec<JsonRule<'a>>,
}

#[derive(Serialize)]
struct JsonRule<'a> {
    language: Language,
    #[serde(flatten)]
    rule: &'a Rule,
}

impl OutputFormatter for JsonFormatter {
    fn format_check(&self, report: &CheckReport<'_>) -> String {
        let result = report.result;
        let output = JsonCheck {
            lesson: &report.lesson.slug,
            step: report.step.step_number,
            passed: result.passed(),
            failures: result.failures().iter().map(JsonFailure::from).collect(),
            hint: if result.passed() {
                None
            } else {
                report.step.hint.as_deref()
            },
            summary: JsonSummary {
                error_count: result.count(Severity::Error),
                warning_count: result.count(Severity::Warning),
            },
        };
        self.render(&output)
    }

    fn format_failure(&self, failure: &Failure) -> String {
        self.render(&JsonFailure::from(failure))
    }

    fn format_run(&self, level: &MazeLevel, report: &RunReport) -> String {
        self.render(&JsonRun {
            level: &level.name,
            report,
            success: report.outcome.is_success(),
        })
    }

    fn format_rules(&self, lesson: &Lesson) -> String {
        let steps: Vec<JsonStepRules> = lesson
            .steps
            .iter()
            .map(|step| JsonStepRules {
                step: step.step_number,
                instruction: &step.instruction,
                rules: step
                    .validation_rules
                    .iter()
                    .flat_map(|(language, rules)| {
                        rules.iter().map(move |rule| JsonRule { language, rule })
                    })
                    .collect(),
            })
            .collect();
        self.render(&steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{FailureKind, ValidationResult};
    use crate::maze::{Heading, Position, RunOutcome};

    #[test]
    fn test_json_format_failure() {
        let formatter = JsonFormatter::new();
        let failure = Failure::new(
            Language::Js,
            "regex",
            FailureKind::InvalidPattern,
            "Invalid validation pattern /(/: oops".to_string(),
        );
        let output = formatter.format_failure(&failure);
        assert!(output.contains("\"language\":\"js\""));
        assert!(output.contains("\"kind\":\"invalid-pattern\""));
        assert!(output.contains("\"severity\":\"warning\""));
    }

    #[test]
    fn test_json_format_check() {
        let lesson = Lesson::from_yaml(
            "slug: intro\nsteps:\n  - step_number: 3\n    instruction: go\n    hint: look\n",
        )
        .unwrap();
        let mut result = ValidationResult::new();
        result.push(Failure::violation(Language::Css, "cssProperty", "nope".to_string()));

        let output = JsonFormatter::new().format_check(&CheckReport {
            lesson: &lesson,
            step: &lesson.steps[0],
            result: &result,
        });
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["step"], 3);
        assert_eq!(value["passed"], false);
        assert_eq!(value["hint"], "look");
        assert_eq!(value["failures"][0]["rule"], "cssProperty");
        assert_eq!(value["summary"]["error_count"], 1);
    }

    #[test]
    fn test_json_format_run() {
        let level = MazeLevel {
            name: "l1".to_string(),
            map: vec![],
            max_steps: None,
        };
        let report = RunReport {
            outcome: RunOutcome::StepLimitExceeded,
            steps: 1000,
            position: Position::new(1, 1),
            heading: Heading::North,
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new().format_run(&level, &report)).unwrap();
        assert_eq!(value["outcome"], "step-limit-exceeded");
        assert_eq!(value["success"], false);
        assert_eq!(value["position"]["x"], 1);
        assert_eq!(value["heading"], "north");
    }

    #[test]
    fn test_json_pretty() {
        let formatter = JsonFormatter::new().pretty();
        let failure = Failure::violation(Language::Html, "contains", "msg".to_string());
        assert!(formatter.format_failure(&failure).contains('\n'));
    }
}
