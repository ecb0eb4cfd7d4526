//! Human-readable text output formatter

use super::{CheckReport, OutputFormatter};
use crate::diagnostic::{Failure, Severity};
use crate::exercise::Lesson;
use crate::maze::{MazeLevel, RunOutcome, RunReport};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the step hint after a failed check
    pub show_hints: bool,

    /// Show the failure counts line
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_hints: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
        }
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

impl OutputFormatter for TextFormatter {
    fn format_check(&self, report: &CheckReport<'_>) -> String {
        let mut output = String::new();
        let step = report.step;

        output.push_str(&format!(
            "{}\n",
            self.paint(
                &format!("{} / step {}", report.lesson.slug, step.step_number),
                |s| s.underline()
            )
        ));

        if report.result.passed() {
            output.push_str(&format!(
                "{} {}\n",
                self.paint("✓", |s| s.green().bold()),
                "All checks passed"
            ));
            return output;
        }

        for failure in report.result.failures() {
            output.push_str(&self.format_failure(failure));
            output.push('\n');
        }

        if self.show_hints {
            if let Some(hint) = &step.hint {
                output.push_str(&format!("   {} hint: {}\n", self.paint("=", |s| s.blue()), hint));
            }
        }

        if self.show_stats {
            let mut counts = Vec::new();
            let errors = report.result.count(Severity::Error);
            if errors > 0 {
                counts.push(self.paint(&plural(errors, "error"), |s| s.red()));
            }
            let warnings = report.result.count(Severity::Warning);
            if warnings > 0 {
                counts.push(self.paint(&plural(warnings, "warning"), |s| s.yellow()));
            }
            output.push_str(&format!("\n{}\n", counts.join(", ")));
        }

        output
    }

    fn format_failure(&self, failure: &Failure) -> String {
        format!(
            "{}: {}[{}]: {}",
            failure.language,
            self.severity_str(failure.severity()),
            self.paint(&failure.rule_kind, |s| s.cyan()),
            failure.message
        )
    }

    fn format_run(&self, level: &MazeLevel, report: &RunReport) -> String {
        let verdict = match report.outcome {
            RunOutcome::Success => self.paint(&report.outcome.to_string(), |s| s.green().bold()),
            RunOutcome::Cancelled => self.paint(&report.outcome.to_string(), |s| s.yellow()),
            _ => self.paint(&report.outcome.to_string(), |s| s.red().bold()),
        };
        let name = if level.name.is_empty() {
            "maze"
        } else {
            level.name.as_str()
        };
        format!(
            "{}: {}\n{} at {} facing {}\n",
            name,
            verdict,
            plural(report.steps as usize, "step"),
            report.position,
            report.heading
        )
    }

    fn format_rules(&self, lesson: &Lesson) -> String {
        let mut output = String::new();
        let title = if lesson.title.is_empty() {
            lesson.slug.clone()
        } else {
            format!("{} ({})", lesson.title, lesson.slug)
        };
        output.push_str(&format!("{}\n", self.paint(&title, |s| s.bold())));

        for step in &lesson.steps {
            output.push_str(&format!(
                "\nStep {}: {}\n",
                step.step_number,
                step.instruction.trim()
            ));
            if step.validation_rules.is_empty() {
                output.push_str("  (no rules)\n");
            }
            for (language, rules) in step.validation_rules.iter() {
                for rule in rules {
                    let line = format!("{}", rule);
                    let line = if rule.is_unknown() {
                        self.paint(&line, |s| s.yellow())
                    } else {
                        line
                    };
                    output.push_str(&format!("  {:<4} {}\n", language.to_string(), line));
                }
            }
        }

        output
    }
}
