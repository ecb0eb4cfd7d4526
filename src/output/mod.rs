//! Output formatters for check results, maze runs and rule listings

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::OutputFormat;
use crate::diagnostic::{Failure, ValidationResult};
use crate::exercise::{ExerciseStep, Lesson};
use crate::maze::{MazeLevel, RunReport};

/// Result of checking one lesson step
pub struct CheckReport<'a> {
    pub lesson: &'a Lesson,
    pub step: &'a ExerciseStep,
    pub result: &'a ValidationResult,
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format a complete step check
    fn format_check(&self, report: &CheckReport<'_>) -> String;

    /// Format a single failure
    fn format_failure(&self, failure: &Failure) -> String;

    /// Format the outcome of a maze run
    fn format_run(&self, level: &MazeLevel, report: &RunReport) -> String;

    /// Format the rules of every step in a lesson
    fn format_rules(&self, lesson: &Lesson) -> String;
}

/// Formatter for the configured output format
pub fn formatter(format: OutputFormat, colored: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => {
            let text = TextFormatter::new();
            Box::new(if colored { text } else { text.without_color() })
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    }
}
