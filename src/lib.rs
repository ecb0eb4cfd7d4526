//! Practica - exercise validation and block-program maze engine
//!
//! Two pieces make up an interactive coding course:
//!
//! - **Guided lessons**: a student edits HTML, CSS and JavaScript; on demand
//!   the code is checked against the declarative rules of the current step,
//!   and the student moves forward when every rule passes.
//! - **Maze game**: a visual block program is compiled and executed one
//!   instruction at a time against a small grid world.
//!
//! # Architecture
//!
//! ```text
//! Lesson file -> StepRunner -> Evaluator -> ValidationResult
//!                    |
//!                  Store (progress)
//!
//! BlockProgram -> compile -> Interpreter -> MazeApi (MazeWorld)
//! ```
//!
//! # Lesson files
//!
//! ```yaml
//! slug: intro-html
//! title: Your first page
//! steps:
//!   - step_number: 1
//!     instruction: Add a heading
//!     validation_rules:
//!       html:
//!         - type: contains
//!           value: "<h1>"
//! ```

pub mod config;
pub mod diagnostic;
pub mod evaluator;
pub mod exercise;
pub mod markup;
pub mod maze;
pub mod output;
pub mod preview;
pub mod progress;
pub mod rule;
pub mod runner;
pub mod store;
pub mod watch;

// Re-export main types
pub use config::Config;
pub use diagnostic::{Failure, FailureKind, Severity, ValidationResult};
pub use evaluator::{evaluate, Evaluator};
pub use exercise::{CodeBuffer, ExerciseStep, Language, Lesson, LoadError, RuleSet};
pub use maze::{compile, BlockProgram, MazeLevel, MazeSession, MazeWorld, RunOutcome};
pub use output::OutputFormatter;
pub use progress::ProgressRecord;
pub use rule::Rule;
pub use runner::{RunnerError, RunnerState, StepRunner};
pub use store::{JsonFileStore, MemoryStore, Store, StoreError};
pub use watch::CodeWatcher;
