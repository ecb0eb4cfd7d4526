//! Step runner: walks a student through the steps of a lesson
//!
//! ```text
//! Viewing(i) --check--> Checking(i) --pass--> Passed(i) --advance--> Viewing(i+1)
//!                            |                    |
//!                            +--fail--> Viewing(i) +--advance (last)--> Completed
//! ```
//!
//! Progress is written to the [`Store`] after every move to a new step.
//! Persistence problems never block the session; they are logged and
//! queued as warnings.

use crate::config::EvaluatorConfig;
use crate::diagnostic::ValidationResult;
use crate::evaluator::Evaluator;
use crate::exercise::{CodeBuffer, ExerciseStep, Language, Lesson};
use crate::progress::{ProgressRecord, PROGRESS_TABLE};
use crate::store::{Store, SubscriptionHandle};
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Where the student is in the lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Editing step `i`
    Viewing(usize),
    /// Step `i` is being checked
    Checking(usize),
    /// Step `i` passed; waiting for the student to continue
    Passed(usize),
    /// Every step passed
    Completed,
}

impl RunnerState {
    /// Step index, if any
    pub fn index(self) -> Option<usize> {
        match self {
            RunnerState::Viewing(i) | RunnerState::Checking(i) | RunnerState::Passed(i) => Some(i),
            RunnerState::Completed => None,
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Viewing(i) => write!(f, "viewing step {}", i + 1),
            RunnerState::Checking(i) => write!(f, "checking step {}", i + 1),
            RunnerState::Passed(i) => write!(f, "passed step {}", i + 1),
            RunnerState::Completed => write!(f, "completed"),
        }
    }
}

/// Requested transition is not allowed in the current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("a check is already in progress")]
    CheckInProgress,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RunnerState,
    },
}

/// Session over one lesson for one user
pub struct StepRunner<S: Store> {
    lesson: Lesson,
    user_id: String,
    store: S,
    evaluator: Evaluator,
    code: CodeBuffer,
    state: RunnerState,
    last_result: ValidationResult,
    warnings: Vec<String>,
    stale: Arc<AtomicBool>,
    saving: Arc<AtomicBool>,
    subscription: Option<SubscriptionHandle>,
}

impl<S: Store> StepRunner<S> {
    /// Start at the first step with the lesson's starter code
    pub fn new(lesson: Lesson, user_id: &str, store: S) -> Self {
        let code = lesson.starter_code.clone();
        Self {
            lesson,
            user_id: user_id.to_string(),
            store,
            evaluator: Evaluator::default(),
            code,
            state: RunnerState::Viewing(0),
            last_result: ValidationResult::new(),
            warnings: Vec::new(),
            stale: Arc::new(AtomicBool::new(false)),
            saving: Arc::new(AtomicBool::new(false)),
            subscription: None,
        }
    }

    pub fn with_evaluator_config(mut self, config: EvaluatorConfig) -> Self {
        self.evaluator = Evaluator::new(config);
        self
    }

    /// Resume from saved progress. Missing progress starts at step 0;
    /// a failed read starts at step 0 and queues a warning.
    pub fn load_progress(&mut self) -> RunnerState {
        self.last_result = ValidationResult::new();
        self.state = match ProgressRecord::load(&self.store, &self.user_id, &self.lesson.slug) {
            Ok(Some(record)) => self.state_for(&record),
            Ok(None) => RunnerState::Viewing(0),
            Err(e) => {
                self.warn(format!("Could not load progress: {}", e));
                RunnerState::Viewing(0)
            }
        };
        debug!(
            "{} resumed '{}' at {}",
            self.user_id, self.lesson.slug, self.state
        );
        self.state
    }

    fn state_for(&self, record: &ProgressRecord) -> RunnerState {
        if record.completed {
            RunnerState::Completed
        } else {
            RunnerState::Viewing(record.current_step.min(self.lesson.last_index()))
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    /// The step being worked on; `None` once the lesson is completed
    pub fn current_step(&self) -> Option<&ExerciseStep> {
        self.state.index().and_then(|i| self.lesson.step(i))
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    /// Replace the source for one language
    pub fn edit(&mut self, language: Language, source: &str) {
        self.code.set(language, source);
    }

    /// Replace every buffer at once
    pub fn set_code(&mut self, code: CodeBuffer) {
        self.code = code;
    }

    /// Failures from the most recent check
    pub fn last_failures(&self) -> &ValidationResult {
        &self.last_result
    }

    /// Drain queued non-blocking warnings
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Check the current step's rules against the buffers
    pub fn check(&mut self) -> Result<ValidationResult, RunnerError> {
        let index = match self.state {
            RunnerState::Viewing(i) => i,
            RunnerState::Checking(_) => return Err(RunnerError::CheckInProgress),
            state => {
                return Err(RunnerError::InvalidTransition {
                    action: "check",
                    state,
                })
            }
        };

        self.state = RunnerState::Checking(index);
        let result = match self.lesson.step(index) {
            Some(step) => self.evaluator.evaluate(&self.code, &step.validation_rules),
            None => ValidationResult::new(),
        };

        self.state = if result.passed() {
            RunnerState::Passed(index)
        } else {
            RunnerState::Viewing(index)
        };
        debug!(
            "check of step {} in '{}': {} failures",
            index + 1,
            self.lesson.slug,
            result.len()
        );

        self.last_result = result.clone();
        Ok(result)
    }

    /// Continue past a passed step
    pub fn advance(&mut self) -> Result<RunnerState, RunnerError> {
        let index = match self.state {
            RunnerState::Passed(i) => i,
            state => {
                return Err(RunnerError::InvalidTransition {
                    action: "advance",
                    state,
                })
            }
        };

        self.state = if index >= self.lesson.last_index() {
            RunnerState::Completed
        } else {
            RunnerState::Viewing(index + 1)
        };
        self.last_result = ValidationResult::new();
        self.persist();
        Ok(self.state)
    }

    fn record(&self) -> ProgressRecord {
        let mut record = ProgressRecord::start(&self.user_id, &self.lesson.slug);
        match self.state {
            RunnerState::Completed => {
                record.current_step = self.lesson.last_index();
                record.completed = true;
            }
            state => record.current_step = state.index().unwrap_or(0),
        }
        record
    }

    fn persist(&mut self) {
        let mut record = self.record();
        self.saving.store(true, Ordering::SeqCst);
        let saved = record.save(&mut self.store);
        self.saving.store(false, Ordering::SeqCst);
        if let Err(e) = saved {
            self.warn(format!("Could not save progress: {}", e));
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Subscribe to remote changes of this user's progress row.
    /// Notifications only mark the session stale; call [`sync`](Self::sync) to re-read.
    /// The runner's own saves do not count as changes.
    pub fn watch_progress(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let stale = Arc::clone(&self.stale);
        let saving = Arc::clone(&self.saving);
        let filter = ProgressRecord::filter(&self.user_id, &self.lesson.slug);
        match self.store.subscribe(
            PROGRESS_TABLE,
            filter,
            Box::new(move |_| {
                if !saving.load(Ordering::SeqCst) {
                    stale.store(true, Ordering::SeqCst);
                }
            }),
        ) {
            Ok(handle) => self.subscription = Some(handle),
            Err(e) => self.warn(format!("Could not watch progress: {}", e)),
        }
    }

    /// True when a change notification arrived since the last sync
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Re-read saved progress. Only moves forward; a stored position
    /// behind the local one is ignored.
    pub fn sync(&mut self) -> RunnerState {
        self.stale.store(false, Ordering::SeqCst);
        match ProgressRecord::load(&self.store, &self.user_id, &self.lesson.slug) {
            Ok(Some(remote)) => {
                if remote.position() > self.record().position() {
                    debug!("progress for '{}' moved remotely", self.lesson.slug);
                    self.state = self.state_for(&remote);
                    self.last_result = ValidationResult::new();
                }
            }
            Ok(None) => {}
            Err(e) => self.warn(format!("Could not refresh progress: {}", e)),
        }
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: Store> Drop for StepRunner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::FailureKind;
    use crate::store::{ChangeCallback, Filter, MemoryStore, Record, StoreError};

    const LESSON: &str = r#"
slug: first-page
title: First page
starter_code:
  html: "<body></body>"
steps:
  - step: 1
    instruction: Add a heading
    validation_rules:
      html:
        - type: contains
          value: "<h1>"
  - step: 2
    instruction: Give the heading an id
    validation_rules:
      html:
        - type: mustHaveIds
          ids: [title]
"#;

    fn lesson() -> Lesson {
        Lesson::from_yaml(LESSON).unwrap()
    }

    fn runner() -> StepRunner<MemoryStore> {
        StepRunner::new(lesson(), "u1", MemoryStore::new())
    }

    /// Store whose every call fails
    struct BrokenStore;

    impl Store for BrokenStore {
        fn get(&self, _: &str, _: &Filter) -> Result<Option<Record>, StoreError> {
            Err(StoreError::Invalid("backend unavailable".to_string()))
        }

        fn upsert(&mut self, _: &str, _: Record, _: &[&str]) -> Result<(), StoreError> {
            Err(StoreError::Invalid("backend unavailable".to_string()))
        }

        fn subscribe(
            &mut self,
            _: &str,
            _: Filter,
            _: ChangeCallback,
        ) -> Result<SubscriptionHandle, StoreError> {
            Err(StoreError::Invalid("backend unavailable".to_string()))
        }

        fn unsubscribe(&mut self, _: SubscriptionHandle) -> bool {
            false
        }
    }

    #[test]
    fn test_starts_viewing_first_step_with_starter_code() {
        let mut runner = runner();
        assert_eq!(runner.load_progress(), RunnerState::Viewing(0));
        assert_eq!(runner.code().get(Language::Html), "<body></body>");
        assert_eq!(runner.current_step().unwrap().step_number, 1);
    }

    #[test]
    fn test_failed_check_returns_to_viewing() {
        let mut runner = runner();
        let result = runner.check().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.failures()[0].kind, FailureKind::RuleViolation);
        assert_eq!(runner.state(), RunnerState::Viewing(0));
        assert_eq!(runner.last_failures().len(), 1);
    }

    #[test]
    fn test_full_lesson_walkthrough_persists_progress() {
        let mut runner = runner();
        runner.edit(Language::Html, "<h1>Hello</h1>");
        assert!(runner.check().unwrap().passed());
        assert_eq!(runner.state(), RunnerState::Passed(0));

        assert_eq!(runner.advance().unwrap(), RunnerState::Viewing(1));
        let saved = ProgressRecord::load(runner.store(), "u1", "first-page")
            .unwrap()
            .unwrap();
        assert_eq!(saved.current_step, 1);
        assert!(!saved.completed);

        runner.edit(Language::Html, r#"<h1 id="title">Hello</h1>"#);
        assert!(runner.check().unwrap().passed());
        assert_eq!(runner.advance().unwrap(), RunnerState::Completed);
        assert!(runner.current_step().is_none());

        let saved = ProgressRecord::load(runner.store(), "u1", "first-page")
            .unwrap()
            .unwrap();
        assert!(saved.completed);
        assert!(runner.take_warnings().is_empty());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut runner = runner();
        assert_eq!(
            runner.advance(),
            Err(RunnerError::InvalidTransition {
                action: "advance",
                state: RunnerState::Viewing(0)
            })
        );

        runner.edit(Language::Html, "<h1>x</h1>");
        runner.check().unwrap();
        assert!(matches!(
            runner.check(),
            Err(RunnerError::InvalidTransition { action: "check", .. })
        ));

        runner.state = RunnerState::Checking(0);
        assert_eq!(runner.check(), Err(RunnerError::CheckInProgress));
    }

    #[test]
    fn test_resume_from_saved_progress() {
        let mut store = MemoryStore::new();
        let mut record = ProgressRecord::start("u1", "first-page");
        record.current_step = 1;
        record.save(&mut store).unwrap();

        let mut runner = StepRunner::new(lesson(), "u1", store);
        assert_eq!(runner.load_progress(), RunnerState::Viewing(1));
    }

    #[test]
    fn test_resume_clamps_out_of_range_step() {
        let mut store = MemoryStore::new();
        let mut record = ProgressRecord::start("u1", "first-page");
        record.current_step = 7;
        record.save(&mut store).unwrap();

        let mut runner = StepRunner::new(lesson(), "u1", store);
        assert_eq!(runner.load_progress(), RunnerState::Viewing(1));
    }

    #[test]
    fn test_resume_completed() {
        let mut store = MemoryStore::new();
        let mut record = ProgressRecord::start("u1", "first-page");
        record.completed = true;
        record.save(&mut store).unwrap();

        let mut runner = StepRunner::new(lesson(), "u1", store);
        assert_eq!(runner.load_progress(), RunnerState::Completed);
    }

    #[test]
    fn test_broken_store_does_not_block() {
        let mut runner = StepRunner::new(lesson(), "u1", BrokenStore);
        assert_eq!(runner.load_progress(), RunnerState::Viewing(0));
        assert_eq!(runner.take_warnings().len(), 1);

        runner.edit(Language::Html, "<h1>x</h1>");
        assert!(runner.check().unwrap().passed());
        assert_eq!(runner.advance().unwrap(), RunnerState::Viewing(1));

        let warnings = runner.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Could not save progress"));
        assert!(runner.take_warnings().is_empty());
    }

    #[test]
    fn test_sync_moves_forward_only() {
        let mut runner = runner();
        runner.watch_progress();
        assert!(!runner.is_stale());

        // Another session finished the first step
        let mut remote = ProgressRecord::start("u1", "first-page");
        remote.current_step = 1;
        remote.save(runner.store_mut()).unwrap();
        assert!(runner.is_stale());
        assert_eq!(runner.sync(), RunnerState::Viewing(1));
        assert!(!runner.is_stale());

        // A stale write behind us is ignored
        let mut behind = ProgressRecord::start("u1", "first-page");
        behind.save(runner.store_mut()).unwrap();
        assert_eq!(runner.sync(), RunnerState::Viewing(1));
    }

    #[test]
    fn test_own_progress_writes_are_not_stale() {
        let mut runner = runner();
        runner.watch_progress();
        runner.edit(Language::Html, "<h1>x</h1>");
        runner.check().unwrap();
        assert_eq!(runner.advance().unwrap(), RunnerState::Viewing(1));
        assert!(!runner.is_stale());

        // A write from elsewhere still shows up
        let mut remote = ProgressRecord::start("u1", "first-page");
        remote.completed = true;
        remote.save(runner.store_mut()).unwrap();
        assert!(runner.is_stale());
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut runner = runner();
        runner.edit(Language::Html, "<h1>x</h1>");
        runner.check().unwrap();
        runner.advance().unwrap();
        assert_eq!(runner.sync(), RunnerState::Viewing(1));
        assert_eq!(runner.sync(), RunnerState::Viewing(1));
    }
}
