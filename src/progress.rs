//! Lesson progress records

use crate::store::{get_as, upsert_as, Filter, Store, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Table holding one row per (user, lesson)
pub const PROGRESS_TABLE: &str = "progress";

const PROGRESS_KEYS: [&str; 2] = ["user_id", "lesson_slug"];

/// Saved position of a user within a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub lesson_slug: String,
    /// Zero-based index of the step being worked on
    pub current_step: usize,
    pub completed: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Fresh progress at the first step
    pub fn start(user_id: &str, lesson_slug: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            lesson_slug: lesson_slug.to_string(),
            current_step: 0,
            completed: false,
            updated_at: None,
        }
    }

    pub fn filter(user_id: &str, lesson_slug: &str) -> Filter {
        Filter::new()
            .eq("user_id", user_id)
            .eq("lesson_slug", lesson_slug)
    }

    /// Load saved progress; `None` when nothing was saved yet
    pub fn load(
        store: &dyn Store,
        user_id: &str,
        lesson_slug: &str,
    ) -> Result<Option<Self>, StoreError> {
        get_as(store, PROGRESS_TABLE, &Self::filter(user_id, lesson_slug))
    }

    /// Write this record, stamping `updated_at`
    pub fn save(&mut self, store: &mut dyn Store) -> Result<(), StoreError> {
        self.updated_at = Some(Utc::now());
        upsert_as(store, PROGRESS_TABLE, self, &PROGRESS_KEYS)
    }

    /// Ordering used when reconciling local and remote copies
    pub fn position(&self) -> (bool, usize) {
        (self.completed, self.current_step)
    }
}
