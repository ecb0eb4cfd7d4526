//! Code directory watcher
//!
//! Watches the `index.html`, `style.css` and `script.js` files of a code
//! directory and reports which languages changed.

use crate::exercise::Language;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvError};
use std::time::Duration;

type DebounceResult = Result<Vec<DebouncedEvent>, notify::Error>;

/// Debounced watcher over one code directory
pub struct CodeWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<DebounceResult>,
    dir: PathBuf,
}

impl CodeWatcher {
    pub fn new(dir: &Path, debounce: Duration) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx)?;
        debouncer
            .watcher()
            .watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Block until a batch of events arrives. Returns the changed languages,
    /// empty when the batch touched no code file.
    pub fn wait(&self) -> Result<Vec<Language>, RecvError> {
        match self.receiver.recv()? {
            Ok(events) => Ok(self.changed_languages(events.iter().map(|e| e.path.as_path()))),
            Err(e) => {
                log::warn!("watch error on {}: {}", self.dir.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn changed_languages<'a>(&self, paths: impl Iterator<Item = &'a Path>) -> Vec<Language> {
        let mut changed = Vec::new();
        for path in paths {
            if !path.starts_with(&self.dir) {
                continue;
            }
            if let Some(language) = language_of(path) {
                if !changed.contains(&language) {
                    changed.push(language);
                }
            }
        }
        changed.sort();
        changed
    }
}

/// Language whose code file is at `path`
fn language_of(path: &Path) -> Option<Language> {
    let name = path.file_name()?;
    Language::ALL
        .into_iter()
        .find(|language| name == OsStr::new(language.file_name()))
}

/// Call `callback` once up front, then after every change to a code file.
/// Returns when the watcher shuts down.
pub fn watch_and_run<F>(dir: &Path, clear_screen: bool, mut callback: F) -> Result<(), notify::Error>
where
    F: FnMut(&[Language]),
{
    let watcher = CodeWatcher::new(dir, Duration::from_millis(300))?;

    if clear_screen {
        print!("\x1B[2J\x1B[1;1H");
    }
    callback(&Language::ALL);

    while let Ok(changed) = watcher.wait() {
        if changed.is_empty() {
            continue;
        }
        log::debug!("code changed: {:?}", changed);
        if clear_screen {
            print!("\x1B[2J\x1B[1;1H");
        }
        callback(&changed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        let watcher = CodeWatcher::new(temp.path(), Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.dir(), temp.path());
    }

    #[test]
    fn test_watch_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(CodeWatcher::new(&missing, Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_language_of() {
        assert_eq!(language_of(Path::new("/x/index.html")), Some(Language::Html));
        assert_eq!(language_of(Path::new("style.css")), Some(Language::Css));
        assert_eq!(language_of(Path::new("script.js")), Some(Language::Js));
        assert_eq!(language_of(Path::new("other.js")), None);
    }

    #[test]
    fn test_changed_languages_dedup_and_filter() {
        let temp = TempDir::new().unwrap();
        let watcher = CodeWatcher::new(temp.path(), Duration::from_millis(50)).unwrap();
        let js = temp.path().join("script.js");
        let html = temp.path().join("index.html");
        let notes = temp.path().join("notes.txt");
        let outside = PathBuf::from("/elsewhere/style.css");

        let changed = watcher.changed_languages(
            [js.as_path(), html.as_path(), js.as_path(), notes.as_path(), outside.as_path()]
                .into_iter(),
        );
        assert_eq!(changed, vec![Language::Html, Language::Js]);
    }
}
