//! Lessons, exercise steps and code buffers

use crate::rule::Rule;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error loading lesson, level or program files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file: {0}")]
    Invalid(String),
}

/// Read a YAML or JSON file, picking the format from the extension
pub(crate) fn load_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        "json" => Ok(serde_json::from_str(&content)?),
        _ => Err(LoadError::Invalid(format!(
            "Unknown file format: {}",
            path.display()
        ))),
    }
}

/// Source language of a code buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    #[serde(alias = "javascript")]
    Js,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Html, Language::Css, Language::Js];

    /// Conventional file name for this language in a project directory
    pub fn file_name(self) -> &'static str {
        match self {
            Language::Html => "index.html",
            Language::Css => "style.css",
            Language::Js => "script.js",
        }
    }

    /// Language for a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "html" | "htm" => Some(Language::Html),
            "css" => Some(Language::Css),
            "js" | "mjs" => Some(Language::Js),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Html => write!(f, "html"),
            Language::Css => write!(f, "css"),
            Language::Js => write!(f, "js"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "js" | "javascript" => Ok(Language::Js),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

/// Current source text per language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeBuffer {
    sources: BTreeMap<Language, String>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, language: Language, source: &str) -> Self {
        self.set(language, source);
        self
    }

    pub fn set(&mut self, language: Language, source: &str) {
        self.sources.insert(language, source.to_string());
    }

    /// Source for a language; missing languages read as empty
    pub fn get(&self, language: Language) -> &str {
        self.sources.get(&language).map(String::as_str).unwrap_or("")
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.sources.keys().copied()
    }

    /// Load `index.html`, `style.css` and `script.js` from a directory.
    /// Missing files are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, LoadError> {
        let mut buffer = Self::new();
        for language in Language::ALL {
            let path = dir.join(language.file_name());
            if path.is_file() {
                buffer.set(language, &std::fs::read_to_string(&path)?);
            }
        }
        Ok(buffer)
    }
}

/// Rules per language, kept in the order they were declared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: Vec<(Language, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rules for a language. Repeated languages extend the existing entry.
    pub fn with(mut self, language: Language, rules: Vec<Rule>) -> Self {
        self.insert(language, rules);
        self
    }

    pub fn insert(&mut self, language: Language, rules: Vec<Rule>) {
        match self.entries.iter_mut().find(|(lang, _)| *lang == language) {
            Some((_, existing)) => existing.extend(rules),
            None => self.entries.push((language, rules)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Language, &[Rule])> {
        self.entries
            .iter()
            .map(|(lang, rules)| (*lang, rules.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, rules)| rules.is_empty())
    }

    pub fn rule_count(&self) -> usize {
        self.entries.iter().map(|(_, rules)| rules.len()).sum()
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (language, rules) in &self.entries {
            map.serialize_entry(language, rules)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleSetVisitor;

        impl<'de> Visitor<'de> for RuleSetVisitor {
            type Value = RuleSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of language to rule list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleSet, A::Error> {
                let mut set = RuleSet::new();
                while let Some((language, rules)) = access.next_entry::<Language, Vec<Rule>>()? {
                    set.insert(language, rules);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(RuleSetVisitor)
    }
}

/// One step of a lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseStep {
    #[serde(alias = "step")]
    pub step_number: u32,

    /// Text shown to the student
    #[serde(alias = "instructions")]
    pub instruction: String,

    #[serde(default)]
    pub validation_rules: RuleSet,

    /// Editors shown for this step
    #[serde(default)]
    pub lesson_types: BTreeSet<Language>,

    /// Optional hint shown after a failed check
    #[serde(default)]
    pub hint: Option<String>,
}

/// A lesson: an ordered list of steps identified by slug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub slug: String,

    #[serde(default)]
    pub title: String,

    /// Code loaded into the editors when the lesson starts
    #[serde(default)]
    pub starter_code: CodeBuffer,

    pub steps: Vec<ExerciseStep>,
}

impl Lesson {
    /// Load a lesson from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let lesson: Self = load_document(path)?;
        lesson.validate()?;
        Ok(lesson)
    }

    /// Parse a lesson from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, LoadError> {
        let lesson: Self = serde_yaml::from_str(content)?;
        lesson.validate()?;
        Ok(lesson)
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.slug.trim().is_empty() {
            return Err(LoadError::Invalid("lesson slug is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(LoadError::Invalid(format!(
                "lesson '{}' has no steps",
                self.slug
            )));
        }
        Ok(())
    }

    pub fn step(&self, index: usize) -> Option<&ExerciseStep> {
        self.steps.get(index)
    }

    /// Index of the step with the given number
    pub fn index_of(&self, step_number: u32) -> Option<usize> {
        self.steps.iter().position(|s| s.step_number == step_number)
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LESSON: &str = r#"
slug: html-basics
title: HTML basics
starter_code:
  html: "<body></body>"
steps:
  - step: 1
    instruction: Add a heading
    lesson_types: [html]
    validation_rules:
      html:
        - type: contains
          value: "<h1>"
  - step: 2
    instruction: Style it
    lesson_types: [html, css]
    validation_rules:
      css:
        - type: cssProperty
          selector: h1
          property: color
          value: red
      html:
        - type: mustHaveIds
          ids: [title]
"#;

    #[test]
    fn test_lesson_from_yaml() {
        let lesson = Lesson::from_yaml(LESSON).unwrap();
        assert_eq!(lesson.slug, "html-basics");
        assert_eq!(lesson.steps.len(), 2);
        assert_eq!(lesson.starter_code.get(Language::Html), "<body></body>");
        assert_eq!(lesson.index_of(2), Some(1));
        assert_eq!(lesson.last_index(), 1);
    }

    #[test]
    fn test_rule_set_keeps_declaration_order() {
        let lesson = Lesson::from_yaml(LESSON).unwrap();
        let languages: Vec<Language> = lesson.steps[1]
            .validation_rules
            .iter()
            .map(|(lang, _)| lang)
            .collect();
        assert_eq!(languages, vec![Language::Css, Language::Html]);
    }

    #[test]
    fn test_rule_set_json_order() {
        let json = r#"{"js": [{"type": "contains", "value": "let"}], "html": []}"#;
        let set: RuleSet = serde_json::from_str(json).unwrap();
        let languages: Vec<Language> = set.iter().map(|(lang, _)| lang).collect();
        assert_eq!(languages, vec![Language::Js, Language::Html]);
        assert_eq!(set.rule_count(), 1);
    }

    #[test]
    fn test_lesson_without_steps_is_invalid() {
        let err = Lesson::from_yaml("slug: empty\nsteps: []\n").unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_language_alias() {
        let lang: Language = serde_json::from_str("\"javascript\"").unwrap();
        assert_eq!(lang, Language::Js);
        assert_eq!("JS".parse::<Language>(), Ok(Language::Js));
        assert_eq!(Language::from_extension("htm"), Some(Language::Html));
    }

    #[test]
    fn test_code_buffer_missing_language_is_empty() {
        let buffer = CodeBuffer::new().with(Language::Html, "<p></p>");
        assert_eq!(buffer.get(Language::Html), "<p></p>");
        assert_eq!(buffer.get(Language::Css), "");
    }

    #[test]
    fn test_code_buffer_load_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.html"), "<h1>Hi</h1>").unwrap();
        std::fs::write(temp.path().join("style.css"), "h1 { color: red; }").unwrap();

        let buffer = CodeBuffer::load_dir(temp.path()).unwrap();
        assert_eq!(buffer.get(Language::Html), "<h1>Hi</h1>");
        assert_eq!(buffer.get(Language::Css), "h1 { color: red; }");
        assert_eq!(buffer.get(Language::Js), "");
    }
}
