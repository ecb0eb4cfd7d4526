//! Rule evaluation over submitted code
//!
//! Every rule of every language is applied; failures are collected in
//! declaration order and nothing short-circuits.

use crate::config::EvaluatorConfig;
use crate::diagnostic::{Failure, FailureKind, ValidationResult};
use crate::exercise::{CodeBuffer, Language, RuleSet};
use crate::markup;
use crate::rule::Rule;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::collections::HashMap;

/// Evaluate `rules` against `code` with default settings
pub fn evaluate(code: &CodeBuffer, rules: &RuleSet) -> ValidationResult {
    Evaluator::default().evaluate(code, rules)
}

/// Rule evaluator with a per-instance cache of compiled patterns
#[derive(Debug, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
    patterns: RefCell<HashMap<String, Result<Regex, String>>>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            patterns: RefCell::new(HashMap::new()),
        }
    }

    /// Apply every rule in `rules` to the matching source in `code`
    pub fn evaluate(&self, code: &CodeBuffer, rules: &RuleSet) -> ValidationResult {
        let mut result = ValidationResult::new();

        for (language, language_rules) in rules.iter() {
            let source = if self.config.trim_code {
                code.get(language).trim()
            } else {
                code.get(language)
            };

            for rule in language_rules {
                result.extend(self.check(language, source, rule));
            }
        }

        debug!(
            "evaluated {} rules: {} failures",
            rules.rule_count(),
            result.len()
        );
        result
    }

    /// Apply a single rule to a single source text
    pub fn check(&self, language: Language, source: &str, rule: &Rule) -> Vec<Failure> {
        let kind = rule.kind();
        match rule {
            Rule::Contains { value } => {
                if source.contains(value.as_str()) {
                    Vec::new()
                } else {
                    vec![Failure::violation(
                        language,
                        kind,
                        format!("Code should contain \"{}\"", value),
                    )]
                }
            }

            Rule::MustHaveIds { ids } => match markup::missing_ids(source, ids) {
                Ok(missing) => missing
                    .into_iter()
                    .map(|id| {
                        Failure::violation(
                            language,
                            kind,
                            format!("Missing element with id \"{}\"", id),
                        )
                    })
                    .collect(),
                Err(e) => {
                    debug!("markup check failed: {}", e);
                    vec![Failure::new(
                        language,
                        kind,
                        FailureKind::ParseFailure,
                        "Could not parse HTML".to_string(),
                    )]
                }
            },

            Rule::CssProperty {
                selector,
                property,
                value,
            } => {
                let pattern = css_pattern(selector, property, value);
                match self.compiled(&pattern) {
                    Ok(re) if re.is_match(source) => Vec::new(),
                    Ok(_) => vec![Failure::violation(
                        language,
                        kind,
                        format!(
                            "Selector \"{}\" should set {}: {}",
                            selector, property, value
                        ),
                    )],
                    Err(e) => vec![Failure::new(
                        language,
                        kind,
                        FailureKind::InvalidPattern,
                        format!("Invalid CSS rule for \"{}\": {}", selector, e),
                    )],
                }
            }

            Rule::RegexMatch { pattern } => match self.compiled(pattern) {
                Ok(re) if re.is_match(source) => Vec::new(),
                Ok(_) => vec![Failure::violation(
                    language,
                    kind,
                    format!("Code does not match pattern /{}/", pattern),
                )],
                Err(e) => vec![Failure::new(
                    language,
                    kind,
                    FailureKind::InvalidPattern,
                    format!("Invalid validation pattern /{}/: {}", pattern, e),
                )],
            },

            Rule::ExactMatch { value } => {
                if source.trim() == value.trim() {
                    Vec::new()
                } else {
                    vec![Failure::violation(
                        language,
                        kind,
                        format!("Code should be exactly \"{}\"", value.trim()),
                    )]
                }
            }

            Rule::Unknown { kind, .. } => vec![Failure::new(
                language,
                kind,
                FailureKind::UnknownRule,
                format!("Unknown rule type \"{}\"", kind),
            )],
        }
    }

    /// Compile a case-insensitive pattern, caching both successes and errors
    fn compiled(&self, pattern: &str) -> Result<Regex, String> {
        if let Some(cached) = self.patterns.borrow().get(pattern) {
            return cached.clone();
        }

        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| e.to_string());
        self.patterns
            .borrow_mut()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

/// `selector { ... property : value` with other declarations allowed in between.
/// This is a textual match, not a CSS parse.
fn css_pattern(selector: &str, property: &str, value: &str) -> String {
    format!(
        r"{}\s*\{{[^}}]*{}\s*:\s*{}",
        regex::escape(selector.trim()),
        regex::escape(property.trim()),
        regex::escape(value.trim())
    )
}
