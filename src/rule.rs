//! Declarative validation rules

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A validation rule, selected by its `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum Rule {
    /// Code must contain `value` literally
    Contains { value: String },

    /// Markup must define an element for every id
    MustHaveIds { ids: Vec<String> },

    /// Stylesheet must set `property: value` inside a `selector { ... }` block
    CssProperty {
        selector: String,
        property: String,
        value: String,
    },

    /// Code must match `pattern` (case-insensitive)
    RegexMatch { pattern: String },

    /// Trimmed code must equal `value`
    ExactMatch { value: String },

    /// Unrecognized rule type; always reported, never skipped
    Unknown {
        kind: String,
        fields: Map<String, Value>,
    },
}

impl Rule {
    pub fn contains(value: &str) -> Self {
        Rule::Contains {
            value: value.to_string(),
        }
    }

    pub fn must_have_ids(ids: &[&str]) -> Self {
        Rule::MustHaveIds {
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn css_property(selector: &str, property: &str, value: &str) -> Self {
        Rule::CssProperty {
            selector: selector.to_string(),
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Rule::RegexMatch {
            pattern: pattern.to_string(),
        }
    }

    pub fn exact(value: &str) -> Self {
        Rule::ExactMatch {
            value: value.to_string(),
        }
    }

    pub fn unknown(kind: &str) -> Self {
        Rule::Unknown {
            kind: kind.to_string(),
            fields: Map::new(),
        }
    }

    /// The `type` tag of this rule
    pub fn kind(&self) -> &str {
        match self {
            Rule::Contains { .. } => "contains",
            Rule::MustHaveIds { .. } => "mustHaveIds",
            Rule::CssProperty { .. } => "cssProperty",
            Rule::RegexMatch { .. } => "regex",
            Rule::ExactMatch { .. } => "exactMatch",
            Rule::Unknown { kind, .. } => kind,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Rule::Unknown { .. })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Contains { value } => write!(f, "contains {:?}", value),
            Rule::MustHaveIds { ids } => write!(f, "has ids [{}]", ids.join(", ")),
            Rule::CssProperty {
                selector,
                property,
                value,
            } => write!(f, "{} {{ {}: {} }}", selector, property, value),
            Rule::RegexMatch { pattern } => write!(f, "matches /{}/i", pattern),
            Rule::ExactMatch { value } => write!(f, "equals {:?}", value),
            Rule::Unknown { kind, .. } => write!(f, "unknown rule type {:?}", kind),
        }
    }
}

/// Wire form of a rule: the tag plus its remaining fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn take_string(fields: &mut Map<String, Value>, kind: &str, key: &str) -> Result<String, String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(format!(
            "rule '{}': field '{}' must be a string, got {}",
            kind, key, other
        )),
        None => Err(format!("rule '{}' is missing field '{}'", kind, key)),
    }
}

fn take_string_list(
    fields: &mut Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<Vec<String>, String> {
    match fields.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(format!(
                    "rule '{}': entries of '{}' must be strings, got {}",
                    kind, key, other
                )),
            })
            .collect(),
        Some(Value::String(s)) => Ok(vec![s]),
        Some(other) => Err(format!(
            "rule '{}': field '{}' must be a list, got {}",
            kind, key, other
        )),
        None => Err(format!("rule '{}' is missing field '{}'", kind, key)),
    }
}

impl TryFrom<RawRule> for Rule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let RawRule { kind, mut fields } = raw;
        let rule = match kind.as_str() {
            "contains" => Rule::Contains {
                value: take_string(&mut fields, &kind, "value")?,
            },
            "mustHaveIds" => Rule::MustHaveIds {
                ids: take_string_list(&mut fields, &kind, "ids")?,
            },
            "cssProperty" | "cssPropertyRule" => Rule::CssProperty {
                selector: take_string(&mut fields, &kind, "selector")?,
                property: take_string(&mut fields, &kind, "property")?,
                value: take_string(&mut fields, &kind, "value")?,
            },
            "regex" | "regexMatch" => Rule::RegexMatch {
                pattern: take_string(&mut fields, &kind, "pattern")?,
            },
            "exactMatch" | "exact" => Rule::ExactMatch {
                value: take_string(&mut fields, &kind, "value")?,
            },
            _ => Rule::Unknown { kind, fields },
        };
        Ok(rule)
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> Self {
        let kind = rule.kind().to_string();
        let mut fields = Map::new();
        match rule {
            Rule::Contains { value } | Rule::ExactMatch { value } => {
                fields.insert("value".into(), Value::String(value));
            }
            Rule::MustHaveIds { ids } => {
                fields.insert(
                    "ids".into(),
                    Value::Array(ids.into_iter().map(Value::String).collect()),
                );
            }
            Rule::CssProperty {
                selector,
                property,
                value,
            } => {
                fields.insert("selector".into(), Value::String(selector));
                fields.insert("property".into(), Value::String(property));
                fields.insert("value".into(), Value::String(value));
            }
            Rule::RegexMatch { pattern } => {
                fields.insert("pattern".into(), Value::String(pattern));
            }
            Rule::Unknown { fields: extra, .. } => fields = extra,
        }
        RawRule { kind, fields }
    }
}
