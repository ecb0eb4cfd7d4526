//! HTML inspection for structural checks
//!
//! Each call parses into its own throwaway document; nothing is shared
//! between checks.

use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;

/// Error inspecting markup
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Collect every element id defined in an HTML document
pub fn element_ids(html: &str) -> Result<HashSet<String>, MarkupError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("[id]").map_err(|e| MarkupError::Selector {
        selector: "[id]".to_string(),
        message: e.to_string(),
    })?;

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().id())
        .map(String::from)
        .collect())
}

/// Ids from `wanted` that no element defines, in the order given
pub fn missing_ids<'a>(html: &str, wanted: &'a [String]) -> Result<Vec<&'a str>, MarkupError> {
    let present = element_ids(html)?;
    Ok(wanted
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .map(String::as_str)
        .collect())
}
