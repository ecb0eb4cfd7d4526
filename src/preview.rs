//! Live preview document
//!
//! Combines the three code buffers into one standalone HTML page:
//! stylesheet in `<head>`, markup and script in `<body>`.

use crate::exercise::{CodeBuffer, Language};
use regex::Regex;
use std::sync::LazyLock;

/// Closing `</style` or `</script`, any case
static CLOSING_RAW_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(style|script)").unwrap());

/// Keep a raw-text buffer from closing its wrapper element early
fn escape_raw_text(text: &str) -> String {
    CLOSING_RAW_TAG.replace_all(text, r"<\/$1").into_owned()
}

/// Render the preview page for `code`
pub fn render(code: &CodeBuffer) -> String {
    let css = escape_raw_text(code.get(Language::Css));
    let js = escape_raw_text(code.get(Language::Js));
    let html = code.get(Language::Html);

    format!(
        "<!DOCTYPE html><html><head><style>{}</style></head><body>{}<script>{}</script></body></html>",
        css, html, js
    )
}
