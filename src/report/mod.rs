//! Report rendering.
//!
//! Both renderers take a finished [`EvaluationResult`](crate::evaluation::EvaluationResult)
//! and produce a standalone document: HTML for the browser, PDF for download.

mod html;
mod pdf;

pub use html::HtmlRenderer;
pub use pdf::{PDF_FILENAME, PdfRenderer, font_paths};

/// Format a score in `[0, 1]` as a percentage with one decimal place.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
