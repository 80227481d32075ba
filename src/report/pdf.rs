//! PDF reports rendered with genpdf.

use super::{format_percent, truncate_chars};
use crate::config::ReportConfig;
use crate::error::{EvaluatorError, Result};
use crate::evaluation::EvaluationResult;
use chrono::{DateTime, Local};
use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Document, Element as _, PaperSize, SimplePageDecorator};
use std::path::{Path, PathBuf};

/// File name offered for download.
pub const PDF_FILENAME: &str = "rag_evaluation_report.pdf";

const QUESTION_CHARS: usize = 200;
const ANSWER_CHARS: usize = 300;
const PRIMARY: Color = Color::Rgb(0, 123, 255);

/// Regular and bold font files for `config`.
pub fn font_paths(config: &ReportConfig) -> (PathBuf, PathBuf) {
    let dir = &config.fonts_dir;
    (
        dir.join(format!("{}-Regular.ttf", config.font_family)),
        dir.join(format!("{}-Bold.ttf", config.font_family)),
    )
}

fn load_font(path: &Path) -> Result<FontData> {
    if !path.exists() {
        return Err(EvaluatorError::Font {
            path: path.to_path_buf(),
            message: "file not found (run `rag-evaluator fetch-fonts`)".to_string(),
        });
    }
    FontData::load(path, None).map_err(|e| EvaluatorError::Font {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Renders evaluation results as a PDF document.
pub struct PdfRenderer {
    fonts: FontFamily<FontData>,
}

impl PdfRenderer {
    /// Load the regular and bold weights; italics reuse them.
    pub fn load(config: &ReportConfig) -> Result<Self> {
        let (regular_path, bold_path) = font_paths(config);
        let regular = load_font(&regular_path)?;
        let bold = load_font(&bold_path)?;

        Ok(Self {
            fonts: FontFamily {
                italic: regular.clone(),
                bold_italic: bold.clone(),
                regular,
                bold,
            },
        })
    }

    /// Render the report: title, timestamp, metrics table and results table.
    pub fn render(&self, result: &EvaluationResult, generated_at: DateTime<Local>) -> Result<Vec<u8>> {
        let mut doc = Document::new(self.fonts.clone());
        doc.set_title("RAG Evaluation Report");
        doc.set_paper_size(PaperSize::Letter);
        doc.set_font_size(10);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(25);
        doc.set_page_decorator(decorator);

        doc.push(
            Paragraph::new(StyledString::new(
                "RAG Evaluation Report",
                Style::new().bold().with_font_size(24),
            ))
            .aligned(Alignment::Center),
        );
        doc.push(Break::new(1.5));
        doc.push(Paragraph::new(format!(
            "Generated on: {}",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        )));
        doc.push(Break::new(1.5));

        doc.push(heading("Performance Metrics"));
        doc.push(Break::new(0.5));
        doc.push(metrics_table(result)?);
        doc.push(Break::new(2));

        doc.push(heading("Detailed Evaluation Results"));
        doc.push(Break::new(0.5));
        doc.push(results_table(result)?);

        let mut buffer = Vec::new();
        doc.render(&mut buffer)?;
        tracing::info!(bytes = buffer.len(), "PDF report rendered");
        Ok(buffer)
    }
}

fn heading(text: &str) -> Paragraph {
    Paragraph::new(StyledString::new(text, Style::new().bold().with_font_size(16)))
}

fn header_cell(text: &str) -> impl genpdf::Element {
    Paragraph::new(StyledString::new(
        text,
        Style::new().bold().with_font_size(12).with_color(PRIMARY),
    ))
    .padded(2)
}

fn cell(text: impl Into<String>) -> impl genpdf::Element {
    Paragraph::new(text.into()).padded(2)
}

fn metrics_table(result: &EvaluationResult) -> Result<TableLayout> {
    let mut table = TableLayout::new(vec![2, 1]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    table
        .row()
        .element(header_cell("Metric"))
        .element(header_cell("Score"))
        .push()?;

    for (name, value) in result.metrics.entries() {
        table
            .row()
            .element(cell(name))
            .element(
                Paragraph::new(format_percent(value))
                    .aligned(Alignment::Center)
                    .padded(2),
            )
            .push()?;
    }

    Ok(table)
}

fn results_table(result: &EvaluationResult) -> Result<TableLayout> {
    let mut table = TableLayout::new(vec![8, 9, 9]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    table
        .row()
        .element(header_cell("User Query"))
        .element(header_cell("Generated Response"))
        .element(header_cell("Reference Answer"))
        .push()?;

    for outcome in &result.outcomes {
        table
            .row()
            .element(cell(truncate_chars(&outcome.question, QUESTION_CHARS)))
            .element(cell(truncate_chars(&outcome.produced_answer(), ANSWER_CHARS)))
            .element(cell(truncate_chars(&outcome.reference_answer, ANSWER_CHARS)))
            .push()?;
    }

    Ok(table)
}
