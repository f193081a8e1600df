//! Report page layout
//!
//! Computes every text item and its position before any PDF is produced.
//! Coordinates are millimetres from the top-left corner of an A4 page.

use aerisk_common::prediction::format_predictions;
use aerisk_common::{PredictionResult, RiskTier};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;
pub const PRINTABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Lowest baseline usable by content; below it sits the footer
pub const CONTENT_BOTTOM_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM - 8.0;
pub const FOOTER_BASELINE_MM: f32 = PAGE_HEIGHT_MM - 10.0;

pub const TITLE_PT: f32 = 18.0;
pub const HEADING_PT: f32 = 12.0;
pub const BODY_PT: f32 = 11.0;
pub const CSV_PT: f32 = 8.0;
pub const FOOTER_PT: f32 = 8.0;

pub const CSV_PREVIEW_LINES: usize = 50;

pub const REPORT_TITLE: &str = "Prediction Report";
pub const INPUT_DATA_TITLE: &str = "Input Data";
pub const FOOTER_TEXT: &str = "Generated by Aerisk - Aviation Risk Analysis & Fault Prediction";

const MM_PER_PT: f32 = 0.3528;
const LINE_SPACING: f32 = 1.4;
const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const GREY: (f32, f32, f32) = (0.4, 0.4, 0.4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Title,
    Heading,
    Field,
    Body,
    Risk,
    Prediction,
    CsvLine,
    Notice,
    Footer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub kind: ItemKind,
    pub text: String,
    pub x_mm: f32,
    /// Baseline, measured from the top edge
    pub y_mm: f32,
    pub size_pt: f32,
    pub bold: bool,
    pub color: (f32, f32, f32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPage {
    pub items: Vec<TextItem>,
}

impl ReportPage {
    pub fn texts(&self, kind: ItemKind) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDocument {
    pub pages: Vec<ReportPage>,
}

/// Data the report is built from
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub result: &'a PredictionResult,
    pub file_name: &'a str,
    /// Raw CSV captured at upload time
    pub csv_text: Option<&'a str>,
}

fn line_height(size_pt: f32) -> f32 {
    size_pt * MM_PER_PT * LINE_SPACING
}

/// Approximate Helvetica width of `text` at `size_pt`
fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * MM_PER_PT * 0.5
}

/// Characters that fit in the printable width at `size_pt`
pub fn chars_per_line(size_pt: f32) -> usize {
    ((PRINTABLE_WIDTH_MM / (size_pt * MM_PER_PT * 0.5)).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than a line are hard-split
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    // A trailing empty line carries no content
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Cursor over pages; starts a new page when content would pass the bottom
struct PageWriter {
    pages: Vec<ReportPage>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: vec![ReportPage::default()],
            y: MARGIN_MM,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(ReportPage::default());
        self.y = MARGIN_MM;
    }

    fn remaining(&self) -> f32 {
        CONTENT_BOTTOM_MM - self.y
    }

    fn gap(&mut self, mm: f32) {
        self.y += mm;
    }

    fn write(
        &mut self,
        kind: ItemKind,
        text: &str,
        size_pt: f32,
        bold: bool,
        color: (f32, f32, f32),
    ) {
        let height = line_height(size_pt);
        if self.y + height > CONTENT_BOTTOM_MM {
            self.new_page();
        }
        self.y += height;
        let item = TextItem {
            kind,
            text: text.to_string(),
            x_mm: MARGIN_MM,
            y_mm: self.y,
            size_pt,
            bold,
            color,
        };
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn write_wrapped(&mut self, kind: ItemKind, text: &str, size_pt: f32, color: (f32, f32, f32)) {
        for line in wrap_text(text, chars_per_line(size_pt)) {
            self.write(kind, &line, size_pt, false, color);
        }
    }

    /// Same footer on every page, centred
    fn finish(mut self) -> ReportDocument {
        let x = ((PAGE_WIDTH_MM - text_width_mm(FOOTER_TEXT, FOOTER_PT)) / 2.0).max(MARGIN_MM);
        for page in &mut self.pages {
            page.items.push(TextItem {
                kind: ItemKind::Footer,
                text: FOOTER_TEXT.to_string(),
                x_mm: x,
                y_mm: FOOTER_BASELINE_MM,
                size_pt: FOOTER_PT,
                bold: false,
                color: GREY,
            });
        }
        ReportDocument { pages: self.pages }
    }
}

/// Lay out the results page and, when CSV text was captured, the input page
pub fn layout_report(input: ReportInput<'_>) -> ReportDocument {
    let result = input.result;
    let mut w = PageWriter::new();

    w.write(ItemKind::Title, REPORT_TITLE, TITLE_PT, true, BLACK);
    w.gap(3.0);

    let model = result.model().unwrap_or("Unknown");
    w.write(ItemKind::Field, &format!("Model: {}", model), BODY_PT, false, BLACK);
    w.write(ItemKind::Field, &format!("File: {}", input.file_name), BODY_PT, false, BLACK);
    w.write(
        ItemKind::Field,
        &format!("Rows: {}", result.rows().unwrap_or(0)),
        BODY_PT,
        false,
        BLACK,
    );
    w.gap(3.0);

    w.write(ItemKind::Heading, "Summary", HEADING_PT, true, BLACK);
    w.write_wrapped(
        ItemKind::Body,
        result.summary().unwrap_or("No summary available."),
        BODY_PT,
        BLACK,
    );

    if let Some(risk) = result.risk_level() {
        w.gap(3.0);
        let tier = RiskTier::classify(Some(risk));
        w.write(ItemKind::Risk, &format!("Risk Level: {}", risk), HEADING_PT, true, tier.rgb());
    }

    let predictions: Vec<String> = match result.prediction() {
        Some(prediction) => format_predictions(prediction)
            .iter()
            .flat_map(|line| wrap_text(line, chars_per_line(BODY_PT)))
            .collect(),
        None => vec!["No predictions returned.".to_string()],
    };

    w.gap(3.0);
    let block = line_height(HEADING_PT) + predictions.len() as f32 * line_height(BODY_PT);
    if block > w.remaining() {
        w.new_page();
    }
    w.write(ItemKind::Heading, "Predictions", HEADING_PT, true, BLACK);
    for line in &predictions {
        w.write(ItemKind::Prediction, line, BODY_PT, false, BLACK);
    }

    if let Some(csv) = input.csv_text {
        w.new_page();
        w.write(ItemKind::Title, INPUT_DATA_TITLE, TITLE_PT, true, BLACK);
        w.gap(2.0);

        let total = csv.lines().count();
        for line in csv.lines().take(CSV_PREVIEW_LINES) {
            w.write_wrapped(ItemKind::CsvLine, line, CSV_PT, BLACK);
        }

        if total > CSV_PREVIEW_LINES {
            w.gap(2.0);
            w.write(
                ItemKind::Notice,
                &format!(
                    "... {} more lines not shown (showing first {} of {})",
                    total - CSV_PREVIEW_LINES,
                    CSV_PREVIEW_LINES,
                    total
                ),
                CSV_PT,
                false,
                GREY,
            );
        }
    }

    w.finish()
}
