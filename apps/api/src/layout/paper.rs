//! Paper layout: flows an assembled paper onto fixed-size pages.
//!
//! The output is a list of positioned text runs and horizontal rules per
//! page, in PDF coordinates (origin bottom-left, baseline y). Rendering to
//! bytes is the `render` module's job; this module only decides positions.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::{get_metrics, FontFace, PageConfig};
use crate::papers::blueprint::PaperHeader;
use crate::papers::selector::{AssembledPaper, AssembledSection};

/// Width reserved at the right edge for a question's `(5)` marks column.
const MARKS_COLUMN_PT: f32 = 36.0;
/// Offset of the `a)` label from the left margin.
const LABEL_INSET_PT: f32 = 6.0;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub face: FontFace,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
    /// Full-width horizontal rules, by y coordinate.
    pub rules: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub pages: Vec<PageLayout>,
}

// ────────────────────────────────────────────────────────────────────────────
// Flow cursor
// ────────────────────────────────────────────────────────────────────────────

struct Flow<'a> {
    config: &'a PageConfig,
    pages: Vec<PageLayout>,
    current: PageLayout,
    /// Baseline of the next line to place.
    y: f32,
}

impl<'a> Flow<'a> {
    fn new(config: &'a PageConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
            current: PageLayout::default(),
            y: config.page_height_pt - config.margin_pt,
        }
    }

    fn bottom(&self) -> f32 {
        self.config.margin_pt
    }

    fn top(&self) -> f32 {
        self.config.page_height_pt - self.config.margin_pt
    }

    fn left(&self) -> f32 {
        self.config.margin_pt
    }

    fn right(&self) -> f32 {
        self.config.page_width_pt - self.config.margin_pt
    }

    /// Starts a new page unless `height` more points fit on this one.
    /// Content taller than a whole page is placed anyway.
    fn ensure(&mut self, height: f32) {
        let page_empty = self.current.runs.is_empty() && self.current.rules.is_empty();
        if self.y - height < self.bottom() && !page_empty {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y = self.top();
    }

    fn advance(&mut self, height: f32) {
        self.y -= height;
    }

    fn put(&mut self, text: impl Into<String>, x: f32, face: FontFace, size: f32) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current.runs.push(TextRun {
            text,
            x,
            y: self.y,
            face,
            size,
        });
    }

    fn put_centered(&mut self, text: &str, face: FontFace, size: f32) {
        let width = get_metrics(face).measure_pt(text, size);
        let x = self.left() + ((self.right() - self.left()) - width).max(0.0) / 2.0;
        self.put(text, x, face, size);
    }

    fn put_right(&mut self, text: &str, right_edge: f32, face: FontFace, size: f32) {
        let width = get_metrics(face).measure_pt(text, size);
        self.put(text, (right_edge - width).max(self.left()), face, size);
    }

    fn rule(&mut self) {
        let y = self.y;
        self.current.rules.push(y);
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.runs.is_empty() || !self.current.rules.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Layout
// ────────────────────────────────────────────────────────────────────────────

pub fn layout_paper(header: &PaperHeader, paper: &AssembledPaper, config: &PageConfig) -> PaperLayout {
    let mut flow = Flow::new(config);

    place_header(&mut flow, header);
    for section in paper.sections.iter().filter(|s| !s.questions.is_empty()) {
        place_section(&mut flow, section);
    }

    let mut pages = flow.finish();
    number_pages(&mut pages, config);

    PaperLayout {
        page_width: config.page_width_pt,
        page_height: config.page_height_pt,
        margin: config.margin_pt,
        pages,
    }
}

fn place_header(flow: &mut Flow<'_>, header: &PaperHeader) {
    let title = flow.config.title_size_pt;
    let body = flow.config.body_size_pt;
    let title_leading = flow.config.leading(title);
    let body_leading = flow.config.leading(body);

    flow.advance(title);
    if !header.department.is_empty() {
        flow.put_centered(&header.department, FontFace::Bold, title);
        flow.advance(title_leading);
    }

    let exam_line = if header.test_name.is_empty() {
        header.exam_label.clone()
    } else {
        format!("{} - {}", header.test_name, header.exam_label)
    };
    flow.put_centered(&exam_line, FontFace::Bold, body + 1.0);
    flow.advance(body_leading);

    let subject_line = if header.subject_code.is_empty() {
        format!("Subject: {}", header.subject)
    } else {
        format!("Subject: {} ({})", header.subject, header.subject_code)
    };
    flow.put_centered(&subject_line, FontFace::Regular, body);
    flow.advance(body_leading * 1.5);

    let right = flow.right();
    let left = flow.left();

    flow.put(
        labelled("Academic Year", &header.academic_year),
        left,
        FontFace::Regular,
        body,
    );
    flow.put_right(&labelled("Date", &header.date), right, FontFace::Regular, body);
    flow.advance(body_leading);

    let mut term_line = labelled("Term", &header.term);
    if !header.division.is_empty() {
        if !term_line.is_empty() {
            term_line.push_str("    ");
        }
        term_line.push_str(&labelled("Division", &header.division));
    }
    flow.put(term_line, left, FontFace::Regular, body);
    flow.put_right(
        &format!("Max Marks: {}", header.max_marks),
        right,
        FontFace::Bold,
        body,
    );
    flow.advance(body_leading);

    if !header.duration.is_empty() {
        flow.put(
            labelled("Duration", &header.duration),
            left,
            FontFace::Regular,
            body,
        );
        flow.advance(body_leading);
    }

    flow.advance(body_leading * 0.25);
    flow.rule();
    flow.advance(body_leading * 1.25);
}

fn place_section(flow: &mut Flow<'_>, section: &AssembledSection) {
    let body = flow.config.body_size_pt;
    let leading = flow.config.leading(body);
    let left = flow.left();
    let right = flow.right();
    let metrics = get_metrics(FontFace::Regular);

    let text_x = left + flow.config.question_indent_pt;
    let text_width = (right - MARKS_COLUMN_PT) - text_x;

    // Heading plus the first question stay together.
    let first_lines = section
        .questions
        .first()
        .map(|q| metrics.wrap_text(&q.question, body, text_width).len().max(1))
        .unwrap_or(1);
    flow.ensure(leading * (2 + first_lines) as f32);

    let heading = if section.questions_to_attempt > 0 {
        format!(
            "Q{}. Attempt any {} of the following.",
            section.number, section.questions_to_attempt
        )
    } else {
        format!("Q{}.", section.number)
    };
    flow.put(heading, left, FontFace::Bold, body);
    flow.put_right(&format!("[{}]", section.total), right, FontFace::Bold, body);
    flow.advance(leading * 1.2);

    for question in &section.questions {
        let lines = metrics.wrap_text(&question.question, body, text_width);
        let line_count = lines.len().max(1);
        flow.ensure(leading * line_count as f32);

        flow.put(question.label.clone(), left + LABEL_INSET_PT, FontFace::Regular, body);
        flow.put_right(&format!("({})", question.marks), right, FontFace::Regular, body);
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                flow.advance(leading);
            }
            flow.put(line, text_x, FontFace::Regular, body);
        }
        flow.advance(leading);
    }
    flow.advance(leading * 0.6);
}

fn number_pages(pages: &mut [PageLayout], config: &PageConfig) {
    let total = pages.len();
    let size = config.body_size_pt - 2.0;
    let metrics = get_metrics(FontFace::Regular);
    for (i, page) in pages.iter_mut().enumerate() {
        let text = format!("Page {} of {}", i + 1, total);
        let width = metrics.measure_pt(&text, size);
        page.runs.push(TextRun {
            x: (config.page_width_pt - width) / 2.0,
            y: config.margin_pt / 2.0,
            text,
            face: FontFace::Regular,
            size,
        });
    }
}

fn labelled(label: &str, value: &str) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        format!("{label}: {}", value.trim())
    }
}
