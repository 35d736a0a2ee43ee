//! The document surface and its page stack.
//!
//! The surface owns the content. Rendering produces a [`PageStack`]:
//! page frames stacked with a gap, the padding box from the geometry
//! engine, floating objects as an absolute overlay, and page number
//! markers when they are on.
//!
//! ## Rendered Height
//!
//! Pagination needs the height the content takes once laid out. That is
//! measured by whoever renders (a browser, a terminal, a test) and
//! handed in with [`DocumentSurface::report_rendered_height`]. Headless
//! front-ends can use [`estimate_height`].

use doctor_document::{sanitize, BlockKind, Document, DocumentResult, Selection};
use serde::Serialize;
use std::fmt::Write;

use crate::config::{MarginConfig, PageConfig};
use crate::floating::{FloatingController, WrapMode};
use crate::geometry::{Padding, PageGeometry};
use crate::state::{HorizontalPosition, PageNumberPosition, SimulatorState, VerticalPosition};

/// Editable text region of the simulator.
#[derive(Debug, Clone, Default)]
pub struct DocumentSurface {
    document: Document,
    rendered_height: f64,
}

impl DocumentSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current content as markup.
    pub fn content(&self) -> String {
        self.document.to_markup()
    }

    /// Replaces the content wholesale. The markup is sanitized first.
    pub fn set_content(&mut self, markup: &str) -> DocumentResult<()> {
        let clean = sanitize(markup)?;
        self.document = Document::from_markup(&clean)?;
        Ok(())
    }

    pub(crate) fn replace_document(&mut self, document: Document) {
        self.document = document;
    }

    pub fn insert_text(&mut self, offset: usize, text: &str) -> DocumentResult<()> {
        self.document.insert_text(offset, text)
    }

    pub fn delete(&mut self, selection: Selection) -> DocumentResult<()> {
        self.document.delete(selection)
    }

    pub fn rendered_height(&self) -> f64 {
        self.rendered_height
    }

    /// Height observed by the rendering layer. Invalid values count as empty.
    pub fn report_rendered_height(&mut self, height: f64) {
        self.rendered_height = if height.is_finite() { height.max(0.0) } else { 0.0 };
    }

    /// Builds the page stack for the current content.
    pub fn render(
        &self,
        state: &SimulatorState,
        floating: &FloatingController,
        page: &PageConfig,
        margins: &MarginConfig,
    ) -> PageStack {
        let geometry = PageGeometry::compute(
            page,
            margins,
            state.margins,
            floating.objects(),
            self.rendered_height,
        );

        let pages = (0..geometry.page_count)
            .map(|index| {
                let top = index as f64 * (page.height + page.gap);
                PageFrame {
                    number: index + 1,
                    top,
                    page_number: state
                        .page_numbers
                        .map(|position| PageNumberMarker::place(index + 1, position, top, page, &geometry.padding)),
                }
            })
            .collect();

        let overlay = floating
            .objects()
            .iter()
            .map(|object| {
                let offset = floating.drag_offset(&object.id).unwrap_or_default();
                OverlayObject {
                    id: object.id.clone(),
                    x: object.position.x + offset.x,
                    y: object.position.y + offset.y,
                    width: object.size.width,
                    height: object.size.height,
                    wrap: object.wrap,
                    selected: floating.selected() == Some(object.id.as_str()),
                }
            })
            .collect();

        PageStack {
            page_width: page.width,
            page_height: page.height,
            gap: page.gap,
            zoom: state.zoom,
            geometry,
            pages,
            overlay,
        }
    }
}

/// A renderable stack of pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageStack {
    pub page_width: f64,
    pub page_height: f64,
    pub gap: f64,
    pub zoom: u16,
    pub geometry: PageGeometry,
    pub pages: Vec<PageFrame>,
    /// Objects in absolute document coordinates, drawn above the pages
    pub overlay: Vec<OverlayObject>,
}

impl PageStack {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFrame {
    /// 1-based
    pub number: usize,
    /// Offset of the page's top edge within the stack
    pub top: f64,
    pub page_number: Option<PageNumberMarker>,
}

/// The "- N -" marker drawn on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageNumberMarker {
    pub text: String,
    pub position: PageNumberPosition,
    pub x: f64,
    pub y: f64,
}

impl PageNumberMarker {
    fn place(number: usize, position: PageNumberPosition, top: f64, page: &PageConfig, padding: &Padding) -> Self {
        let x = match position.horizontal {
            HorizontalPosition::Left => padding.left,
            HorizontalPosition::Center => page.width / 2.0,
            HorizontalPosition::Right => page.width - padding.right,
        };
        let y = match position.vertical {
            VerticalPosition::Top => top + padding.top / 2.0,
            VerticalPosition::Bottom => top + page.height - padding.bottom / 2.0,
        };
        Self {
            text: format!("- {number} -"),
            position,
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayObject {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub wrap: WrapMode,
    pub selected: bool,
}

// ==================== Measuring ====================

/// Font size and line height factor per block kind.
fn metrics(kind: BlockKind) -> (f64, f64) {
    match kind {
        BlockKind::Title => (40.0, 1.2),
        BlockKind::Heading1 => (32.0, 1.2),
        BlockKind::Heading2 => (26.0, 1.2),
        BlockKind::Heading3 => (22.0, 1.25),
        _ => (16.0, 1.5),
    }
}

/// Rough rendered height of a document inside the padding box.
///
/// Every text block takes at least one line; longer blocks wrap at an
/// average glyph width of half the font size.
pub fn estimate_height(document: &Document, padding: &Padding, page_width: f64) -> f64 {
    let width = padding.content_width(page_width).max(1.0);
    let text: f64 = document
        .spans()
        .iter()
        .map(|span| {
            let kind = document.block_kind(span.block).unwrap_or(BlockKind::Paragraph);
            let (size, factor) = metrics(kind);
            let per_line = (width / (size * 0.5)).floor().max(1.0);
            let lines: f64 = document
                .text_of(span.block)
                .split('\n')
                .map(|line| (line.chars().count() as f64 / per_line).ceil().max(1.0))
                .sum();
            lines * size * factor + size * 0.5
        })
        .sum();
    padding.top + text + padding.bottom
}

/// Plain-text preview of a page stack and its content.
pub fn preview(document: &Document, stack: &PageStack) -> String {
    let mut out = String::new();
    let padding = stack.geometry.padding;
    let total = stack.page_count();
    for page in &stack.pages {
        let _ = write!(
            out,
            "[page {}/{}] padding t{:.0} r{:.0} b{:.0} l{:.0}",
            page.number, total, padding.top, padding.right, padding.bottom, padding.left
        );
        if let Some(marker) = &page.page_number {
            let _ = write!(out, "  {} at ({:.0}, {:.0})", marker.text, marker.x, marker.y);
        }
        out.push('\n');
    }
    for object in &stack.overlay {
        let _ = writeln!(
            out,
            "{} {} ({:.0}, {:.0}) {:.0}x{:.0} wrap={}",
            if object.selected { "*" } else { " " },
            object.id,
            object.x,
            object.y,
            object.width,
            object.height,
            object.wrap
        );
    }
    for span in document.spans() {
        let kind = document.block_kind(span.block).unwrap_or(BlockKind::Paragraph);
        let container = document.parent(span.block).and_then(|p| document.block_kind(p));
        let prefix = match container {
            Some(BlockKind::BulletList) => "  • ",
            Some(BlockKind::NumberedList) => "  # ",
            Some(BlockKind::TableOfContents) => "  ≡ ",
            _ => "",
        };
        let _ = writeln!(
            out,
            "{:>4} {:<12}| {}{}",
            span.start,
            kind.label(),
            prefix,
            document.text_of(span.block).replace('\n', " / ")
        );
    }
    out
}
