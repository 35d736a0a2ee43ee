//! Style command dispatcher.
//!
//! The dispatcher is a pure function of the command, the document, the
//! selection and the simulator state. It never holds state of its own;
//! it hands back an [`Outcome`] that the session applies.
//!
//! ## Learning: Returning Effects Instead of Performing Them
//!
//! `dispatch` only borrows its inputs. A changed document or state comes
//! back as a new value in the [`Outcome`], and floating object edits come
//! back as a [`FloatingRequest`]. The session decides how to apply them,
//! so every command can be tested without a session around it.
//!
//! ## Block Reclassification
//!
//! ```text
//! selection ──► top-level blocks touching it ──► eligible? ──► format_block
//!    │                     (none)                                 │ refused
//!    └──► cursor ──► container ──► nearest block ──────────► replace_block
//!                                                                 │ refused
//!                                                              no-op
//! ```

use doctor_document::{
    escape_text, sanitize, Alignment, BlockKind, Document, Marks, NodeId, Selection,
};

use crate::command::{Command, CommandError};
use crate::config::ZoomConfig;
use crate::floating::{ObjectKind, WrapMode};
use crate::state::{PageNumberPicker, SimulatorState};

/// Everything a command may read.
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    pub document: &'a Document,
    /// `None` when the selection is outside the document surface
    pub selection: Option<Selection>,
    pub state: &'a SimulatorState,
    pub selected_object: Option<&'a str>,
}

/// Requests for the floating object controller.
#[derive(Debug, Clone, PartialEq)]
pub enum FloatingRequest {
    Insert { kind: ObjectKind, source: String },
    Delete { id: String },
    SetWrap { id: String, mode: WrapMode },
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new document, with the selection to restore
    Document {
        document: Document,
        selection: Option<Selection>,
    },
    /// New simulator state
    State(SimulatorState),
    Floating(FloatingRequest),
    /// Nothing to apply
    Unchanged,
}

/// Interprets commands against explicit inputs.
#[derive(Debug, Clone, Default)]
pub struct StyleDispatcher {
    zoom: ZoomConfig,
}

impl StyleDispatcher {
    pub fn new(zoom: ZoomConfig) -> Self {
        Self { zoom }
    }

    pub fn dispatch(&self, command: &Command, input: DispatchInput<'_>) -> Result<Outcome, CommandError> {
        let DispatchInput {
            document,
            selection,
            state,
            selected_object,
        } = input;
        let selection = selection.map(|s| s.clamp(document.len()));

        match command {
            Command::Bold => Ok(toggle_marks(document, selection, Marks::BOLD)),
            Command::Italic => Ok(toggle_marks(document, selection, Marks::ITALIC)),
            Command::Underline => Ok(toggle_marks(document, selection, Marks::UNDERLINE)),

            Command::Heading { level } => {
                let kind = BlockKind::heading(*level).ok_or_else(|| CommandError::InvalidArgument {
                    command: "heading".to_string(),
                    reason: format!("level {level} is not 1-3"),
                })?;
                reclassify(document, selection, kind)
            }
            Command::Title => reclassify(document, selection, BlockKind::Title),
            Command::Normal => reclassify(document, selection, BlockKind::Paragraph),

            Command::AlignLeft => Ok(align(document, selection, None)),
            Command::AlignCenter => Ok(align(document, selection, Some(Alignment::Center))),
            Command::AlignRight => Ok(align(document, selection, Some(Alignment::Right))),
            Command::BulletList => Ok(toggle_bullets(document, selection)),

            Command::InsertImage { source } => Ok(Outcome::Floating(FloatingRequest::Insert {
                kind: ObjectKind::Image,
                source: source.clone(),
            })),
            Command::TableOfContents => insert_toc(document, selection),

            Command::PageNumber => Ok(Outcome::State(SimulatorState {
                picker: Some(PageNumberPicker::default()),
                ..state.clone()
            })),
            Command::ChoosePageNumberVertical(vertical) => {
                let mut picker = state.picker.ok_or(CommandError::PickerClosed)?;
                picker.vertical = Some(*vertical);
                Ok(Outcome::State(SimulatorState {
                    picker: Some(picker),
                    ..state.clone()
                }))
            }
            Command::ChoosePageNumberHorizontal(horizontal) => {
                let mut picker = state.picker.ok_or(CommandError::PickerClosed)?;
                picker.horizontal = Some(*horizontal);
                Ok(Outcome::State(SimulatorState {
                    picker: Some(picker),
                    ..state.clone()
                }))
            }
            Command::ConfirmPageNumber => {
                let picker = state.picker.ok_or(CommandError::PickerClosed)?;
                let position = picker.confirm()?;
                Ok(Outcome::State(SimulatorState {
                    page_numbers: Some(position),
                    picker: None,
                    ..state.clone()
                }))
            }
            Command::CancelPageNumber => Ok(Outcome::State(SimulatorState {
                picker: None,
                ..state.clone()
            })),
            Command::RemovePageNumbers => Ok(Outcome::State(SimulatorState {
                page_numbers: None,
                ..state.clone()
            })),

            Command::SetMargins(margins) => Ok(Outcome::State(SimulatorState {
                margins: *margins,
                ..state.clone()
            })),
            Command::SetWrapMode(mode) => {
                let id = selected_object.ok_or(CommandError::NoObjectSelected)?;
                Ok(Outcome::Floating(FloatingRequest::SetWrap {
                    id: id.to_string(),
                    mode: *mode,
                }))
            }
            Command::DeleteImage => Ok(selected_object
                .map(|id| Outcome::Floating(FloatingRequest::Delete { id: id.to_string() }))
                .unwrap_or(Outcome::Unchanged)),

            Command::ZoomIn => Ok(Outcome::State(state.zoomed_in(&self.zoom))),
            Command::ZoomOut => Ok(Outcome::State(state.zoomed_out(&self.zoom))),
            Command::ZoomReset => Ok(Outcome::State(SimulatorState {
                zoom: self.zoom.initial,
                ..state.clone()
            })),
            Command::SetTab { tab } => Ok(Outcome::State(SimulatorState {
                active_tab: tab.clone(),
                ..state.clone()
            })),
        }
    }
}

// ==================== Inline ====================

fn toggle_marks(document: &Document, selection: Option<Selection>, marks: Marks) -> Outcome {
    let Some(selection) = selection else {
        return Outcome::Unchanged;
    };
    let mut next = document.clone();
    if !next.toggle_marks(selection, marks) {
        return Outcome::Unchanged;
    }
    Outcome::Document {
        document: next,
        selection: Some(selection),
    }
}

// ==================== Reclassification ====================

/// Whether a block of kind `current` may become `target`.
fn eligible(current: BlockKind, target: BlockKind) -> bool {
    if current == target {
        return false;
    }
    match target {
        BlockKind::Heading1 => matches!(
            current,
            BlockKind::Paragraph | BlockKind::Div | BlockKind::Heading2 | BlockKind::Heading3
        ),
        BlockKind::Heading2 | BlockKind::Heading3 => {
            matches!(current, BlockKind::Paragraph | BlockKind::Div) || current.is_heading()
        }
        BlockKind::Title => current.is_textual(),
        BlockKind::Paragraph => current.is_heading(),
        _ => false,
    }
}

fn reclassify(document: &Document, selection: Option<Selection>, target: BlockKind) -> Result<Outcome, CommandError> {
    let selection = selection.ok_or(CommandError::NoEligibleBlock)?;

    let touched: Vec<NodeId> = if selection.is_cursor() {
        Vec::new()
    } else {
        document
            .top_level_spans()
            .into_iter()
            .filter(|&(_, start, end)| selection.touches(start, end))
            .map(|(id, _, _)| id)
            .collect()
    };
    let targets: Vec<NodeId> = touched
        .iter()
        .copied()
        .filter(|&id| document.block_kind(id).is_some_and(|kind| eligible(kind, target)))
        .collect();

    if !targets.is_empty() {
        let mut next = document.clone();
        let converted = targets
            .into_iter()
            .filter(|&id| apply_block_format(&mut next, id, target).is_some())
            .count();
        if converted == 0 {
            return Ok(Outcome::Unchanged);
        }
        next.compact();
        return Ok(Outcome::Document {
            document: next,
            selection: Some(selection),
        });
    }
    if touched
        .iter()
        .any(|&id| document.block_kind(id) == Some(target))
    {
        return Ok(Outcome::Unchanged);
    }

    reclassify_at_cursor(document, selection.start, target)
}

/// Converts the block holding the cursor and puts the cursor back inside it.
fn reclassify_at_cursor(document: &Document, offset: usize, target: BlockKind) -> Result<Outcome, CommandError> {
    let (container, _) = document
        .container_at(offset)
        .ok_or(CommandError::NoEligibleBlock)?;
    let block = document
        .nearest_block(container)
        .ok_or(CommandError::NoEligibleBlock)?;
    let kind = document.block_kind(block).ok_or(CommandError::NoEligibleBlock)?;
    if kind == target {
        return Ok(Outcome::Unchanged);
    }
    if !eligible(kind, target) {
        return Err(CommandError::NoEligibleBlock);
    }
    let (old_start, _) = document
        .block_span(block)
        .ok_or(CommandError::NoEligibleBlock)?;

    let mut next = document.clone();
    let Some(replacement) = apply_block_format(&mut next, block, target) else {
        return Ok(Outcome::Unchanged);
    };
    let cursor = next
        .block_span(replacement)
        .map(|(start, end)| (start + (offset - old_start)).min(end))
        .unwrap_or(offset);
    next.compact();
    Ok(Outcome::Document {
        document: next,
        selection: Some(Selection::cursor(cursor)),
    })
}

/// Native format-block first, generic replacement second, silent no-op last.
fn apply_block_format(document: &mut Document, block: NodeId, kind: BlockKind) -> Option<NodeId> {
    match document.format_block(block, kind) {
        Ok(new) => Some(new),
        Err(err) => {
            tracing::debug!("format_block refused {}: {}", block, err);
            match document.replace_block(block, kind) {
                Ok(new) => Some(new),
                Err(err) => {
                    tracing::debug!("replace_block refused {}: {}", block, err);
                    None
                }
            }
        }
    }
}

// ==================== Paragraph formatting ====================

/// Text blocks touched by the selection, or the one holding the cursor.
fn touched_text_blocks(document: &Document, selection: Selection) -> Vec<NodeId> {
    if selection.is_cursor() {
        return document
            .block_at(selection.start)
            .map(|span| vec![span.block])
            .unwrap_or_default();
    }
    document
        .spans()
        .into_iter()
        .filter(|span| selection.touches(span.start, span.end))
        .map(|span| span.block)
        .collect()
}

fn align(document: &Document, selection: Option<Selection>, align: Option<Alignment>) -> Outcome {
    let Some(selection) = selection else {
        return Outcome::Unchanged;
    };
    let blocks = touched_text_blocks(document, selection);
    if blocks.iter().all(|&id| document.alignment(id) == align) {
        return Outcome::Unchanged;
    }
    let mut next = document.clone();
    for block in blocks {
        if let Err(err) = next.set_alignment(block, align) {
            tracing::debug!("Cannot align {}: {}", block, err);
        }
    }
    Outcome::Document {
        document: next,
        selection: Some(selection),
    }
}

/// Bullet list toggle.
///
/// Items of a bulleted list go back to paragraphs; top-level text
/// blocks become items of one new list.
fn toggle_bullets(document: &Document, selection: Option<Selection>) -> Outcome {
    let Some(selection) = selection else {
        return Outcome::Unchanged;
    };
    let blocks = touched_text_blocks(document, selection);
    if blocks.is_empty() {
        return Outcome::Unchanged;
    }
    let mut next = document.clone();

    let in_bullets = |id: NodeId| {
        document
            .parent(id)
            .and_then(|p| document.block_kind(p))
            .is_some_and(|k| k == BlockKind::BulletList)
    };
    let changed = if blocks.iter().all(|&id| in_bullets(id)) {
        let mut lists: Vec<NodeId> = blocks.iter().filter_map(|&id| document.parent(id)).collect();
        lists.dedup();
        lists
            .into_iter()
            .filter(|&list| next.unwrap_list(list).is_ok())
            .count()
            > 0
    } else {
        let top_level: Vec<NodeId> = blocks
            .into_iter()
            .filter(|&id| document.parent(id) == Some(document.root()))
            .collect();
        !top_level.is_empty() && next.wrap_in_list(&top_level, BlockKind::BulletList).is_ok()
    };

    if !changed {
        return Outcome::Unchanged;
    }
    next.compact();
    Outcome::Document {
        document: next,
        selection: Some(selection),
    }
}

// ==================== Table of contents ====================

/// Builds the table of contents markup.
///
/// Page numbers are the 1-based order of the headings, not the page
/// the heading renders on.
pub fn toc_markup(document: &Document) -> Option<String> {
    let headings = document.blocks_of_kind(BlockKind::Heading1);
    if headings.is_empty() {
        return None;
    }
    let mut markup = String::from("<nav class=\"toc\">");
    for (index, heading) in headings.into_iter().enumerate() {
        let text = document.text_of(heading);
        markup.push_str(&format!(
            "<p>{} .......... {}</p>",
            escape_text(text.trim()),
            index + 1
        ));
    }
    markup.push_str("</nav>");
    Some(markup)
}

fn insert_toc(document: &Document, selection: Option<Selection>) -> Result<Outcome, CommandError> {
    let markup = toc_markup(document).ok_or(CommandError::NoHeadings)?;

    let fragment = match sanitize(&markup).and_then(|clean| Document::from_markup(&clean)) {
        Ok(fragment) => fragment,
        Err(err) => {
            tracing::debug!("Table of contents rejected by sanitizer: {}", err);
            return Ok(Outcome::Unchanged);
        }
    };

    let anchor = selection
        .and_then(|s| document.block_at(s.start))
        .and_then(|span| document.top_level_ancestor(span.block));
    let mut next = document.clone();
    next.insert_fragment(anchor, &fragment);
    next.compact();
    Ok(Outcome::Document {
        document: next,
        selection,
    })
}
