//! Arena tree holding the document's blocks and text runs.
//!
//! ## Layout
//!
//! ```text
//! Root
//! ├── Block(h1) ── Text("Introduction")
//! ├── Block(p)  ── Text("Plain ") ── Text("bold", BOLD)
//! └── Block(ul)
//!     ├── Block(li) ── Text("first")
//!     └── Block(li) ── Text("second")
//! ```
//!
//! Text blocks (paragraphs, headings, list items, ...) hold runs only.
//! Container blocks (lists, table of contents) hold text blocks only.
//! Nodes removed from the tree stay in the arena until [`Document::compact`].
//!
//! ## Learning: Arena Trees
//!
//! Parent and child links are [`NodeId`] indices into one `Vec`, not
//! `Rc<RefCell<_>>` pointers. The borrow checker sees a single owner, so
//! walking up to a parent while editing a child needs no interior
//! mutability, and cloning the whole document is a plain `Vec` clone.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

use crate::markup;
use crate::{DocumentError, DocumentResult, Selection};

const ROOT: NodeId = NodeId(0);

/// Index of a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The structural kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Div,
    Heading1,
    Heading2,
    Heading3,
    Title,
    BulletList,
    NumberedList,
    ListItem,
    TableOfContents,
}

impl BlockKind {
    /// Markup tag used when serializing.
    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::Paragraph | BlockKind::Title => "p",
            BlockKind::Div => "div",
            BlockKind::Heading1 => "h1",
            BlockKind::Heading2 => "h2",
            BlockKind::Heading3 => "h3",
            BlockKind::BulletList => "ul",
            BlockKind::NumberedList => "ol",
            BlockKind::ListItem => "li",
            BlockKind::TableOfContents => "nav",
        }
    }

    /// Class attribute that distinguishes kinds sharing a tag.
    pub fn class(self) -> Option<&'static str> {
        match self {
            BlockKind::Title => Some("title"),
            BlockKind::TableOfContents => Some("toc"),
            _ => None,
        }
    }

    /// Returns the heading kind for levels 1 to 3.
    pub fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(BlockKind::Heading1),
            2 => Some(BlockKind::Heading2),
            3 => Some(BlockKind::Heading3),
            _ => None,
        }
    }

    /// Containers hold other blocks instead of text.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            BlockKind::BulletList | BlockKind::NumberedList | BlockKind::TableOfContents
        )
    }

    /// Text blocks hold runs directly.
    pub fn is_textual(self) -> bool {
        !self.is_container()
    }

    pub fn is_list(self) -> bool {
        matches!(self, BlockKind::BulletList | BlockKind::NumberedList)
    }

    pub fn is_heading(self) -> bool {
        matches!(
            self,
            BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3
        )
    }

    /// Human readable name for status lines.
    pub fn label(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "Normal",
            BlockKind::Div => "Normal",
            BlockKind::Heading1 => "Heading 1",
            BlockKind::Heading2 => "Heading 2",
            BlockKind::Heading3 => "Heading 3",
            BlockKind::Title => "Title",
            BlockKind::BulletList => "Bulleted list",
            BlockKind::NumberedList => "Numbered list",
            BlockKind::ListItem => "List item",
            BlockKind::TableOfContents => "Table of contents",
        }
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Alignment::Left),
            "center" | "centre" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            _ => None,
        }
    }
}

/// Inline formatting carried by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Marks {
    pub const NONE: Marks = Marks {
        bold: false,
        italic: false,
        underline: false,
    };

    pub const BOLD: Marks = Marks {
        bold: true,
        italic: false,
        underline: false,
    };

    pub const ITALIC: Marks = Marks {
        bold: false,
        italic: true,
        underline: false,
    };

    pub const UNDERLINE: Marks = Marks {
        bold: false,
        italic: false,
        underline: true,
    };

    pub fn is_plain(self) -> bool {
        self == Marks::NONE
    }

    /// Returns true if every flag set in `other` is also set here.
    pub fn contains(self, other: Marks) -> bool {
        (!other.bold || self.bold)
            && (!other.italic || self.italic)
            && (!other.underline || self.underline)
    }

    pub fn union(self, other: Marks) -> Marks {
        Marks {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
        }
    }

    pub fn difference(self, other: Marks) -> Marks {
        Marks {
            bold: self.bold && !other.bold,
            italic: self.italic && !other.italic,
            underline: self.underline && !other.underline,
        }
    }
}

/// A stretch of text sharing one set of marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub marks: Marks,
}

impl Run {
    pub fn new(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Payload of an arena node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root,
    Block {
        kind: BlockKind,
        align: Option<Alignment>,
    },
    Text(Run),
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn block_kind(&self) -> Option<BlockKind> {
        match self.data {
            NodeData::Block { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn run(&self) -> Option<&Run> {
        match &self.data {
            NodeData::Text(run) => Some(run),
            _ => None,
        }
    }
}

/// Offsets covered by one text block.
///
/// `end` is the cursor position after the block's last character;
/// the next block starts at `end + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub block: NodeId,
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end
    }
}

/// A block-structured rich text document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Root)],
        }
    }

    /// Parses a document from markup.
    pub fn from_markup(markup: &str) -> DocumentResult<Self> {
        markup::parse(markup)
    }

    /// Serializes the document to markup.
    pub fn to_markup(&self) -> String {
        markup::serialize(self)
    }

    // ==================== Structure ====================

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Blocks directly under the root, in document order.
    pub fn top_level_blocks(&self) -> &[NodeId] {
        self.children(ROOT)
    }

    pub fn block_kind(&self, id: NodeId) -> Option<BlockKind> {
        self.node(id).and_then(Node::block_kind)
    }

    pub fn alignment(&self, id: NodeId) -> Option<Alignment> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Block { align, .. }) => *align,
            _ => None,
        }
    }

    pub fn run(&self, id: NodeId) -> Option<&Run> {
        self.node(id).and_then(Node::run)
    }

    pub fn is_empty(&self) -> bool {
        self.top_level_blocks().is_empty()
    }

    /// Iterates the ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Walks up from `id` (inclusive) to the nearest block.
    pub fn nearest_block(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.block_kind(n).is_some())
    }

    /// Returns the top-level block that contains `id`.
    pub fn top_level_ancestor(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.parent(n) == Some(ROOT))
    }

    /// All nodes below `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// All blocks of a kind, in document order.
    pub fn blocks_of_kind(&self, kind: BlockKind) -> Vec<NodeId> {
        self.descendants(ROOT)
            .into_iter()
            .filter(|&n| self.block_kind(n) == Some(kind))
            .collect()
    }

    pub fn count_blocks(&self, kind: BlockKind) -> usize {
        self.blocks_of_kind(kind).len()
    }

    pub fn contains_block(&self, kind: BlockKind) -> bool {
        self.descendants(ROOT)
            .into_iter()
            .any(|n| self.block_kind(n) == Some(kind))
    }

    fn is_text_block(&self, id: NodeId) -> bool {
        self.block_kind(id).is_some_and(BlockKind::is_textual)
    }

    // ==================== Text ====================

    /// Text content of a node. Blocks inside containers are joined by newlines.
    pub fn text_of(&self, id: NodeId) -> String {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(run)) => run.text.clone(),
            Some(NodeData::Block { kind, .. }) if kind.is_textual() => self
                .children(id)
                .iter()
                .filter_map(|&c| self.run(c))
                .map(|r| r.text.as_str())
                .collect(),
            Some(_) => self
                .children(id)
                .iter()
                .map(|&c| self.text_of(c))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }

    /// The whole document as plain text.
    pub fn plain_text(&self) -> String {
        self.text_of(ROOT)
    }

    /// Case-insensitive phrase search with whitespace normalized.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let needle = normalize_words(phrase);
        if needle.is_empty() {
            return true;
        }
        normalize_words(&self.plain_text()).contains(&needle)
    }

    /// Returns true if some block of `kind` contains `word` as a whole word.
    pub fn has_block_with_word(&self, kind: BlockKind, word: &str) -> bool {
        let word = word.to_lowercase();
        self.blocks_of_kind(kind).into_iter().any(|block| {
            self.text_of(block)
                .unicode_words()
                .any(|w| w.to_lowercase() == word)
        })
    }

    // ==================== Offsets ====================

    /// Offset spans of every text block in document order.
    pub fn spans(&self) -> Vec<BlockSpan> {
        self.span_iter().collect()
    }

    /// Lazy span walk; callers that need one span stop early.
    fn span_iter(&self) -> impl Iterator<Item = BlockSpan> + '_ {
        let mut offset = 0;
        self.descendants(ROOT)
            .into_iter()
            .filter(move |&id| self.is_text_block(id))
            .map(move |id| {
                let len = self.block_len(id);
                let span = BlockSpan {
                    block: id,
                    start: offset,
                    end: offset + len,
                };
                offset += len + 1;
                span
            })
    }

    /// Largest addressable offset.
    pub fn len(&self) -> usize {
        let (total, blocks) = self
            .descendants(ROOT)
            .into_iter()
            .filter(|&id| self.is_text_block(id))
            .fold((0usize, 0usize), |(total, blocks), id| (total + self.block_len(id), blocks + 1));
        // One separator between neighbouring blocks
        total + blocks.saturating_sub(1)
    }

    fn block_len(&self, block: NodeId) -> usize {
        self.children(block)
            .iter()
            .filter_map(|&c| self.run(c))
            .map(Run::char_len)
            .sum()
    }

    /// Offsets covered by any block, containers included.
    pub fn block_span(&self, id: NodeId) -> Option<(usize, usize)> {
        if self.is_text_block(id) {
            return self
                .span_iter()
                .find(|s| s.block == id)
                .map(|s| (s.start, s.end));
        }
        let mut inner = self
            .span_iter()
            .skip_while(|s| !self.ancestors(s.block).any(|a| a == id))
            .take_while(|s| self.ancestors(s.block).any(|a| a == id));
        let first = inner.next()?;
        let last = inner.last().unwrap_or(first);
        Some((first.start, last.end))
    }

    /// Span of every top-level block that holds text, in one walk.
    ///
    /// Containers span from their first to their last text block.
    pub fn top_level_spans(&self) -> Vec<(NodeId, usize, usize)> {
        let mut out: Vec<(NodeId, usize, usize)> = Vec::new();
        for span in self.span_iter() {
            let Some(top) = self.top_level_ancestor(span.block) else {
                continue;
            };
            match out.last_mut() {
                Some((last, _, end)) if *last == top => *end = span.end,
                _ => out.push((top, span.start, span.end)),
            }
        }
        out
    }

    /// The text block whose span contains `offset`.
    pub fn block_at(&self, offset: usize) -> Option<BlockSpan> {
        self.span_iter().find(|s| s.contains(offset))
    }

    /// The innermost node holding the cursor, with the offset local to it.
    ///
    /// This is a run when the block has text, otherwise the empty block itself.
    pub fn container_at(&self, offset: usize) -> Option<(NodeId, usize)> {
        let span = self.block_at(offset)?;
        let mut local = offset - span.start;
        for &child in self.children(span.block) {
            let len = self.run(child).map(Run::char_len).unwrap_or(0);
            if local <= len {
                return Some((child, local));
            }
            local -= len;
        }
        Some((span.block, 0))
    }

    // ==================== Text Editing ====================

    /// Inserts plain text at an offset, inheriting the marks of the run it lands in.
    pub fn insert_text(&mut self, offset: usize, text: &str) -> DocumentResult<()> {
        if self.is_empty() && offset == 0 {
            let block = self.alloc(NodeData::Block {
                kind: BlockKind::Paragraph,
                align: None,
            });
            self.append_child(ROOT, block);
        }
        let len = self.len();
        let (node, local) = self
            .container_at(offset)
            .ok_or(DocumentError::OffsetOutOfBounds { offset, len })?;

        if let NodeData::Text(run) = &mut self.node_mut(node)?.data {
            let byte = byte_index(&run.text, local);
            run.text.insert_str(byte, text);
            return Ok(());
        }
        let run = self.alloc(NodeData::Text(Run::new(text, Marks::NONE)));
        self.append_child(node, run);
        Ok(())
    }

    /// Deletes the characters covered by a selection.
    ///
    /// Crossing a block boundary merges the last touched block into the first.
    pub fn delete(&mut self, selection: Selection) -> DocumentResult<()> {
        if selection.is_cursor() {
            return Ok(());
        }
        let len = self.len();
        let first = self
            .block_at(selection.start)
            .ok_or(DocumentError::OffsetOutOfBounds {
                offset: selection.start,
                len,
            })?;
        let last = self
            .block_at(selection.end)
            .ok_or(DocumentError::OffsetOutOfBounds {
                offset: selection.end,
                len,
            })?;

        if first.block == last.block {
            self.remove_chars(
                first.block,
                (selection.start - first.start)..(selection.end - first.start),
            );
            return Ok(());
        }

        let spans = self.spans();
        self.remove_chars(first.block, (selection.start - first.start)..first.len());
        self.remove_chars(last.block, 0..(selection.end - last.start));

        let tail: Vec<NodeId> = self.children(last.block).to_vec();
        for run in tail {
            self.detach(run);
            self.append_child(first.block, run);
        }
        self.merge_runs(first.block);

        let doomed: Vec<NodeId> = spans
            .iter()
            .filter(|s| s.start > first.start && s.start <= last.start)
            .map(|s| s.block)
            .collect();
        for block in doomed {
            let parent = self.parent(block);
            self.detach(block);
            if let Some(parent) = parent {
                self.prune_empty_container(parent);
            }
        }
        Ok(())
    }

    fn remove_chars(&mut self, block: NodeId, range: Range<usize>) {
        let mut offset = 0;
        for child in self.children(block).to_vec() {
            let Some(len) = self.run(child).map(Run::char_len) else {
                continue;
            };
            let start = range.start.max(offset);
            let end = range.end.min(offset + len);
            if start < end {
                if let Some(Node {
                    data: NodeData::Text(run),
                    ..
                }) = self.nodes.get_mut(child.0)
                {
                    run.text = run
                        .text
                        .chars()
                        .enumerate()
                        .filter(|(i, _)| *i < start - offset || *i >= end - offset)
                        .map(|(_, c)| c)
                        .collect();
                }
            }
            offset += len;
        }
        self.merge_runs(block);
    }

    fn prune_empty_container(&mut self, id: NodeId) {
        if id == ROOT || !self.children(id).is_empty() {
            return;
        }
        if self.block_kind(id).is_some_and(BlockKind::is_container) {
            let parent = self.parent(id);
            self.detach(id);
            if let Some(parent) = parent {
                self.prune_empty_container(parent);
            }
        }
    }

    // ==================== Inline Marks ====================

    /// Toggles marks over a selection.
    ///
    /// When every selected character already carries the marks they are
    /// removed, otherwise they are added. Returns false if nothing was selected.
    pub fn toggle_marks(&mut self, selection: Selection, marks: Marks) -> bool {
        if selection.is_cursor() {
            return false;
        }
        let mut targets = Vec::new();
        let mut blocks = Vec::new();
        for span in self.spans() {
            let Some(hit) = selection.intersect(span.start..span.end) else {
                continue;
            };
            let local = (hit.start - span.start)..(hit.end - span.start);
            targets.extend(self.isolate_runs(span.block, local));
            blocks.push(span.block);
        }
        if targets.is_empty() {
            return false;
        }

        let remove = targets
            .iter()
            .all(|&id| self.run(id).is_some_and(|r| r.marks.contains(marks)));
        for id in targets {
            if let Some(Node {
                data: NodeData::Text(run),
                ..
            }) = self.nodes.get_mut(id.0)
            {
                run.marks = if remove {
                    run.marks.difference(marks)
                } else {
                    run.marks.union(marks)
                };
            }
        }
        for block in blocks {
            self.merge_runs(block);
        }
        true
    }

    /// Splits runs so that `range` is covered by whole runs, and returns them.
    fn isolate_runs(&mut self, block: NodeId, range: Range<usize>) -> Vec<NodeId> {
        self.split_run_at(block, range.start);
        self.split_run_at(block, range.end);

        let mut offset = 0;
        let mut inside = Vec::new();
        for &child in self.children(block) {
            let len = self.run(child).map(Run::char_len).unwrap_or(0);
            if len > 0 && offset >= range.start && offset + len <= range.end {
                inside.push(child);
            }
            offset += len;
        }
        inside
    }

    fn split_run_at(&mut self, block: NodeId, at: usize) {
        let mut offset = 0;
        for (index, child) in self.children(block).to_vec().into_iter().enumerate() {
            let len = self.run(child).map(Run::char_len).unwrap_or(0);
            if at > offset && at < offset + len {
                let tail = match self.nodes.get_mut(child.0).map(|n| &mut n.data) {
                    Some(NodeData::Text(run)) => {
                        let byte = byte_index(&run.text, at - offset);
                        Run::new(run.text.split_off(byte), run.marks)
                    }
                    _ => return,
                };
                let new = self.alloc(NodeData::Text(tail));
                self.insert_child(block, index + 1, new);
                return;
            }
            offset += len;
        }
    }

    /// Joins neighbouring runs with identical marks and drops empty ones.
    fn merge_runs(&mut self, block: NodeId) {
        let mut previous: Option<NodeId> = None;
        for child in self.children(block).to_vec() {
            let Some(run) = self.run(child).cloned() else {
                previous = None;
                continue;
            };
            if run.text.is_empty() {
                self.detach(child);
                continue;
            }
            if let Some(prev) = previous {
                if let Some(Node {
                    data: NodeData::Text(prev_run),
                    ..
                }) = self.nodes.get_mut(prev.0)
                {
                    if prev_run.marks == run.marks {
                        prev_run.text.push_str(&run.text);
                        self.detach(child);
                        continue;
                    }
                }
            }
            previous = Some(child);
        }
    }

    // ==================== Block Formatting ====================

    pub fn set_alignment(&mut self, block: NodeId, align: Option<Alignment>) -> DocumentResult<()> {
        match &mut self.node_mut(block)?.data {
            NodeData::Block { align: current, .. } => {
                *current = align;
                Ok(())
            }
            _ => Err(DocumentError::NotABlock(block)),
        }
    }

    /// Format-block primitive: reclassifies a top-level text block in place.
    ///
    /// Refuses nested blocks; callers fall back to [`Document::replace_block`].
    pub fn format_block(&mut self, id: NodeId, kind: BlockKind) -> DocumentResult<NodeId> {
        if self.parent(id) != Some(ROOT) {
            return Err(DocumentError::NotReplaceable(id));
        }
        self.rebuild_block(id, kind, true)
    }

    /// Generic replacement of a text block anywhere outside a list.
    pub fn replace_block(&mut self, id: NodeId, kind: BlockKind) -> DocumentResult<NodeId> {
        let parent = self.parent(id).ok_or(DocumentError::NotReplaceable(id))?;
        if self.block_kind(parent).is_some_and(BlockKind::is_list) {
            return Err(DocumentError::NotReplaceable(id));
        }
        self.rebuild_block(id, kind, false)
    }

    /// Builds a new block of `kind` holding copies of the runs of `id`
    /// and swaps it into the same position.
    ///
    /// Runs are plain text plus marks, so copying them keeps the content
    /// exactly, whitespace included, without passing it through markup.
    fn rebuild_block(&mut self, id: NodeId, kind: BlockKind, keep_align: bool) -> DocumentResult<NodeId> {
        let (old_kind, align) = match self.node(id).map(|n| &n.data) {
            Some(NodeData::Block { kind: old, align }) => (*old, *align),
            Some(_) => return Err(DocumentError::NotABlock(id)),
            None => return Err(DocumentError::NodeNotFound(id)),
        };
        if old_kind.is_container() || kind.is_container() {
            return Err(DocumentError::NotReplaceable(id));
        }
        let parent = self.parent(id).ok_or(DocumentError::NotReplaceable(id))?;
        let index = self
            .index_in_parent(id)
            .ok_or(DocumentError::NotReplaceable(id))?;

        let runs: Vec<Run> = self
            .children(id)
            .iter()
            .filter_map(|&child| self.run(child).cloned())
            .collect();

        let new = self.alloc(NodeData::Block {
            kind,
            align: if keep_align { align } else { None },
        });
        for run in runs {
            let run = self.alloc(NodeData::Text(run));
            self.append_child(new, run);
        }
        self.detach(id);
        self.insert_child(parent, index, new);
        Ok(new)
    }

    /// Moves top-level text blocks into a new list placed where the first one was.
    pub fn wrap_in_list(&mut self, blocks: &[NodeId], kind: BlockKind) -> DocumentResult<NodeId> {
        let first = *blocks.first().ok_or(DocumentError::NotReplaceable(ROOT))?;
        if !kind.is_list() {
            return Err(DocumentError::NotReplaceable(first));
        }
        for &block in blocks {
            if self.parent(block) != Some(ROOT) || !self.is_text_block(block) {
                return Err(DocumentError::NotReplaceable(block));
            }
        }
        let index = self
            .index_in_parent(first)
            .ok_or(DocumentError::NotReplaceable(first))?;
        let list = self.alloc(NodeData::Block { kind, align: None });
        for &block in blocks {
            self.detach(block);
            if let NodeData::Block { kind: item, .. } = &mut self.node_mut(block)?.data {
                *item = BlockKind::ListItem;
            }
            self.append_child(list, block);
        }
        self.insert_child(ROOT, index, list);
        Ok(list)
    }

    /// Replaces a top-level list with one paragraph per item.
    pub fn unwrap_list(&mut self, list: NodeId) -> DocumentResult<Vec<NodeId>> {
        if self.parent(list) != Some(ROOT) || !self.block_kind(list).is_some_and(BlockKind::is_list) {
            return Err(DocumentError::NotReplaceable(list));
        }
        let index = self
            .index_in_parent(list)
            .ok_or(DocumentError::NotReplaceable(list))?;
        let items = self.children(list).to_vec();
        self.detach(list);
        for (i, &item) in items.iter().enumerate() {
            self.detach(item);
            if let NodeData::Block { kind, .. } = &mut self.node_mut(item)?.data {
                *kind = BlockKind::Paragraph;
            }
            self.insert_child(ROOT, index + i, item);
        }
        Ok(items)
    }

    /// Copies the top-level blocks of `fragment` after `after`, or at the end.
    pub fn insert_fragment(&mut self, after: Option<NodeId>, fragment: &Document) -> Vec<NodeId> {
        let mut index = after
            .and_then(|a| self.index_in_parent(a).map(|i| i + 1))
            .unwrap_or(self.top_level_blocks().len());
        let mut inserted = Vec::new();
        for &child in fragment.top_level_blocks() {
            let copy = self.graft(fragment, child);
            self.insert_child(ROOT, index, copy);
            inserted.push(copy);
            index += 1;
        }
        inserted
    }

    /// Rebuilds the arena without detached nodes. Node ids change.
    pub fn compact(&mut self) {
        let mut fresh = Document::new();
        for &child in self.top_level_blocks() {
            let copy = fresh.graft(self, child);
            fresh.append_child(ROOT, copy);
        }
        *self = fresh;
    }

    // ==================== Arena ====================

    fn node_mut(&mut self, id: NodeId) -> DocumentResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(DocumentError::NodeNotFound(id))
    }

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node::new(data));
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.children.retain(|&c| c != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
    }

    fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    fn graft(&mut self, other: &Document, id: NodeId) -> NodeId {
        let data = other
            .node(id)
            .map(|n| n.data.clone())
            .unwrap_or(NodeData::Text(Run::new("", Marks::NONE)));
        let copy = self.alloc(data);
        for &child in other.children(id) {
            let child_copy = self.graft(other, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Appends a run to a text block, extending the last run if marks match.
    pub(crate) fn push_run(&mut self, block: NodeId, run: Run) {
        if let Some(&last) = self.children(block).last() {
            if let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.nodes.get_mut(last.0)
            {
                if existing.marks == run.marks {
                    existing.text.push_str(&run.text);
                    return;
                }
            }
        }
        let id = self.alloc(NodeData::Text(run));
        self.append_child(block, id);
    }

    /// Trims spaces at the edges of every text block.
    pub(crate) fn trim_block_edges(&mut self) {
        for span in self.spans() {
            let children = self.children(span.block).to_vec();
            for &child in &children {
                if let Some(Node {
                    data: NodeData::Text(run),
                    ..
                }) = self.nodes.get_mut(child.0)
                {
                    run.text = run.text.trim_start_matches(' ').to_string();
                    if !run.text.is_empty() {
                        break;
                    }
                }
            }
            for &child in children.iter().rev() {
                if let Some(Node {
                    data: NodeData::Text(run),
                    ..
                }) = self.nodes.get_mut(child.0)
                {
                    run.text = run.text.trim_end_matches(' ').to_string();
                    if !run.text.is_empty() {
                        break;
                    }
                }
            }
            self.merge_runs(span.block);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.to_markup() == other.to_markup()
    }
}

fn byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

fn normalize_words(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(markup: &str) -> Document {
        Document::from_markup(markup).unwrap()
    }

    #[test]
    fn test_spans_leave_a_gap_between_blocks() {
        let d = doc("<p>abc</p><p>de</p>");
        let spans = d.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end), (0, 3));
        assert_eq!((spans[1].start, spans[1].end), (4, 6));
        assert_eq!(d.len(), 6);
    }

    #[test]
    fn test_block_and_top_level_spans_agree() {
        let d = doc("<p>ab</p><ul><li>c</li><li>de</li></ul><p>f</p>");
        let tops = d.top_level_spans();
        assert_eq!(tops.len(), 3);
        for (id, start, end) in tops {
            assert_eq!(d.block_span(id), Some((start, end)));
        }
        let list = d.top_level_blocks()[1];
        assert_eq!(d.block_span(list), Some((3, 7)));
        assert_eq!(d.len(), d.spans().last().unwrap().end);
        assert_eq!(Document::new().len(), 0);
    }

    #[test]
    fn test_nearest_block_walks_up_from_run() {
        let d = doc("<ul><li>item</li></ul>");
        let (run, local) = d.container_at(2).unwrap();
        assert_eq!(local, 2);
        let block = d.nearest_block(run).unwrap();
        assert_eq!(d.block_kind(block), Some(BlockKind::ListItem));
        let top = d.top_level_ancestor(run).unwrap();
        assert_eq!(d.block_kind(top), Some(BlockKind::BulletList));
    }

    #[test]
    fn test_toggle_marks_adds_then_removes() {
        let mut d = doc("<p>hello world</p>");
        assert!(d.toggle_marks(Selection::new(0, 5), Marks::BOLD));
        assert_eq!(d.to_markup(), "<p><strong>hello</strong> world</p>");
        assert!(d.toggle_marks(Selection::new(0, 5), Marks::BOLD));
        assert_eq!(d.to_markup(), "<p>hello world</p>");
    }

    #[test]
    fn test_toggle_marks_partial_overlap_adds() {
        let mut d = doc("<p><em>ab</em>cd</p>");
        d.toggle_marks(Selection::new(1, 3), Marks::ITALIC);
        assert_eq!(d.to_markup(), "<p><em>abc</em>d</p>");
    }

    #[test]
    fn test_delete_across_blocks_merges() {
        let mut d = doc("<p>abc</p><p>def</p><p>ghi</p>");
        d.delete(Selection::new(2, 9)).unwrap();
        assert_eq!(d.to_markup(), "<p>abhi</p>");
    }

    #[test]
    fn test_delete_prunes_emptied_list() {
        let mut d = doc("<p>ab</p><ul><li>x</li></ul><p>cd</p>");
        d.delete(Selection::new(1, 6)).unwrap();
        assert_eq!(d.to_markup(), "<p>ad</p>");
    }

    #[test]
    fn test_format_block_keeps_alignment() {
        let mut d = doc("<p style=\"text-align: center\"><strong>Intro</strong></p>");
        let block = d.top_level_blocks()[0];
        d.format_block(block, BlockKind::Heading1).unwrap();
        assert_eq!(
            d.to_markup(),
            "<h1 style=\"text-align: center\"><strong>Intro</strong></h1>"
        );
    }

    #[test]
    fn test_format_block_keeps_whitespace_and_marks() {
        let mut d = doc("<p>Intro</p>");
        let block = d.top_level_blocks()[0];
        d.insert_text(5, "  two   <b>").unwrap();
        let before = d.text_of(block);
        assert_eq!(before, "Intro  two   <b>");

        let heading = d.format_block(block, BlockKind::Heading1).unwrap();
        assert_eq!(d.text_of(heading), before);
        assert_eq!(d.block_kind(heading), Some(BlockKind::Heading1));
    }

    #[test]
    fn test_replace_block_refuses_list_items() {
        let mut d = doc("<ul><li>item</li></ul>");
        let item = d.blocks_of_kind(BlockKind::ListItem)[0];
        assert!(d.format_block(item, BlockKind::Heading1).is_err());
        assert!(d.replace_block(item, BlockKind::Heading1).is_err());
    }

    #[test]
    fn test_wrap_and_unwrap_list() {
        let mut d = doc("<p>a</p><p>b</p>");
        let blocks = d.top_level_blocks().to_vec();
        let list = d.wrap_in_list(&blocks, BlockKind::BulletList).unwrap();
        assert_eq!(d.to_markup(), "<ul><li>a</li><li>b</li></ul>");
        d.unwrap_list(list).unwrap();
        assert_eq!(d.to_markup(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_insert_fragment_after_block() {
        let mut d = doc("<p>a</p><p>b</p>");
        let fragment = doc("<h2>x</h2>");
        let first = d.top_level_blocks()[0];
        d.insert_fragment(Some(first), &fragment);
        assert_eq!(d.to_markup(), "<p>a</p><h2>x</h2><p>b</p>");
    }

    #[test]
    fn test_compact_preserves_markup() {
        let mut d = doc("<p>a</p><p>b</p>");
        let first = d.top_level_blocks()[0];
        d.replace_block(first, BlockKind::Heading2).unwrap();
        let before = d.to_markup();
        d.compact();
        assert_eq!(d.to_markup(), before);
        assert_eq!(d.top_level_blocks().len(), 2);
    }

    #[test]
    fn test_word_and_phrase_matching() {
        let d = doc("<p class=\"title\">Annual  Report</p><h1><em>Introduction</em>, part one</h1>");
        assert!(d.contains_phrase("annual report"));
        assert!(d.has_block_with_word(BlockKind::Heading1, "introduction"));
        assert!(!d.has_block_with_word(BlockKind::Heading1, "intro"));
    }
}
