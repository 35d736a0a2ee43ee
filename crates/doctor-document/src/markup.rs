//! Markup reading and writing.
//!
//! The accepted markup is a forgiving HTML subset tokenized with
//! `quick-xml`. Unknown elements disappear but keep their text,
//! scripts and styles disappear entirely, and block elements nested
//! inside text blocks are flattened into their parent.

use quick_xml::escape::{escape, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;

use crate::tree::{Alignment, BlockKind, Document, Marks, NodeData, NodeId, Run};
use crate::{DocumentError, DocumentResult};

/// Elements whose whole subtree is dropped.
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "iframe", "object", "template"];

/// Elements that never have content or an end tag in HTML.
const VOID_TAGS: &[&str] = &["img", "hr", "input", "meta", "link", "wbr"];

enum Frame {
    Block { tag: String, id: NodeId },
    Mark { tag: String, marks: Marks },
    Implicit { id: NodeId },
    Ignored { tag: String },
}

impl Frame {
    fn tag(&self) -> Option<&str> {
        match self {
            Frame::Block { tag, .. } | Frame::Mark { tag, .. } | Frame::Ignored { tag } => {
                Some(tag)
            }
            Frame::Implicit { .. } => None,
        }
    }

    fn block(&self) -> Option<NodeId> {
        match self {
            Frame::Block { id, .. } | Frame::Implicit { id } => Some(*id),
            _ => None,
        }
    }
}

struct Builder {
    doc: Document,
    stack: Vec<Frame>,
    skip_depth: usize,
}

impl Builder {
    fn new() -> Self {
        Self {
            doc: Document::new(),
            stack: Vec::with_capacity(8),
            skip_depth: 0,
        }
    }

    fn current_block(&self) -> NodeId {
        self.stack
            .iter()
            .rev()
            .find_map(Frame::block)
            .unwrap_or(self.doc.root())
    }

    fn current_marks(&self) -> Marks {
        self.stack.iter().fold(Marks::NONE, |acc, frame| match frame {
            Frame::Mark { marks, .. } => acc.union(*marks),
            _ => acc,
        })
    }

    fn start(&mut self, tag: &str, class: Option<&str>, align: Option<Alignment>, empty: bool) {
        let skipped = SKIPPED_TAGS.contains(&tag);
        if self.skip_depth > 0 || skipped {
            if skipped && !empty {
                self.skip_depth += 1;
            }
            return;
        }
        if tag == "br" {
            self.push_text("\n".to_string(), true);
            return;
        }
        if VOID_TAGS.contains(&tag) {
            return;
        }
        if let Some(marks) = marks_for(tag) {
            if !empty {
                self.stack.push(Frame::Mark {
                    tag: tag.to_string(),
                    marks,
                });
            }
            return;
        }
        if let Some(kind) = block_kind_for(tag, class) {
            self.start_block(tag, kind, align);
            if empty {
                self.end(tag);
            }
            return;
        }
        if !empty {
            self.stack.push(Frame::Ignored {
                tag: tag.to_string(),
            });
        }
    }

    fn start_block(&mut self, tag: &str, kind: BlockKind, align: Option<Alignment>) {
        self.stack.retain(|f| !matches!(f, Frame::Implicit { .. }));

        let parent = self.current_block();
        let parent_kind = self.doc.block_kind(parent);
        let flatten = Frame::Ignored {
            tag: tag.to_string(),
        };
        let kind = match parent_kind {
            Some(k) if k.is_textual() => {
                self.stack.push(flatten);
                return;
            }
            Some(k) if k.is_list() => {
                if kind != BlockKind::ListItem {
                    self.stack.push(flatten);
                    return;
                }
                kind
            }
            _ if kind == BlockKind::ListItem => BlockKind::Paragraph,
            _ => kind,
        };

        let id = self.doc.alloc(NodeData::Block { kind, align });
        self.doc.append_child(parent, id);
        self.stack.push(Frame::Block {
            tag: tag.to_string(),
            id,
        });
    }

    fn end(&mut self, tag: &str) {
        if self.skip_depth > 0 {
            if SKIPPED_TAGS.contains(&tag) {
                self.skip_depth -= 1;
            }
            return;
        }
        if let Some(pos) = self.stack.iter().rposition(|f| f.tag() == Some(tag)) {
            self.stack.truncate(pos);
        }
    }

    fn text(&mut self, raw: &str) {
        if self.skip_depth > 0 {
            return;
        }
        let collapsed = collapse_whitespace(raw);
        if !collapsed.is_empty() {
            self.push_text(collapsed, false);
        }
    }

    fn push_text(&mut self, text: String, keep_blank: bool) {
        let mut block = self.current_block();
        let kind = self.doc.block_kind(block);
        if !kind.is_some_and(BlockKind::is_textual) {
            if !keep_blank && text.trim().is_empty() {
                return;
            }
            let implicit = if kind.is_some_and(BlockKind::is_list) {
                BlockKind::ListItem
            } else {
                BlockKind::Paragraph
            };
            let id = self.doc.alloc(NodeData::Block {
                kind: implicit,
                align: None,
            });
            self.doc.append_child(block, id);
            self.stack.push(Frame::Implicit { id });
            block = id;
        }
        let mut text = text;
        if !keep_blank && text.starts_with(' ') && self.ends_with_space(block) {
            text.remove(0);
            if text.is_empty() {
                return;
            }
        }
        let marks = self.current_marks();
        self.doc.push_run(block, Run::new(text, marks));
    }

    /// Whitespace collapses across inline element boundaries too.
    fn ends_with_space(&self, block: NodeId) -> bool {
        self.doc
            .children(block)
            .last()
            .and_then(|&c| self.doc.run(c))
            .is_some_and(|r| r.text.ends_with(' '))
    }

    fn finish(mut self) -> Document {
        self.doc.trim_block_edges();
        self.doc
    }
}

/// Parses markup into a document.
pub fn parse(markup: &str) -> DocumentResult<Document> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut builder = Builder::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = tag_name(e.name().as_ref());
                let (class, align) = read_attributes(&reader, &e);
                builder.start(&tag, class.as_deref(), align, false);
            }
            Ok(Event::Empty(e)) => {
                let tag = tag_name(e.name().as_ref());
                let (class, align) = read_attributes(&reader, &e);
                builder.start(&tag, class.as_deref(), align, true);
            }
            Ok(Event::End(e)) => {
                builder.end(&tag_name(e.name().as_ref()));
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| markup_error(&reader, err))?;
                builder.text(&text);
            }
            Ok(Event::CData(e)) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| markup_error(&reader, err))?;
                builder.text(&text);
            }
            Ok(Event::GeneralRef(e)) => {
                let name = e.decode().map_err(|err| markup_error(&reader, err))?;
                if let Some(resolved) = resolve_reference(&name) {
                    builder.text(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(markup_error(&reader, err)),
        }
    }
    Ok(builder.finish())
}

/// Serializes a document to markup.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for &child in doc.top_level_blocks() {
        write_node(doc, child, &mut out);
    }
    out
}

/// Escapes plain text for embedding in markup.
pub fn escape_text(text: &str) -> String {
    escape(text).into_owned()
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let Some(node) = doc.node(id) else {
        return;
    };
    match node.data() {
        NodeData::Root => {
            for &child in node.children() {
                write_node(doc, child, out);
            }
        }
        NodeData::Block { kind, align } => {
            out.push('<');
            out.push_str(kind.tag());
            if let Some(class) = kind.class() {
                out.push_str(&format!(" class=\"{class}\""));
            }
            if let Some(align) = align {
                out.push_str(&format!(" style=\"text-align: {}\"", align.as_str()));
            }
            out.push('>');
            for &child in node.children() {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(kind.tag());
            out.push('>');
        }
        NodeData::Text(run) => write_run(run, out),
    }
}

fn write_run(run: &Run, out: &mut String) {
    let tags: Vec<&str> = [
        (run.marks.bold, "strong"),
        (run.marks.italic, "em"),
        (run.marks.underline, "u"),
    ]
    .into_iter()
    .filter_map(|(on, tag)| on.then_some(tag))
    .collect();

    for tag in &tags {
        out.push_str(&format!("<{tag}>"));
    }
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<br/>");
        }
        out.push_str(&escape(line));
    }
    for tag in tags.iter().rev() {
        out.push_str(&format!("</{tag}>"));
    }
}

fn read_attributes(reader: &Reader<&[u8]>, e: &BytesStart) -> (Option<String>, Option<Alignment>) {
    let mut class = None;
    let mut align = None;
    for attr in e.html_attributes().flatten() {
        let Ok(raw) = reader.decoder().decode(attr.value.as_ref()) else {
            continue;
        };
        let value = unescape_with(&raw, resolve_entity)
            .map(Cow::into_owned)
            .unwrap_or_else(|_| raw.to_string());
        match attr.key.as_ref() {
            b"class" => class = Some(value),
            b"style" => align = align.or_else(|| text_align(&value)),
            b"align" => align = align.or_else(|| Alignment::parse(&value)),
            _ => {}
        }
    }
    (class, align)
}

fn text_align(style: &str) -> Option<Alignment> {
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        (prop.trim().eq_ignore_ascii_case("text-align"))
            .then(|| Alignment::parse(value))
            .flatten()
    })
}

fn marks_for(tag: &str) -> Option<Marks> {
    match tag {
        "strong" | "b" => Some(Marks::BOLD),
        "em" | "i" => Some(Marks::ITALIC),
        "u" | "ins" => Some(Marks::UNDERLINE),
        _ => None,
    }
}

fn block_kind_for(tag: &str, class: Option<&str>) -> Option<BlockKind> {
    let has_class = |name: &str| class.is_some_and(|c| c.split_whitespace().any(|c| c == name));
    match tag {
        "p" | "div" if has_class("title") => Some(BlockKind::Title),
        "p" | "h4" | "h5" | "h6" => Some(BlockKind::Paragraph),
        "div" => Some(BlockKind::Div),
        "h1" => Some(BlockKind::Heading1),
        "h2" => Some(BlockKind::Heading2),
        "h3" => Some(BlockKind::Heading3),
        "li" => Some(BlockKind::ListItem),
        "ul" => Some(BlockKind::BulletList),
        "ol" => Some(BlockKind::NumberedList),
        "nav" if has_class("toc") => Some(BlockKind::TableOfContents),
        _ => None,
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

fn resolve_reference(name: &str) -> Option<String> {
    let entity = format!("&{name};");
    unescape_with(&entity, resolve_entity)
        .ok()
        .map(Cow::into_owned)
}

/// Collapses runs of ASCII whitespace into single spaces.
fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn markup_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Markup {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks_and_marks() {
        let doc = parse("<h1>Intro</h1>\n<p>Some <b>bold</b> and <i>italic</i></p>").unwrap();
        assert_eq!(doc.top_level_blocks().len(), 2);
        assert_eq!(
            serialize(&doc),
            "<h1>Intro</h1><p>Some <strong>bold</strong> and <em>italic</em></p>"
        );
    }

    #[test]
    fn test_stray_text_gets_implicit_paragraph() {
        let doc = parse("loose text<p>inside</p>").unwrap();
        assert_eq!(serialize(&doc), "<p>loose text</p><p>inside</p>");
    }

    #[test]
    fn test_nested_blocks_are_flattened() {
        let doc = parse("<li><p>item</p></li><ul><p>odd</p><li>ok</li></ul>").unwrap();
        assert_eq!(
            serialize(&doc),
            "<p>item</p><ul><li>odd</li><li>ok</li></ul>"
        );
    }

    #[test]
    fn test_line_breaks_and_entities() {
        let doc = parse("<p>a<br>b &amp; c&nbsp;d</p>").unwrap();
        assert_eq!(doc.plain_text(), "a\nb & c\u{a0}d");
        assert_eq!(serialize(&doc), "<p>a<br/>b &amp; c\u{a0}d</p>");
    }

    #[test]
    fn test_classes_and_alignment() {
        let doc = parse(
            "<div class=\"title\" align=\"right\">T</div><nav class=\"toc\"><p>x</p></nav>",
        )
        .unwrap();
        assert_eq!(
            serialize(&doc),
            "<p class=\"title\" style=\"text-align: right\">T</p><nav class=\"toc\"><p>x</p></nav>"
        );
    }
}
