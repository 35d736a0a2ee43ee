//! # Doctor Document
//!
//! Block-structured rich text used by the layout simulator.
//!
//! ## Key Concepts
//!
//! ### Arena Tree
//! - `Document` owns every node in a flat arena (`Vec<Node>`)
//! - Nodes refer to each other by `NodeId` (an index), never by reference
//! - Walking "up" to the nearest block is an index-based ancestor search
//!
//! ### Explicit Selection
//! - A `Selection` is a plain value of character offsets
//! - Callers pass it in; the document never tracks a "current" selection
//!
//! ### Markup
//! - `parse` / `serialize` convert between the arena and a small HTML subset
//! - `sanitize` is a parse + serialize round through the allow-list

mod markup;
mod sanitize;
mod selection;
mod tree;

pub use markup::{escape_text, parse, serialize};
pub use sanitize::sanitize;
pub use selection::Selection;
pub use tree::{Alignment, BlockKind, BlockSpan, Document, Marks, Node, NodeData, NodeId, Run};

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur during document operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Malformed markup at byte {position}: {message}")]
    Markup { position: u64, message: String },

    #[error("Node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("Offset {offset} is out of bounds (length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("Node {0} is not a block")]
    NotABlock(NodeId),

    #[error("Block {0} cannot be replaced in place")]
    NotReplaceable(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_creation() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.len(), 0);
    }

    #[test]
    fn test_document_from_markup() {
        let doc = Document::from_markup("<p>Hello, World!</p>").unwrap();
        assert_eq!(doc.plain_text(), "Hello, World!");
        assert_eq!(doc.to_markup(), "<p>Hello, World!</p>");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut doc = Document::from_markup("<p>Hello</p>").unwrap();
        doc.insert_text(5, ", World!").unwrap();
        assert_eq!(doc.plain_text(), "Hello, World!");

        doc.delete(Selection::new(5, 7)).unwrap();
        assert_eq!(doc.plain_text(), "HelloWorld!");
    }

    #[test]
    fn test_sanitize_drops_scripts() {
        let clean = sanitize("<p onclick=\"x()\">Hi<script>alert(1)</script></p>").unwrap();
        assert_eq!(clean, "<p>Hi</p>");
    }
}
