//! Markup sanitizing.
//!
//! Anything merged into a document goes through here first. The
//! allow-list is exactly what the parser understands:
//!
//! - blocks: `p`, `div`, `h1`–`h3`, `ul`, `ol`, `li`, `nav.toc`, `.title`
//! - inline: `strong`/`b`, `em`/`i`, `u`, `br`
//! - attributes: `class` (title, toc) and `text-align` only
//!
//! Everything else is unwrapped to its text, and `script`/`style`
//! content is dropped. Text is re-escaped on output.

use crate::markup;
use crate::DocumentResult;

/// Returns the allow-listed form of block markup.
pub fn sanitize(markup: &str) -> DocumentResult<String> {
    Ok(markup::parse(markup)?.to_markup())
}
