//! Tolerant HTML/XHTML parsing into an arena tree.
//!
//! Page documents produced by comic converters are often only nearly
//! XHTML, so they go through html5ever's browser-grade tree builder rather
//! than a strict XML parser.

mod arena;
mod tree_sink;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use tree_sink::ArenaSink;

/// Parse a markup document. Never fails: whatever structure html5ever can
/// recover is returned.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}
