//! Markdown-subset rendering for streamed answers.
//!
//! Output is an HTML fragment. All text taken from the answer is escaped;
//! the only tags present are the ones emitted by [`block`] and [`inline`].

pub mod block;
pub mod inline;
mod snippet;

pub use block::{parse, render, Block, ListKind};
pub use inline::{escape_html, format as format_inline};
pub use snippet::{snippet, DEFAULT_SNIPPET_CHARS};
