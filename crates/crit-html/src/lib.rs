//! crit HTML stream
//!
//! Streaming rewriter for server-rendered HTML. Tokens used by the markup
//! are harvested on the fly and every `<style>` region is replaced with the
//! subset of the project's CSS those tokens can select.

mod pipe;
pub mod scanner;
mod stream;
mod writer;

use std::sync::Arc;

use crit_css::{BodyRef, StyleLookup, UsedTokens};

pub use pipe::pipe;
pub use scanner::{TagScanner, MAX_TOKEN_LEN};
pub use stream::{CriticalStyleStream, StreamConfig, StreamStats};
pub use writer::CriticalStyleWriter;

/// Where a stream gets its CSS from
pub trait StyleSource {
    /// Bodies that may apply given the tokens seen
    fn select(&self, tokens: &UsedTokens) -> Vec<BodyRef>;

    /// Render bodies, with or without the global at-rules
    fn render(&self, bodies: &[BodyRef], globals: bool) -> String;

    fn critical_css(&self, tokens: &UsedTokens) -> String {
        self.render(&self.select(tokens), true)
    }
}

impl StyleSource for StyleLookup {
    fn select(&self, tokens: &UsedTokens) -> Vec<BodyRef> {
        self.query_tokens(tokens)
    }

    fn render(&self, bodies: &[BodyRef], globals: bool) -> String {
        self.serialize_with(bodies, globals)
    }
}

impl<T: StyleSource + ?Sized> StyleSource for &T {
    fn select(&self, tokens: &UsedTokens) -> Vec<BodyRef> {
        (**self).select(tokens)
    }

    fn render(&self, bodies: &[BodyRef], globals: bool) -> String {
        (**self).render(bodies, globals)
    }
}

impl<T: StyleSource + ?Sized> StyleSource for Arc<T> {
    fn select(&self, tokens: &UsedTokens) -> Vec<BodyRef> {
        (**self).select(tokens)
    }

    fn render(&self, bodies: &[BodyRef], globals: bool) -> String {
        (**self).render(bodies, globals)
    }
}

/// Rewrite a complete document in one go
pub fn rewrite_document<S: StyleSource>(source: S, html: &str) -> String {
    let mut stream = CriticalStyleStream::new(source);
    let mut out = Vec::with_capacity(html.len());
    stream.push(html.as_bytes(), &mut out);
    stream.finish(&mut out);
    // Only ASCII markup is inserted or removed, so valid input stays valid
    String::from_utf8_lossy(&out).into_owned()
}
