//! Critical Style Stream
//!
//! Chunked HTML transform. Markup passes through byte-identical while the
//! scanner harvests selector tokens; the content of each `<style>` region
//! is dropped and replaced, at the region's close, with the critical CSS
//! for the tokens seen so far.
//!
//! Nested and whitespace-separated consecutive `<style>` tags collapse into
//! one region. After a close only whitespace (plus a partial `<style`
//! prefix) is held back, bounded by [`StreamConfig::max_lookback`].

use std::collections::HashSet;

use crit_css::{BodyRef, UsedTokens};

use crate::scanner::{is_space, Boundary, BoundaryMatcher, ScanEvent, Step, TagScanner};
use crate::StyleSource;

/// Stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bytes held after a region closes while waiting for a continuation
    pub max_lookback: usize,
    /// Emit each body and the globals at most once per response
    pub dedupe_regions: bool,
    /// Chunk size used by [`crate::pipe`]
    pub read_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_lookback: 1024,
            dedupe_regions: false,
            read_buffer: 16 * 1024,
        }
    }
}

/// Counters for one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Regions replaced with critical CSS
    pub regions: u32,
    /// Extra `<style>` tags folded into an open or just closed region
    pub merged_tags: u32,
    /// Distinct selector tokens harvested
    pub tokens: usize,
}

/// Remainder of a `<style ...>` or `</style ...>` tag being skipped
#[derive(Debug, Clone, Copy)]
struct SkipTag {
    closes: bool,
    quote: Option<u8>,
}

impl SkipTag {
    fn open() -> Self {
        Self { closes: false, quote: None }
    }

    fn close() -> Self {
        Self { closes: true, quote: None }
    }

    /// True once the tag's `>` is consumed
    fn feed(&mut self, byte: u8) -> bool {
        match self.quote {
            Some(quote) => {
                if byte == quote {
                    self.quote = None;
                }
                false
            }
            None => match byte {
                b'"' | b'\'' => {
                    self.quote = Some(byte);
                    false
                }
                b'>' => true,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Markup,
    /// Inside a region; `depth` counts open `<style>` tags
    Style { depth: u32, skip: Option<SkipTag> },
    /// Region closed, holding whitespace in case another `<style>` follows
    PendingClose { skip: Option<SkipTag> },
}

/// One response's critical style transform
pub struct CriticalStyleStream<S> {
    source: S,
    config: StreamConfig,
    tokens: UsedTokens,
    scanner: TagScanner,
    boundary: BoundaryMatcher,
    mode: Mode,
    held: Vec<u8>,
    emitted: HashSet<BodyRef>,
    globals_sent: bool,
    stats: StreamStats,
}

impl<S: StyleSource> CriticalStyleStream<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, StreamConfig::default())
    }

    pub fn with_config(source: S, config: StreamConfig) -> Self {
        Self {
            source,
            config,
            tokens: UsedTokens::new(),
            scanner: TagScanner::new(),
            boundary: BoundaryMatcher::new(b"style"),
            mode: Mode::Markup,
            held: Vec::new(),
            emitted: HashSet::new(),
            globals_sent: false,
            stats: StreamStats::default(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Tokens harvested so far
    pub fn seen_tokens(&self) -> &UsedTokens {
        &self.tokens
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            tokens: self.tokens.len(),
            ..self.stats
        }
    }

    /// Inside a region or holding back after one
    pub fn in_style_region(&self) -> bool {
        !matches!(self.mode, Mode::Markup)
    }

    /// Transform one chunk, appending whatever is final to `out`
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        let before = out.len();
        self.stats.bytes_in += chunk.len() as u64;
        for &byte in chunk {
            self.feed(byte, out);
        }
        self.stats.bytes_out += (out.len() - before) as u64;
    }

    /// End of input: close an open region and release held bytes
    pub fn finish(mut self, out: &mut Vec<u8>) -> StreamStats {
        let before = out.len();
        match self.mode {
            Mode::Markup => {}
            Mode::Style { depth, .. } => {
                tracing::debug!("Input ended inside a style region (depth {})", depth);
                self.close_region(out);
            }
            Mode::PendingClose { .. } => {
                let held = std::mem::take(&mut self.held);
                self.close_region(out);
                out.extend_from_slice(&held);
            }
        }
        self.stats.bytes_out += (out.len() - before) as u64;
        self.stats()
    }

    /// Drop the stream without flushing; for aborted responses
    pub fn abort(self) -> StreamStats {
        let stats = self.stats();
        tracing::debug!(
            "Stream aborted after {} bytes ({} held)",
            stats.bytes_in,
            self.held.len()
        );
        stats
    }

    fn feed(&mut self, byte: u8, out: &mut Vec<u8>) {
        match self.mode {
            Mode::Markup => {
                out.push(byte);
                if self.scanner.feed(byte, &mut self.tokens) == ScanEvent::StyleOpened {
                    tracing::trace!("Style region {} opened", self.stats.regions + 1);
                    self.boundary.reset();
                    self.mode = Mode::Style { depth: 1, skip: None };
                }
            }
            Mode::Style {
                depth,
                skip: Some(mut tag),
            } => {
                if !tag.feed(byte) {
                    self.mode = Mode::Style { depth, skip: Some(tag) };
                } else if tag.closes {
                    self.close_one(depth);
                } else {
                    self.mode = Mode::Style { depth, skip: None };
                }
            }
            Mode::Style { depth, skip: None } => match self.boundary.feed(byte) {
                Step::Found(Boundary::Open) => {
                    self.stats.merged_tags += 1;
                    self.mode = Mode::Style {
                        depth: depth + 1,
                        skip: (byte != b'>').then(SkipTag::open),
                    };
                }
                Step::Found(Boundary::Close) => {
                    if byte == b'>' {
                        self.close_one(depth);
                    } else {
                        self.mode = Mode::Style {
                            depth,
                            skip: Some(SkipTag::close()),
                        };
                    }
                }
                _ => {}
            },
            Mode::PendingClose { skip } => self.feed_pending(byte, skip, out),
        }
    }

    fn close_one(&mut self, depth: u32) {
        if depth > 1 {
            self.mode = Mode::Style {
                depth: depth - 1,
                skip: None,
            };
        } else {
            self.held.clear();
            self.boundary.reset();
            self.mode = Mode::PendingClose { skip: None };
        }
    }

    fn feed_pending(&mut self, byte: u8, skip: Option<SkipTag>, out: &mut Vec<u8>) {
        // Stray `</style ...>` right after a close belongs to the region
        if let Some(mut tag) = skip {
            let ended = tag.feed(byte);
            self.mode = Mode::PendingClose {
                skip: (!ended).then_some(tag),
            };
            return;
        }

        self.held.push(byte);
        if self.boundary.is_idle() && is_space(byte) {
            if self.held.len() > self.config.max_lookback {
                self.release_pending(out);
            }
            return;
        }

        match self.boundary.feed(byte) {
            Step::Found(Boundary::Open) => {
                self.held.clear();
                self.stats.merged_tags += 1;
                self.mode = Mode::Style {
                    depth: 1,
                    skip: (byte != b'>').then(SkipTag::open),
                };
            }
            Step::Found(Boundary::Close) => {
                self.held.clear();
                self.mode = Mode::PendingClose {
                    skip: (byte != b'>').then(SkipTag::close),
                };
            }
            Step::Pending => {}
            Step::Idle | Step::Mismatch => self.release_pending(out),
        }
    }

    /// Close the region and replay the held bytes as markup
    fn release_pending(&mut self, out: &mut Vec<u8>) {
        let held = std::mem::take(&mut self.held);
        self.close_region(out);
        for byte in held {
            self.feed(byte, out);
        }
    }

    fn close_region(&mut self, out: &mut Vec<u8>) {
        let selected = self.source.select(&self.tokens);
        let css = if self.config.dedupe_regions {
            let fresh: Vec<BodyRef> = selected
                .into_iter()
                .filter(|reference| self.emitted.insert(*reference))
                .collect();
            let globals = !self.globals_sent;
            self.globals_sent = true;
            self.source.render(&fresh, globals)
        } else {
            self.source.render(&selected, true)
        };

        out.extend_from_slice(css.as_bytes());
        out.extend_from_slice(b"</style>");
        self.stats.regions += 1;
        self.boundary.reset();
        self.mode = Mode::Markup;

        tracing::trace!(
            "Style region {} closed: {} bytes of CSS for {} tokens",
            self.stats.regions,
            css.len(),
            self.tokens.len()
        );
    }
}
