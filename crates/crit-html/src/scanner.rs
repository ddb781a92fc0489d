//! Incremental Tag Scanner
//!
//! Byte-at-a-time HTML start-tag scanner that harvests selector tokens.
//! State survives arbitrary chunk boundaries; only the current tag name,
//! attribute name and class/id word are buffered, each capped at
//! [`MAX_TOKEN_LEN`].

use crit_css::UsedTokens;

/// Longest tag name, attribute name or class word kept
pub const MAX_TOKEN_LEN: usize = 4096;

/// What the scanner saw at the current byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    None,
    /// The `>` of a `<style ...>` start tag was consumed
    StyleOpened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    EndTag,
    TagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    /// Quoted value, holds the quote byte
    AttrValue(u8),
    UnquotedValue,
    MarkupDecl,
    MarkupDash,
    /// Right after `<!--`, holds the dashes seen since (0 or 1)
    CommentStart(u8),
    /// Comment body, holds the number of trailing dashes
    Comment(u8),
    Bogus,
    /// Script contents, only `</script` is looked for
    RawText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    Class,
    Id,
    Other,
}

/// Start-tag scanner feeding a [`UsedTokens`] set
#[derive(Debug, Clone)]
pub struct TagScanner {
    state: State,
    name: Vec<u8>,
    attr: Vec<u8>,
    attr_kind: AttrKind,
    word: Vec<u8>,
    script_end: BoundaryMatcher,
}

impl TagScanner {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            name: Vec::new(),
            attr: Vec::new(),
            attr_kind: AttrKind::Other,
            word: Vec::new(),
            script_end: BoundaryMatcher::new(b"script"),
        }
    }

    /// Between tags, nothing partially scanned
    pub fn is_idle(&self) -> bool {
        self.state == State::Text
    }

    pub fn feed(&mut self, byte: u8, tokens: &mut UsedTokens) -> ScanEvent {
        match self.state {
            State::Text => {
                if byte == b'<' {
                    self.state = State::TagOpen;
                }
            }
            State::TagOpen => match byte {
                b'/' => self.state = State::EndTag,
                b'!' => self.state = State::MarkupDecl,
                b'?' => self.state = State::Bogus,
                b'<' => {}
                _ if byte.is_ascii_alphabetic() => {
                    self.name.clear();
                    self.name.push(byte.to_ascii_lowercase());
                    self.state = State::TagName;
                }
                _ => self.state = State::Text,
            },
            State::EndTag => {
                if byte == b'>' {
                    self.state = State::Text;
                }
            }
            State::TagName => match byte {
                b'>' => {
                    self.finish_name(tokens);
                    return self.end_start_tag();
                }
                b'/' => {
                    self.finish_name(tokens);
                    self.state = State::BeforeAttrName;
                }
                _ if is_space(byte) => {
                    self.finish_name(tokens);
                    self.state = State::BeforeAttrName;
                }
                _ => push_capped(&mut self.name, byte.to_ascii_lowercase()),
            },
            State::BeforeAttrName => match byte {
                b'>' => return self.end_start_tag(),
                b'/' => {}
                _ if is_space(byte) => {}
                _ => self.begin_attr(byte),
            },
            State::AttrName => match byte {
                b'>' => {
                    self.finish_attr_name(tokens);
                    return self.end_start_tag();
                }
                b'=' => {
                    self.finish_attr_name(tokens);
                    self.state = State::BeforeAttrValue;
                }
                b'/' => {
                    self.finish_attr_name(tokens);
                    self.state = State::BeforeAttrName;
                }
                _ if is_space(byte) => {
                    self.finish_attr_name(tokens);
                    self.state = State::AfterAttrName;
                }
                _ => push_capped(&mut self.attr, byte.to_ascii_lowercase()),
            },
            State::AfterAttrName => match byte {
                b'>' => return self.end_start_tag(),
                b'=' => self.state = State::BeforeAttrValue,
                b'/' => self.state = State::BeforeAttrName,
                _ if is_space(byte) => {}
                _ => self.begin_attr(byte),
            },
            State::BeforeAttrValue => match byte {
                b'"' | b'\'' => self.state = State::AttrValue(byte),
                b'>' => {
                    self.finish_value(tokens);
                    return self.end_start_tag();
                }
                _ if is_space(byte) => {}
                _ => {
                    self.state = State::UnquotedValue;
                    self.value_byte(byte, tokens);
                }
            },
            State::AttrValue(quote) => {
                if byte == quote {
                    self.finish_value(tokens);
                    self.state = State::BeforeAttrName;
                } else {
                    self.value_byte(byte, tokens);
                }
            }
            State::UnquotedValue => match byte {
                b'>' => {
                    self.finish_value(tokens);
                    return self.end_start_tag();
                }
                _ if is_space(byte) => {
                    self.finish_value(tokens);
                    self.state = State::BeforeAttrName;
                }
                _ => self.value_byte(byte, tokens),
            },
            State::MarkupDecl => {
                self.state = match byte {
                    b'-' => State::MarkupDash,
                    b'>' => State::Text,
                    _ => State::Bogus,
                }
            }
            State::MarkupDash => {
                self.state = match byte {
                    b'-' => State::CommentStart(0),
                    b'>' => State::Text,
                    _ => State::Bogus,
                }
            }
            // `<!-->` and `<!--->` are complete (empty) comments
            State::CommentStart(dashes) => {
                self.state = match byte {
                    b'>' => State::Text,
                    b'-' if dashes == 0 => State::CommentStart(1),
                    b'-' => State::Comment(2),
                    _ => State::Comment(0),
                }
            }
            State::Comment(dashes) => {
                self.state = match byte {
                    b'-' => State::Comment(dashes.saturating_add(1)),
                    b'>' if dashes >= 2 => State::Text,
                    _ => State::Comment(0),
                }
            }
            State::Bogus => {
                if byte == b'>' {
                    self.state = State::Text;
                }
            }
            State::RawText => {
                if let Step::Found(Boundary::Close) = self.script_end.feed(byte) {
                    self.state = if byte == b'>' { State::Text } else { State::EndTag };
                }
            }
        }
        ScanEvent::None
    }

    fn finish_name(&mut self, tokens: &mut UsedTokens) {
        tokens.insert_tag(&String::from_utf8_lossy(&self.name));
    }

    fn end_start_tag(&mut self) -> ScanEvent {
        self.state = State::Text;
        self.attr_kind = AttrKind::Other;
        match self.name.as_slice() {
            b"style" => ScanEvent::StyleOpened,
            b"script" => {
                self.script_end.reset();
                self.state = State::RawText;
                ScanEvent::None
            }
            _ => ScanEvent::None,
        }
    }

    fn begin_attr(&mut self, byte: u8) {
        self.attr.clear();
        self.attr.push(byte.to_ascii_lowercase());
        self.attr_kind = AttrKind::Other;
        self.state = State::AttrName;
    }

    fn finish_attr_name(&mut self, tokens: &mut UsedTokens) {
        self.attr_kind = match self.attr.as_slice() {
            b"class" => AttrKind::Class,
            b"id" => AttrKind::Id,
            _ => AttrKind::Other,
        };
        self.word.clear();
        tokens.insert_attribute(&String::from_utf8_lossy(&self.attr));
    }

    fn value_byte(&mut self, byte: u8, tokens: &mut UsedTokens) {
        match self.attr_kind {
            AttrKind::Class if is_space(byte) => self.flush_word(tokens),
            AttrKind::Class | AttrKind::Id => push_capped(&mut self.word, byte),
            AttrKind::Other => {}
        }
    }

    fn finish_value(&mut self, tokens: &mut UsedTokens) {
        match self.attr_kind {
            AttrKind::Class => self.flush_word(tokens),
            AttrKind::Id => {
                let id = String::from_utf8_lossy(&self.word);
                let id = id.trim();
                if !id.is_empty() {
                    tokens.insert_id(id);
                }
                self.word.clear();
            }
            AttrKind::Other => {}
        }
        self.attr_kind = AttrKind::Other;
    }

    fn flush_word(&mut self, tokens: &mut UsedTokens) {
        if !self.word.is_empty() {
            tokens.insert_class(&String::from_utf8_lossy(&self.word));
            self.word.clear();
        }
    }
}

impl Default for TagScanner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BOUNDARY MATCHING
// ============================================================================

/// Which tag boundary was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// `<name`
    Open,
    /// `</name`
    Close,
}

/// Result of feeding one byte to a [`BoundaryMatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing in progress
    Idle,
    /// Prefix of a boundary matched so far
    Pending,
    /// Boundary complete; the byte was the delimiter after the name
    Found(Boundary),
    /// A partial match was broken by this byte
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    Idle,
    Lt,
    Slash,
    Name { matched: usize, closing: bool },
}

/// Detects `<name` / `</name` followed by whitespace, `/` or `>`,
/// ASCII case-insensitively. Holds only its progress, never the bytes.
#[derive(Debug, Clone)]
pub struct BoundaryMatcher {
    name: &'static [u8],
    state: MatchState,
}

impl BoundaryMatcher {
    pub fn new(name: &'static [u8]) -> Self {
        Self {
            name,
            state: MatchState::Idle,
        }
    }

    pub fn reset(&mut self) {
        self.state = MatchState::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.state == MatchState::Idle
    }

    pub fn feed(&mut self, byte: u8) -> Step {
        match self.state {
            MatchState::Idle => {
                if byte == b'<' {
                    self.state = MatchState::Lt;
                    Step::Pending
                } else {
                    Step::Idle
                }
            }
            MatchState::Lt if byte == b'/' => {
                self.state = MatchState::Slash;
                Step::Pending
            }
            MatchState::Lt | MatchState::Slash => {
                let closing = self.state == MatchState::Slash;
                if byte.eq_ignore_ascii_case(&self.name[0]) {
                    self.state = MatchState::Name { matched: 1, closing };
                    Step::Pending
                } else {
                    self.mismatch(byte)
                }
            }
            MatchState::Name { matched, closing } if matched == self.name.len() => {
                if is_space(byte) || byte == b'>' || byte == b'/' {
                    self.state = MatchState::Idle;
                    Step::Found(if closing { Boundary::Close } else { Boundary::Open })
                } else {
                    self.mismatch(byte)
                }
            }
            MatchState::Name { matched, closing } => {
                if byte.eq_ignore_ascii_case(&self.name[matched]) {
                    self.state = MatchState::Name {
                        matched: matched + 1,
                        closing,
                    };
                    Step::Pending
                } else {
                    self.mismatch(byte)
                }
            }
        }
    }

    fn mismatch(&mut self, byte: u8) -> Step {
        self.state = if byte == b'<' { MatchState::Lt } else { MatchState::Idle };
        Step::Mismatch
    }
}

pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0C)
}

fn push_capped(buffer: &mut Vec<u8>, byte: u8) {
    if buffer.len() < MAX_TOKEN_LEN {
        buffer.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(chunks: &[&str]) -> (UsedTokens, Vec<ScanEvent>) {
        let mut scanner = TagScanner::new();
        let mut tokens = UsedTokens::new();
        let mut events = Vec::new();
        for chunk in chunks {
            for &byte in chunk.as_bytes() {
                let event = scanner.feed(byte, &mut tokens);
                if event != ScanEvent::None {
                    events.push(event);
                }
            }
        }
        (tokens, events)
    }

    #[test]
    fn test_harvest_tag_class_id_and_attributes() {
        let (tokens, _) = scan(&[r#"<DIV class="a  b" id=main data-x='1'>text</DIV>"#]);
        for key in ["div", ".a", ".b", "#main", "[class]", "[id]", "[data-x]"] {
            assert!(tokens.contains(key), "missing {key}");
        }
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_attribute_split_across_chunks() {
        let (tokens, _) = scan(&["<sp", "an cla", "ss=\"fir", "st sec", "ond\" i", "d='x", "y'>"]);
        for key in ["span", ".first", ".second", "#xy"] {
            assert!(tokens.contains(key), "missing {key}");
        }
    }

    #[test]
    fn test_unquoted_and_valueless_attributes() {
        let (tokens, _) = scan(&["<input disabled class=big type=text>"]);
        assert!(tokens.contains("[disabled]"));
        assert!(tokens.contains(".big"));
        assert!(tokens.contains("[type]"));
    }

    #[test]
    fn test_end_tags_and_text_harvest_nothing() {
        let (tokens, _) = scan(&["</div class=\"nope\"> a < b and class=\"x\""]);
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let (tokens, _) = scan(&["<!DOCTYPE html><!-- <div class=\"ghost\"> --><p class=real>"]);
        assert!(!tokens.contains(".ghost"));
        assert!(tokens.contains(".real"));
        assert!(!tokens.contains("doctype"));
    }

    #[test]
    fn test_abrupt_empty_comments_end_at_gt() {
        let (tokens, _) = scan(&["<!--><p class=after>"]);
        assert!(tokens.contains(".after"));

        let (tokens, _) = scan(&["<!--", "-", "><i class=after>"]);
        assert!(tokens.contains(".after"));

        let (tokens, events) = scan(&["<!----><style>"]);
        assert_eq!(events, vec![ScanEvent::StyleOpened]);
        assert!(tokens.contains("style"));

        let (tokens, _) = scan(&["<!---<b class=ghost>--><p class=real>"]);
        assert!(!tokens.contains(".ghost"));
        assert!(tokens.contains(".real"));
    }

    #[test]
    fn test_script_contents_skipped() {
        let (tokens, events) = scan(&[
            "<script>document.write('<style><b class=\"fake\">')</script><i class=ok>",
        ]);
        assert!(events.is_empty());
        assert!(!tokens.contains(".fake"));
        assert!(tokens.contains(".ok"));
    }

    #[test]
    fn test_style_open_event() {
        let (_, events) = scan(&["<style>", "<STYLE nonce=\"n\">", "<styles>"]);
        assert_eq!(events, vec![ScanEvent::StyleOpened, ScanEvent::StyleOpened]);
    }

    #[test]
    fn test_boundary_matcher() {
        let mut matcher = BoundaryMatcher::new(b"style");
        let steps: Vec<Step> = b"</STYLE>".iter().map(|&b| matcher.feed(b)).collect();
        assert_eq!(steps.last(), Some(&Step::Found(Boundary::Close)));

        let mut matcher = BoundaryMatcher::new(b"style");
        let steps: Vec<Step> = b"<style ".iter().map(|&b| matcher.feed(b)).collect();
        assert_eq!(steps.last(), Some(&Step::Found(Boundary::Open)));

        let mut matcher = BoundaryMatcher::new(b"style");
        let steps: Vec<Step> = b"<styles".iter().map(|&b| matcher.feed(b)).collect();
        assert_eq!(steps.last(), Some(&Step::Mismatch));
        assert!(matcher.is_idle());
    }

    #[test]
    fn test_boundary_restarts_on_lt() {
        let mut matcher = BoundaryMatcher::new(b"style");
        assert_eq!(matcher.feed(b'<'), Step::Pending);
        assert_eq!(matcher.feed(b'<'), Step::Mismatch);
        let steps: Vec<Step> = b"/style>".iter().map(|&b| matcher.feed(b)).collect();
        assert_eq!(steps.last(), Some(&Step::Found(Boundary::Close)));
    }
}
