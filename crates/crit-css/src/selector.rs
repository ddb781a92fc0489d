//! Selector Tokenizer
//!
//! Splits a selector into the simple-selector pieces used for usage
//! matching and the combinator/pseudo postfix that is never matched.

/// One simple selector from the leading compound of a selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Piece {
    /// `*`
    Universal,
    /// Type selector (lower-cased tag name)
    Type(String),
    /// `.class`
    Class(String),
    /// `#id`
    Id(String),
    /// `[attr...]`, only the attribute name is kept
    Attribute(String),
}

impl Piece {
    /// Usage key: `div`, `.class`, `#id`, `[attr]`. `None` for `*`.
    pub fn key(&self) -> Option<String> {
        match self {
            Piece::Universal => None,
            Piece::Type(name) => Some(name.clone()),
            Piece::Class(name) => Some(class_key(name)),
            Piece::Id(name) => Some(id_key(name)),
            Piece::Attribute(name) => Some(attribute_key(name)),
        }
    }
}

pub fn class_key(name: &str) -> String {
    format!(".{}", name)
}

pub fn id_key(name: &str) -> String {
    format!("#{}", name)
}

pub fn attribute_key(name: &str) -> String {
    format!("[{}]", name.to_ascii_lowercase())
}

/// Tokenized form of one selector branch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenizedSelector {
    pub pieces: Vec<Piece>,
    pub postfix: String,
}

/// Tokenize a trimmed selector branch
pub fn tokenize(selector: &str) -> TokenizedSelector {
    let split = break_index(selector);
    TokenizedSelector {
        pieces: map_pieces(&selector[..split]),
        postfix: selector[split..].trim().to_string(),
    }
}

/// Byte offset of the first combinator or pseudo boundary.
///
/// The first occurrence of each of whitespace, `>`, `~`, `+` and `:` is
/// found; occurrences at offset 0 are discarded and the smallest remaining
/// offset wins. With nothing left the whole selector is the compound.
/// Escaped characters and characters inside `[...]` or `(...)` never break.
pub fn break_index(selector: &str) -> usize {
    let mut first = [None::<usize>; 5];
    let mut depth = 0usize;
    let mut quote = None::<u8>;
    let mut escape = Escape::None;

    for (index, byte) in selector.bytes().enumerate() {
        match escape {
            Escape::Start if byte.is_ascii_hexdigit() => {
                escape = Escape::Hex(1);
                continue;
            }
            Escape::Start => {
                escape = Escape::None;
                continue;
            }
            Escape::Hex(count) if count < 6 && byte.is_ascii_hexdigit() => {
                escape = Escape::Hex(count + 1);
                continue;
            }
            Escape::Hex(_) => {
                escape = Escape::None;
                if byte.is_ascii_whitespace() {
                    continue;
                }
            }
            Escape::None => {}
        }
        if let Some(q) = quote {
            match byte {
                b'\\' => escape = Escape::Start,
                _ if byte == q => quote = None,
                _ => {}
            }
            continue;
        }
        let slot = match byte {
            b'\\' => {
                escape = Escape::Start;
                continue;
            }
            b'"' | b'\'' if depth > 0 => {
                quote = Some(byte);
                continue;
            }
            b'[' | b'(' => {
                depth += 1;
                continue;
            }
            b']' | b')' => {
                depth = depth.saturating_sub(1);
                continue;
            }
            _ if depth > 0 => continue,
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' => 0,
            b'>' => 1,
            b'~' => 2,
            b'+' => 3,
            b':' => 4,
            _ => continue,
        };
        if first[slot].is_none() {
            first[slot] = Some(index);
        }
    }

    first
        .iter()
        .flatten()
        .copied()
        .filter(|&index| index > 0)
        .min()
        .unwrap_or(selector.len())
}

#[derive(Clone, Copy)]
enum Escape {
    None,
    Start,
    Hex(u8),
}

/// Typed pieces of a compound selector fragment
pub fn map_pieces(fragment: &str) -> Vec<Piece> {
    let chars: Vec<char> = fragment.chars().collect();
    let mut pieces = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if !ident.is_empty() {
                    pieces.push(Piece::Class(ident));
                }
                i = next.max(i + 1);
            }
            '#' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if !ident.is_empty() {
                    pieces.push(Piece::Id(ident));
                }
                i = next.max(i + 1);
            }
            '[' => {
                let (name, next) = read_attribute(&chars, i + 1);
                if !name.is_empty() {
                    pieces.push(Piece::Attribute(name.to_ascii_lowercase()));
                }
                i = next;
            }
            '*' => {
                pieces.push(Piece::Universal);
                i += 1;
            }
            ':' => {
                // pseudo: skip name and arguments, nothing inside is matched
                i += 1;
                while i < chars.len() && chars[i] == ':' {
                    i += 1;
                }
                let (_, next) = read_ident(&chars, i);
                i = skip_arguments(&chars, next);
            }
            c if is_ident_start(c) => {
                let (ident, next) = read_ident(&chars, i);
                if !ident.is_empty() {
                    pieces.push(Piece::Type(ident.to_ascii_lowercase()));
                }
                i = next.max(i + 1);
            }
            _ => i += 1,
        }
    }

    pieces
}

/// Split a selector list on top-level commas, trimming every branch
pub fn split_selector_list(list: &str) -> Vec<&str> {
    let mut branches = Vec::new();
    let mut depth = 0usize;
    let mut quote = None::<u8>;
    let mut escaped = false;
    let mut start = 0usize;

    for (index, byte) in list.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, byte) {
            (_, b'\\') => escaped = true,
            (Some(q), _) if byte == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(byte),
            (None, b'[' | b'(') => depth += 1,
            (None, b']' | b')') => depth = depth.saturating_sub(1),
            (None, b',') if depth == 0 => {
                branches.push(list[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    branches.push(list[start..].trim());
    branches.retain(|branch| !branch.is_empty());
    branches
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Read an identifier starting at `i`, resolving escapes
fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let mut out = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            let (resolved, next) = read_escape(chars, i + 1);
            if let Some(resolved) = resolved {
                out.push(resolved);
            }
            i = next;
        } else if is_ident_char(c) {
            out.push(c);
            i += 1;
        } else {
            break;
        }
    }
    (out, i)
}

/// Escape body after a backslash: up to six hex digits plus one optional
/// whitespace, or any single character
fn read_escape(chars: &[char], mut i: usize) -> (Option<char>, usize) {
    let start = i;
    while i < chars.len() && i - start < 6 && chars[i].is_ascii_hexdigit() {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        if i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let resolved = u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return (Some(resolved), i);
    }
    match chars.get(i) {
        Some(&c) => (Some(c), i + 1),
        None => (None, i),
    }
}

/// Attribute name inside `[...]`; returns the offset after the closing `]`
fn read_attribute(chars: &[char], mut i: usize) -> (String, usize) {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let (name, mut i) = read_ident(chars, i);
    let mut quote = None;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ']' => break,
            None => {}
        }
    }
    (name, i)
}

fn skip_arguments(chars: &[char], mut i: usize) -> usize {
    if chars.get(i) != Some(&'(') {
        return i;
    }
    let mut depth = 0usize;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_compound_has_no_postfix() {
        let tokens = tokenize("div.card#main");
        assert_eq!(
            tokens.pieces,
            vec![
                Piece::Type("div".into()),
                Piece::Class("card".into()),
                Piece::Id("main".into()),
            ]
        );
        assert!(tokens.postfix.is_empty());
    }

    #[test]
    fn test_break_on_each_combinator() {
        assert_eq!(tokenize(".a .b").postfix, ".b");
        assert_eq!(tokenize(".a>.b").postfix, ">.b");
        assert_eq!(tokenize(".a ~ .b").postfix, "~ .b");
        assert_eq!(tokenize(".a+.b").postfix, "+.b");
        assert_eq!(tokenize(".a:hover").postfix, ":hover");
        assert_eq!(tokenize(".a:hover").pieces, vec![Piece::Class("a".into())]);
    }

    #[test]
    fn test_earliest_break_wins() {
        let tokens = tokenize(".nav>li .item:hover");
        assert_eq!(tokens.pieces, vec![Piece::Class("nav".into())]);
        assert_eq!(tokens.postfix, ">li .item:hover");
    }

    #[test]
    fn test_leading_combinator_is_not_a_break() {
        // a break at offset 0 is discarded rather than producing an empty compound
        assert_eq!(break_index(":root"), ":root".len());
        assert_eq!(break_index("::selection"), "::selection".len());
        assert!(tokenize(":root").pieces.is_empty());
        assert_eq!(break_index(">.a"), ">.a".len());
    }

    #[test]
    fn test_first_occurrence_per_character() {
        // the only ':' sits at 0 and is dropped; the space still counts
        let tokens = tokenize(":root .theme");
        assert_eq!(tokens.postfix, ".theme");
    }

    #[test]
    fn test_escaped_and_bracketed_characters_do_not_break() {
        let tokens = tokenize(r".md\:flex");
        assert_eq!(tokens.pieces, vec![Piece::Class("md:flex".into())]);
        assert!(tokens.postfix.is_empty());

        let tokens = tokenize(r#"a[title="x y"] span"#);
        assert_eq!(
            tokens.pieces,
            vec![Piece::Type("a".into()), Piece::Attribute("title".into())]
        );
        assert_eq!(tokens.postfix, "span");
    }

    #[test]
    fn test_hex_escape() {
        let tokens = tokenize(r".\31 0px");
        assert_eq!(tokens.pieces, vec![Piece::Class("10px".into())]);
    }

    #[test]
    fn test_type_names_are_lowercased() {
        assert_eq!(tokenize("DIV").pieces, vec![Piece::Type("div".into())]);
        assert_eq!(tokenize(".Upper").pieces, vec![Piece::Class("Upper".into())]);
    }

    #[test]
    fn test_keys() {
        assert_eq!(Piece::Type("div".into()).key().as_deref(), Some("div"));
        assert_eq!(Piece::Class("a".into()).key().as_deref(), Some(".a"));
        assert_eq!(Piece::Id("x".into()).key().as_deref(), Some("#x"));
        assert_eq!(Piece::Attribute("href".into()).key().as_deref(), Some("[href]"));
        assert_eq!(Piece::Universal.key(), None);
    }

    #[test]
    fn test_split_selector_list() {
        assert_eq!(split_selector_list(".a, .b,.input"), vec![".a", ".b", ".input"]);
        assert_eq!(
            split_selector_list(":is(.a, .b) p, [data-x=\"1,2\"]"),
            vec![":is(.a, .b) p", "[data-x=\"1,2\"]"]
        );
        assert_eq!(split_selector_list(".a,"), vec![".a"]);
    }
}
