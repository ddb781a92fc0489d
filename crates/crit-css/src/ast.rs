//! Style AST
//!
//! Flat list of selectors plus deduplicated declaration bodies.

use std::collections::BTreeMap;
use std::fmt;

use crate::range::Range;
use crate::selector::Piece;

/// Identifier of a declaration body, unique within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BodyId(pub u32);

impl BodyId {
    /// Not yet assigned
    pub const NONE: Self = BodyId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// `property: value` pair, value kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// A declaration block shared by every selector written in front of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBody {
    pub id: BodyId,
    /// Declarations in document order
    pub rules: Vec<Declaration>,
    /// Folded range with the smallest start
    pub start: Range,
    /// Folded range with the largest end
    pub end: Range,
    /// Verbatim block contents of a global at-rule, `None` for statements
    /// and plain rules
    pub block: Option<String>,
}

impl StyleBody {
    /// Tightest span covering every folded declaration
    pub fn span(&self) -> Range {
        Range::between(self.start.start, self.end.end)
    }
}

/// Enclosing conditional group rule (`@media`, `@supports`, `@layer`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    /// At-rule name without the `@`
    pub name: String,
    /// Prelude text, empty for an anonymous `@layer`
    pub params: String,
}

impl Condition {
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
        }
    }

    pub fn media(params: impl Into<String>) -> Self {
        Self::new("media", params)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "@{}", self.name)
        } else {
            write!(f, "@{} {}", self.name, self.params)
        }
    }
}

/// One selector occurrence (one branch of a selector list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSelector {
    pub selector: String,
    pub pieces: Vec<Piece>,
    pub postfix: String,
    /// Enclosing conditions, outermost first
    pub media: Vec<Condition>,
    /// At-rule entity, always critical
    pub is_global: bool,
    pub declaration: BodyId,
}

/// Parsed form of one CSS document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    pub selectors: Vec<StyleSelector>,
    pub bodies: BTreeMap<BodyId, StyleBody>,
}

impl Ast {
    pub fn body(&self, id: BodyId) -> Option<&StyleBody> {
        self.bodies.get(&id)
    }

    /// Selectors referencing `id`, in document order
    pub fn selectors_for(&self, id: BodyId) -> impl Iterator<Item = &StyleSelector> + '_ {
        self.selectors.iter().filter(move |selector| selector.declaration == id)
    }

    pub fn globals(&self) -> impl Iterator<Item = &StyleSelector> + '_ {
        self.selectors.iter().filter(|selector| selector.is_global)
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
