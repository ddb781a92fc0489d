//! Used Tokens
//!
//! Grow-only set of selector keys observed in a rendered document.

use std::collections::HashSet;

use crate::selector::{attribute_key, class_key, id_key, Piece};

/// Keys seen so far (`div`, `.class`, `#id`, `[attr]`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedTokens {
    keys: HashSet<String>,
}

impl UsedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already formatted keys
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert_tag(&mut self, name: &str) -> bool {
        self.keys.insert(name.to_ascii_lowercase())
    }

    pub fn insert_class(&mut self, name: &str) -> bool {
        self.keys.insert(class_key(name))
    }

    pub fn insert_id(&mut self, name: &str) -> bool {
        self.keys.insert(id_key(name))
    }

    pub fn insert_attribute(&mut self, name: &str) -> bool {
        self.keys.insert(attribute_key(name))
    }

    /// Insert a formatted key
    pub fn insert_key(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Whether a selector with these pieces may apply.
    ///
    /// Any matching piece is enough; a compound without matchable pieces
    /// (`*`, `:root`) always applies.
    pub fn matches(&self, pieces: &[Piece]) -> bool {
        let mut keyed = false;
        for key in pieces.iter().filter_map(Piece::key) {
            if self.keys.contains(&key) {
                return true;
            }
            keyed = true;
        }
        !keyed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(String::as_str)
    }
}
