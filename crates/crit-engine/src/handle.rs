//! Shared Lookup Handle
//!
//! Streams take a snapshot of the current lookup when they start; a
//! rebuild swaps in a new lookup without touching in-flight responses.

use std::sync::{Arc, RwLock};

use crit_css::StyleLookup;

/// Cheaply cloneable, swappable reference to the active lookup
#[derive(Debug, Clone, Default)]
pub struct LookupHandle {
    inner: Arc<RwLock<Arc<StyleLookup>>>,
}

impl LookupHandle {
    pub fn new(lookup: StyleLookup) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(lookup))),
        }
    }

    /// Snapshot of the active lookup
    pub fn current(&self) -> Arc<StyleLookup> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Install a rebuilt lookup, returning the previous one
    pub fn replace(&self, lookup: StyleLookup) -> Arc<StyleLookup> {
        let next = Arc::new(lookup);
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crit_css::UsedTokens;

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = LookupHandle::new(StyleLookup::from_sources([("a.css", ".a { color: red }")]).unwrap());
        let snapshot = handle.current();
        let previous = handle.replace(StyleLookup::from_sources([("a.css", ".a { color: blue }")]).unwrap());

        let tokens = UsedTokens::from_keys([".a"]);
        assert_eq!(snapshot.critical_css(&tokens), ".a { color: red; }\n");
        assert_eq!(previous.critical_css(&tokens), ".a { color: red; }\n");
        assert_eq!(handle.current().critical_css(&tokens), ".a { color: blue; }\n");
    }

    #[test]
    fn test_clones_share_state() {
        let handle = LookupHandle::default();
        let other = handle.clone();
        other.replace(StyleLookup::from_sources([("a.css", ".a { color: red }")]).unwrap());
        assert_eq!(handle.current().selector_count(), 1);
    }
}
