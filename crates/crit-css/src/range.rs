//! Source Ranges
//!
//! Code locations and spans. Declaration bodies are identified by the span
//! they cover, not by their text.

use std::cmp::Ordering;

/// A position inside one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeLocation {
    /// Index of the file inside the lookup
    pub file: u32,
    /// Line (1-based)
    pub line: u32,
    /// Column (1-based)
    pub column: u32,
}

impl CodeLocation {
    pub const fn new(file: u32, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Lexicographic `(line, column)` ordering within a file
    pub fn cmp_position(&self, other: &Self) -> Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// A span of source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub file: u32,
    pub start: CodeLocation,
    pub end: CodeLocation,
}

impl Range {
    /// Span between two locations of the same file
    pub const fn between(start: CodeLocation, end: CodeLocation) -> Self {
        Self { file: start.file, start, end }
    }

    /// Seed for a leftward-growing fold: every real range starts before it
    pub const fn unbounded_start(file: u32) -> Self {
        create_range(file, u32::MAX, u32::MAX)
    }

    /// Seed for a rightward-growing fold: every real range ends after it
    pub const fn unbounded_end(file: u32) -> Self {
        create_range(file, 0, 0)
    }

    /// `start <= end`
    pub fn is_ordered(&self) -> bool {
        self.start.cmp_position(&self.end) != Ordering::Greater
    }
}

/// Zero-width range at `(file, line, column)`
pub const fn create_range(file: u32, line: u32, column: u32) -> Range {
    let at = CodeLocation::new(file, line, column);
    Range { file, start: at, end: at }
}

/// The range whose start comes first
pub fn local_range_min(a: Range, b: Range) -> Range {
    match b.start.cmp_position(&a.start) {
        Ordering::Less => b,
        _ => a,
    }
}

/// The range whose end comes last
pub fn local_range_max(a: Range, b: Range) -> Range {
    match b.end.cmp_position(&a.end) {
        Ordering::Greater => b,
        _ => a,
    }
}

/// Both ends coincide exactly, file included
pub fn ranges_interval_equal(a: &Range, b: &Range) -> bool {
    a.file == b.file && a.start == b.start && a.end == b.end
}
