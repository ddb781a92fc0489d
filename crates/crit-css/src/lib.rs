//! crit CSS compiler
//!
//! Compiles CSS sources into an addressable model of selectors and
//! deduplicated declaration bodies, and aggregates them into a read-only
//! lookup that answers "which CSS is critical for these tokens".

pub mod ast;
pub mod lookup;
mod parser;
pub mod range;
pub mod selector;
pub mod tokens;

pub use ast::{Ast, BodyId, Condition, Declaration, StyleBody, StyleSelector};
pub use lookup::{BodyRef, LookupOptions, StyleFile, StyleLookup};
pub use parser::CssParser;
pub use range::{
    create_range, local_range_max, local_range_min, ranges_interval_equal, CodeLocation, Range,
};
pub use selector::{Piece, TokenizedSelector};
pub use tokens::UsedTokens;

/// Parse one CSS document as file `file`
pub fn build_ast(css: &str, file: u32) -> Result<Ast, CssError> {
    CssParser::new().parse_file(css, file, "<inline>")
}

/// Build a lookup from `(file name, css text)` pairs
pub fn parse_project_styles<I, N, S>(sources: I) -> Result<StyleLookup, CssError>
where
    I: IntoIterator<Item = (N, S)>,
    N: Into<String>,
    S: AsRef<str>,
{
    StyleLookup::from_sources(sources)
}

/// CSS error
#[derive(Debug, thiserror::Error)]
pub enum CssError {
    #[error("Parse error in {file} at line {line}, column {column}: {message}")]
    ParseError {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Too many style files for one lookup")]
    TooManyFiles,
}
