//! Style Lookup
//!
//! Read-only union of per-file ASTs, indexed by selector key. Built once
//! and shared by every stream; a rebuild produces a new lookup.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, BodyId, StyleBody, StyleSelector};
use crate::parser::CssParser;
use crate::tokens::UsedTokens;
use crate::CssError;

/// A declaration body of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyRef {
    pub file: u32,
    pub body: BodyId,
}

/// A selector of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SelectorRef {
    file: u32,
    index: u32,
}

/// One parsed source file
#[derive(Debug, Clone)]
pub struct StyleFile {
    pub name: String,
    pub ast: Ast,
}

/// Lookup construction options
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Log and skip files that fail to parse instead of failing the build
    pub skip_invalid: bool,
    /// Run the strict validation pass before building each AST
    pub skip_validation: bool,
}

/// Aggregated, queryable styles of a project
#[derive(Debug, Clone, Default)]
pub struct StyleLookup {
    files: Vec<StyleFile>,
    /// Selector key -> selectors carrying it
    index: HashMap<String, Vec<SelectorRef>>,
    /// Selectors without any matchable piece
    unkeyed: Vec<SelectorRef>,
}

impl StyleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(file name, css text)` pairs; file index is the position
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self, CssError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        Self::from_sources_with(sources, &LookupOptions::default())
    }

    pub fn from_sources_with<I, N, S>(sources: I, options: &LookupOptions) -> Result<Self, CssError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let parser = if options.skip_validation {
            CssParser::new().without_validation()
        } else {
            CssParser::new()
        };

        let mut files = Vec::new();
        for (position, (name, css)) in sources.into_iter().enumerate() {
            let name = name.into();
            let file = u32::try_from(position).map_err(|_| CssError::TooManyFiles)?;
            let ast = match parser.parse_file(css.as_ref(), file, &name) {
                Ok(ast) => ast,
                Err(e) if options.skip_invalid => {
                    tracing::warn!("Skipping {}: {}", name, e);
                    Ast::default()
                }
                Err(e) => return Err(e),
            };
            files.push(StyleFile { name, ast });
        }

        Ok(Self::from_files(files))
    }

    /// Index already parsed files; file indices must match positions
    pub fn from_files(files: Vec<StyleFile>) -> Self {
        let mut index: HashMap<String, Vec<SelectorRef>> = HashMap::new();
        let mut unkeyed = Vec::new();

        for (file, style_file) in files.iter().enumerate() {
            for (position, selector) in style_file.ast.selectors.iter().enumerate() {
                if selector.is_global {
                    continue;
                }
                let reference = SelectorRef {
                    file: file as u32,
                    index: position as u32,
                };
                let mut keyed = false;
                for key in selector.pieces.iter().filter_map(|piece| piece.key()) {
                    index.entry(key).or_default().push(reference);
                    keyed = true;
                }
                if !keyed {
                    unkeyed.push(reference);
                }
            }
        }

        tracing::debug!(
            "Style lookup ready: {} files, {} keys, {} unkeyed selectors",
            files.len(),
            index.len(),
            unkeyed.len()
        );

        Self { files, index, unkeyed }
    }

    pub fn files(&self) -> &[StyleFile] {
        &self.files
    }

    pub fn file(&self, file: u32) -> Option<&StyleFile> {
        self.files.get(file as usize)
    }

    pub fn body(&self, reference: BodyRef) -> Option<&StyleBody> {
        self.file(reference.file)?.ast.body(reference.body)
    }

    /// Total selector count across files
    pub fn selector_count(&self) -> usize {
        self.files.iter().map(|file| file.ast.selectors.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|file| file.ast.is_empty())
    }

    /// Bodies whose selector pieces contain `token` (`div`, `.class`,
    /// `#id`, `[attr]`). Combinator postfixes are never consulted.
    pub fn query(&self, token: &str) -> Vec<BodyRef> {
        let refs = self.index.get(token).map(Vec::as_slice).unwrap_or_default();
        self.bodies_of(refs.iter())
    }

    /// Bodies of every selector that may apply given `tokens`: any piece
    /// seen, or no matchable piece at all
    pub fn query_tokens(&self, tokens: &UsedTokens) -> Vec<BodyRef> {
        let keyed = tokens
            .iter()
            .filter_map(|key| self.index.get(key))
            .flatten();
        self.bodies_of(keyed.chain(self.unkeyed.iter()))
    }

    /// `serialize(query_tokens(tokens))`
    pub fn critical_css(&self, tokens: &UsedTokens) -> String {
        self.serialize(&self.query_tokens(tokens))
    }

    /// Render the selected bodies plus every global entity as CSS
    pub fn serialize(&self, bodies: &[BodyRef]) -> String {
        self.serialize_with(bodies, true)
    }

    /// Render the selected bodies, optionally with the global entities.
    ///
    /// Output follows file order, then document order. Each body is written
    /// once with all the selectors sharing it and re-wrapped in its
    /// enclosing conditions.
    pub fn serialize_with(&self, bodies: &[BodyRef], globals: bool) -> String {
        let selected: HashSet<BodyRef> = bodies.iter().copied().collect();
        let mut out = String::new();

        for (file, style_file) in self.files.iter().enumerate() {
            let selectors = &style_file.ast.selectors;
            let mut emitted: HashSet<BodyId> = HashSet::new();
            let mut i = 0usize;

            while i < selectors.len() {
                let first = &selectors[i];
                let mut j = i + 1;
                while j < selectors.len()
                    && selectors[j].declaration == first.declaration
                    && selectors[j].is_global == first.is_global
                {
                    j += 1;
                }
                let run = &selectors[i..j];
                i = j;

                let reference = BodyRef {
                    file: file as u32,
                    body: first.declaration,
                };
                let wanted = if first.is_global {
                    globals
                } else {
                    selected.contains(&reference)
                };
                if !wanted || !emitted.insert(first.declaration) {
                    continue;
                }
                if let Some(body) = style_file.ast.body(first.declaration) {
                    write_entry(&mut out, run, body);
                }
            }
        }

        out
    }

    fn bodies_of<'a>(&self, refs: impl Iterator<Item = &'a SelectorRef>) -> Vec<BodyRef> {
        let mut bodies: Vec<BodyRef> = refs
            .filter_map(|reference| {
                let selector = self
                    .file(reference.file)?
                    .ast
                    .selectors
                    .get(reference.index as usize)?;
                Some(BodyRef {
                    file: reference.file,
                    body: selector.declaration,
                })
            })
            .collect();
        bodies.sort_unstable();
        bodies.dedup();
        bodies
    }
}

/// Write one body with the selectors in front of it
fn write_entry(out: &mut String, run: &[StyleSelector], body: &StyleBody) {
    let head = &run[0];

    for condition in &head.media {
        out.push_str(&condition.to_string());
        out.push_str(" { ");
    }

    if head.is_global {
        out.push_str(&head.selector);
        match &body.block {
            Some(block) => {
                out.push_str(" { ");
                out.push_str(block);
                out.push_str(" }");
            }
            None => out.push(';'),
        }
    } else {
        for (n, selector) in run.iter().enumerate() {
            if n > 0 {
                out.push_str(", ");
            }
            out.push_str(&selector.selector);
        }
        out.push_str(" {");
        for rule in &body.rules {
            out.push(' ');
            out.push_str(&rule.property);
            out.push_str(": ");
            out.push_str(&rule.value);
            out.push(';');
        }
        out.push_str(" }");
    }

    for _ in &head.media {
        out.push_str(" }");
    }
    out.push('\n');
}
