//! CSS Parser
//!
//! Compiles CSS text into an [`Ast`]. lightningcss validates the document,
//! cssparser walks it with source locations into an immutable snapshot, and
//! [`AstBuilder`] flattens the snapshot into selectors and bodies.

use std::collections::{BTreeMap, HashMap};

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, SourceLocation, StyleSheetParser, Token,
};

use crate::ast::{Ast, BodyId, Condition, Declaration, StyleBody, StyleSelector};
use crate::range::{local_range_max, local_range_min, ranges_interval_equal, CodeLocation, Range};
use crate::selector::{split_selector_list, tokenize};
use crate::CssError;

/// CSS Parser
#[derive(Debug, Clone)]
pub struct CssParser {
    validate: bool,
}

impl CssParser {
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Skip the strict lightningcss pass; invalid rules are then dropped
    /// silently instead of failing the document
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Parse a standalone document as file 0
    pub fn parse(&self, css: &str) -> Result<Ast, CssError> {
        self.parse_file(css, 0, "<inline>")
    }

    /// Parse the document with index `file` of a lookup
    pub fn parse_file(&self, css: &str, file: u32, name: &str) -> Result<Ast, CssError> {
        tracing::debug!("Parsing CSS file {} ({})", file, name);

        if self.validate {
            validate(css, name)?;
        }

        let nodes = snapshot(css);
        let ast = AstBuilder::new(file).build(&nodes);

        tracing::debug!(
            "Built AST for {}: {} selectors, {} bodies",
            name,
            ast.selectors.len(),
            ast.bodies.len()
        );
        Ok(ast)
    }
}

impl Default for CssParser {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(css: &str, name: &str) -> Result<(), CssError> {
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};

    let options = ParserOptions {
        filename: name.to_string(),
        ..ParserOptions::default()
    };

    StyleSheet::parse(css, options).map(|_| ()).map_err(|e| {
        let (line, column) = e
            .loc
            .as_ref()
            .map(|loc| (loc.line + 1, loc.column))
            .unwrap_or((0, 0));
        CssError::ParseError {
            file: name.to_string(),
            line,
            column,
            message: e.kind.to_string(),
        }
    })
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable parse tree handed to the builder
#[derive(Debug, Clone)]
pub(crate) enum ParsedNode {
    Rule(ParsedRule),
    AtRule(ParsedAtRule),
    Declaration(ParsedDeclaration),
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedRule {
    pub selector: String,
    pub declarations: Vec<ParsedDeclaration>,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedAtRule {
    pub name: String,
    pub params: String,
    pub children: Vec<ParsedNode>,
    /// Verbatim block contents, `None` for statement at-rules
    pub block: Option<String>,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedDeclaration {
    pub property: String,
    pub value: String,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

pub(crate) fn snapshot(css: &str) -> Vec<ParsedNode> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut nodes = NodeParser { nested_rules: true };
    let mut result = Vec::new();

    for item in StyleSheetParser::new(&mut parser, &mut nodes) {
        match item {
            Ok(node) => result.push(node),
            Err((_, slice)) => tracing::trace!("Skipping unparseable CSS: {}", slice),
        }
    }
    result
}

/// Consume everything left in a delimited parser, returning its source text
fn consume_rest<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next_including_whitespace_and_comments().is_ok() {}
    input.slice_from(start)
}

fn parse_block_items(input: &mut Parser<'_, '_>, nested_rules: bool) -> Vec<ParsedNode> {
    let mut items = NodeParser { nested_rules };
    let mut result = Vec::new();
    for item in RuleBodyParser::new(input, &mut items) {
        match item {
            Ok(node) => result.push(node),
            Err((_, slice)) => tracing::trace!("Skipping unparseable block item: {}", slice),
        }
    }
    result
}

struct NodeParser {
    /// Block may hold nested rules (at-rule blocks), not only declarations
    nested_rules: bool,
}

impl<'i> QualifiedRuleParser<'i> for NodeParser {
    type Prelude = String;
    type QualifiedRule = ParsedNode;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(consume_rest(input).trim().to_string())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let declarations = parse_block_items(input, false)
            .into_iter()
            .filter_map(|node| match node {
                ParsedNode::Declaration(declaration) => Some(declaration),
                _ => None,
            })
            .collect();

        Ok(ParsedNode::Rule(ParsedRule {
            selector: prelude,
            declarations,
            start: start.source_location(),
            end: input.current_source_location(),
        }))
    }
}

impl<'i> AtRuleParser<'i> for NodeParser {
    type Prelude = (String, String);
    type AtRule = ParsedNode;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok((name.to_string(), consume_rest(input).trim().to_string()))
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        let (name, params) = prelude;
        Ok(ParsedNode::AtRule(ParsedAtRule {
            name,
            params,
            children: Vec::new(),
            block: None,
            start: start.source_location(),
            end: start.source_location(),
        }))
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        let (name, params) = prelude;
        let block_start = input.position();
        let children = parse_block_items(input, true);
        let block = input.slice_from(block_start).trim().to_string();

        Ok(ParsedNode::AtRule(ParsedAtRule {
            name,
            params,
            children,
            block: Some(block),
            start: start.source_location(),
            end: input.current_source_location(),
        }))
    }
}

impl<'i> DeclarationParser<'i> for NodeParser {
    type Declaration = ParsedNode;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let value_start = input.position();
        loop {
            let nested_block = match input.next_including_whitespace_and_comments() {
                Ok(token) => matches!(token, Token::CurlyBracketBlock),
                Err(_) => break,
            };
            // `a:hover { ... }` inside a group block is a rule, not a declaration
            if nested_block && self.nested_rules {
                return Err(input.new_custom_error(()));
            }
        }
        let value = input.slice_from(value_start).trim().to_string();

        Ok(ParsedNode::Declaration(ParsedDeclaration {
            property: name.to_string(),
            value,
            start: declaration_start.source_location(),
            end: input.current_source_location(),
        }))
    }
}

impl<'i> RuleBodyItemParser<'i, ParsedNode, ()> for NodeParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        self.nested_rules
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Block at-rules whose nested rules are indexed on their own and re-wrapped
/// on output. `@layer a, b;` has no block and stays a global statement.
fn is_conditional_group(at_rule: &ParsedAtRule) -> bool {
    const GROUPS: [&str; 7] = [
        "media",
        "supports",
        "layer",
        "container",
        "scope",
        "starting-style",
        "document",
    ];
    let name = at_rule.name.strip_prefix("-moz-").unwrap_or(at_rule.name.as_str());
    at_rule.block.is_some() && GROUPS.iter().any(|group| name.eq_ignore_ascii_case(group))
}

/// Flattens a snapshot into an [`Ast`]. Owns the body id counter, so
/// builders for different documents never share state.
pub(crate) struct AstBuilder {
    file: u32,
    next_id: u32,
    by_span: HashMap<Range, BodyId>,
    bodies: BTreeMap<BodyId, StyleBody>,
    selectors: Vec<StyleSelector>,
}

impl AstBuilder {
    pub fn new(file: u32) -> Self {
        Self {
            file,
            next_id: 1, // 0 reserved for NONE
            by_span: HashMap::new(),
            bodies: BTreeMap::new(),
            selectors: Vec::new(),
        }
    }

    pub(crate) fn build(mut self, nodes: &[ParsedNode]) -> Ast {
        // explicit ancestor chain: each pending node carries its condition stack
        let mut pending: Vec<(&ParsedNode, Vec<Condition>)> =
            nodes.iter().rev().map(|node| (node, Vec::new())).collect();

        while let Some((node, media)) = pending.pop() {
            match node {
                ParsedNode::Rule(rule) => self.add_rule(rule, &media),
                ParsedNode::AtRule(at_rule) if is_conditional_group(at_rule) => {
                    let mut inner = media;
                    inner.push(Condition::new(at_rule.name.as_str(), at_rule.params.as_str()));
                    pending.extend(at_rule.children.iter().rev().map(|child| (child, inner.clone())));
                }
                ParsedNode::AtRule(at_rule) => self.add_global(at_rule, &media),
                ParsedNode::Declaration(declaration) => {
                    tracing::trace!("Ignoring stray declaration {}", declaration.property);
                }
            }
        }

        Ast {
            selectors: self.selectors,
            bodies: self.bodies,
        }
    }

    fn add_rule(&mut self, rule: &ParsedRule, media: &[Condition]) {
        for branch in split_selector_list(&rule.selector) {
            let body = self.fold_body(rule.declarations.iter(), rule.start, rule.end, None);
            let declaration = self.assign_body(body);
            let tokens = tokenize(branch);

            self.selectors.push(StyleSelector {
                selector: branch.to_string(),
                pieces: tokens.pieces,
                postfix: tokens.postfix,
                media: media.to_vec(),
                is_global: false,
                declaration,
            });
        }
    }

    fn add_global(&mut self, at_rule: &ParsedAtRule, media: &[Condition]) {
        let mut declarations = Vec::new();
        let mut pending: Vec<&ParsedNode> = at_rule.children.iter().rev().collect();
        while let Some(node) = pending.pop() {
            match node {
                ParsedNode::Declaration(declaration) => declarations.push(declaration),
                ParsedNode::Rule(rule) => declarations.extend(rule.declarations.iter()),
                ParsedNode::AtRule(nested) => pending.extend(nested.children.iter().rev()),
            }
        }

        let body = self.fold_body(
            declarations.into_iter(),
            at_rule.start,
            at_rule.end,
            at_rule.block.clone(),
        );
        let declaration = self.assign_body(body);

        self.selectors.push(StyleSelector {
            selector: format!("@{} {}", at_rule.name, at_rule.params).trim_end().to_string(),
            pieces: Vec::new(),
            postfix: String::new(),
            media: media.to_vec(),
            is_global: true,
            declaration,
        });
    }

    /// Fold declarations into a body; an empty block is anchored on its own
    /// span so distinct empty rules never collapse into one body
    fn fold_body<'a>(
        &self,
        declarations: impl Iterator<Item = &'a ParsedDeclaration>,
        anchor_start: SourceLocation,
        anchor_end: SourceLocation,
        block: Option<String>,
    ) -> StyleBody {
        let mut start = Range::unbounded_start(self.file);
        let mut end = Range::unbounded_end(self.file);
        let mut rules = Vec::new();

        for declaration in declarations {
            let span = Range::between(
                self.location(declaration.start),
                self.location(declaration.end),
            );
            start = local_range_min(start, span);
            end = local_range_max(end, span);
            rules.push(Declaration {
                property: declaration.property.clone(),
                value: declaration.value.clone(),
            });
        }

        if rules.is_empty() {
            let anchor = Range::between(self.location(anchor_start), self.location(anchor_end));
            start = anchor;
            end = anchor;
        }

        StyleBody {
            id: BodyId::NONE,
            rules,
            start,
            end,
            block,
        }
    }

    /// Reuse the id of an interval-equal body, or register a new one
    fn assign_body(&mut self, mut body: StyleBody) -> BodyId {
        let span = body.span();
        if let Some(&id) = self.by_span.get(&span) {
            debug_assert!(self
                .bodies
                .get(&id)
                .is_some_and(|known| ranges_interval_equal(&known.span(), &span)));
            return id;
        }

        let id = BodyId(self.next_id);
        self.next_id += 1;
        body.id = id;
        self.by_span.insert(span, id);
        self.bodies.insert(id, body);
        id
    }

    /// cssparser lines are 0-based, columns 1-based
    fn location(&self, location: SourceLocation) -> CodeLocation {
        CodeLocation::new(self.file, location.line + 1, location.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(css: &str) -> Ast {
        CssParser::new().parse(css).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let ast = parse(".foo { display: block; }\n#bar { color: red; }");
        assert_eq!(ast.selectors.len(), 2);
        assert_eq!(ast.bodies.len(), 2);
        assert_eq!(ast.selectors[0].selector, ".foo");
        assert_eq!(ast.selectors[1].selector, "#bar");
    }

    #[test]
    fn test_comma_branches_share_one_body() {
        let ast = parse(".a, .b, .input { color: rightColor }");
        assert_eq!(ast.selectors.len(), 3);
        assert_eq!(ast.bodies.len(), 1);
        let id = ast.selectors[0].declaration;
        assert!(ast.selectors.iter().all(|selector| selector.declaration == id));
        assert_eq!(ast.selectors_for(id).count(), 3);
    }

    #[test]
    fn test_body_ids_start_at_one_per_document() {
        let first = parse(".a { color: red }");
        let second = parse(".b { color: blue }");
        assert_eq!(first.selectors[0].declaration, BodyId(1));
        assert_eq!(second.selectors[0].declaration, BodyId(1));
    }

    #[test]
    fn test_declarations_kept_in_order_and_verbatim() {
        let ast = parse(".a { color: RED; margin: 0 auto !important; background: url( x.png ) }");
        let body = ast.body(ast.selectors[0].declaration).unwrap();
        let rules: Vec<(&str, &str)> = body
            .rules
            .iter()
            .map(|rule| (rule.property.as_str(), rule.value.as_str()))
            .collect();
        assert_eq!(
            rules,
            vec![
                ("color", "RED"),
                ("margin", "0 auto !important"),
                ("background", "url( x.png )"),
            ]
        );
    }

    #[test]
    fn test_body_span_covers_declarations() {
        let css = ".a {\n  color: red;\n  padding: 1px 2px;\n}";
        let ast = parse(css);
        let body = ast.body(ast.selectors[0].declaration).unwrap();
        assert_eq!(body.start.start.line, 2);
        assert_eq!(body.start.start.column, 3);
        assert_eq!(body.end.end.line, 3);
        assert!(body.span().is_ordered());
    }

    #[test]
    fn test_media_context_outermost_first() {
        let css = "@media screen { @media (min-width: 10px) { .a { color: red } } }";
        let ast = parse(css);
        assert_eq!(ast.selectors.len(), 1);
        assert_eq!(
            ast.selectors[0].media,
            vec![Condition::media("screen"), Condition::media("(min-width: 10px)")]
        );
        assert!(!ast.selectors[0].is_global);
    }

    #[test]
    fn test_pseudo_rules_inside_media() {
        let ast = parse("@media print { a:hover { color: red } div { margin: 0 } }");
        let names: Vec<&str> = ast.selectors.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(names, vec!["a:hover", "div"]);
        assert_eq!(ast.selectors[0].postfix, ":hover");
    }

    #[test]
    fn test_global_at_rules() {
        let css = r#"
            @font-face { font-family: "Inter"; src: url(inter.woff2); }
            @keyframes spin { from { transform: rotate(0) } to { transform: rotate(360deg) } }
            .a { animation: spin 1s; }
        "#;
        let ast = parse(css);
        let globals: Vec<&StyleSelector> = ast.globals().collect();
        assert_eq!(globals.len(), 2);
        assert_eq!(globals[0].selector, "@font-face");
        assert_eq!(globals[1].selector, "@keyframes spin");

        let keyframes = ast.body(globals[1].declaration).unwrap();
        assert_eq!(keyframes.rules.len(), 2);
        assert!(keyframes.block.as_deref().unwrap().starts_with("from"));

        // keyframe steps are part of the global entity
        assert_eq!(ast.selectors.iter().filter(|s| !s.is_global).count(), 1);
    }

    #[test]
    fn test_global_inside_media_keeps_media() {
        let ast = CssParser::new()
            .without_validation()
            .parse("@media print { @page { margin: 0 } }")
            .unwrap();
        assert_eq!(ast.selectors.len(), 1);
        assert!(ast.selectors[0].is_global);
        assert_eq!(ast.selectors[0].media, vec![Condition::media("print")]);
    }

    #[test]
    fn test_group_rules_are_conditions_not_globals() {
        let css = r#"
            @supports (display: grid) { .a { color: red } .b { color: blue } }
            @layer base { @container card (min-width: 400px) { .c { margin: 0 } } }
        "#;
        let ast = parse(css);
        assert_eq!(ast.globals().count(), 0);

        let names: Vec<&str> = ast.selectors.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(names, vec![".a", ".b", ".c"]);
        assert_eq!(ast.selectors[0].media, vec![Condition::new("supports", "(display: grid)")]);
        assert_eq!(
            ast.selectors[2].media,
            vec![
                Condition::new("layer", "base"),
                Condition::new("container", "card (min-width: 400px)"),
            ]
        );
    }

    #[test]
    fn test_layer_statement_stays_global() {
        let ast = parse("@layer reset, base;\n@layer { .a { color: red } }");
        let globals: Vec<&StyleSelector> = ast.globals().collect();
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0].selector, "@layer reset, base");

        let anonymous = &ast.selectors[1];
        assert_eq!(anonymous.selector, ".a");
        assert_eq!(anonymous.media, vec![Condition::new("layer", "")]);
    }

    #[test]
    fn test_empty_rules_are_not_merged() {
        let ast = parse(".a {}\n.b {}");
        assert_eq!(ast.bodies.len(), 2);
        assert_ne!(ast.selectors[0].declaration, ast.selectors[1].declaration);
    }

    #[test]
    fn test_invalid_css_is_rejected() {
        let result = CssParser::new().parse(".a { color: red; } }}} @media {");
        assert!(matches!(result, Err(CssError::ParseError { .. })));
    }
}
