//! Selector text compilation.
//!
//! Grammar, informally:
//!
//! ```text
//! selector    := path (('|' | ' or ') path)*
//! path        := segment? (('/' | '//') segment)*
//! segment     := node-test modifier? ('[' predicate ']')* ('[' position ']')?
//! node-test   := name | '*' | 'text()' | 'comment()' | 'cdata()'
//!              | 'doctype()' | 'xmldecl()' | 'procinstr()'
//! modifier    := '#' id | '.' class | '%' reference
//! predicate   := condition (('and' | 'or') condition)*, with parentheses
//! condition   := '@'? name (op value)? | '!' '@'? name
//! position    := n | '<' n | '>' n | 'even()' | 'odd()'
//! ```
//!
//! A path that does not start with `/` starts with an implicit `//`.

use crate::cache::ReferenceResolver;
use crate::error::{SelectorResult, SelectorSyntaxError, SyntaxErrorKind};
use crate::{
    AttributeCondition, AttributeOperator, CompileOptions, CompiledSelector, DepthMode,
    IndexCondition, NodeTest, PredicateTree, SelectorChain, SelectorItem,
};
use log::debug;
use std::sync::Arc;

type ParseResult<T> = Result<T, SyntaxErrorKind>;

/// Compile selector text without consulting any cache.
///
/// # Errors
/// Returns [`SelectorSyntaxError`] carrying `text` when the selector is malformed,
/// empty, mixes depth modes across a disjunction, or names an unresolvable reference.
pub fn compile_selector(
    text: &str,
    options: CompileOptions,
    resolver: Option<&dyn ReferenceResolver>,
) -> SelectorResult<CompiledSelector> {
    let parser = SelectorParser { options, resolver };
    let chain = parser
        .parse(text)
        .map_err(|kind| SelectorSyntaxError::new(text, kind))?;
    debug!(
        "Compiled selector {text:?} into {chain} ({} segments)",
        chain.segment_count()
    );
    Ok(CompiledSelector::new(text, options, chain))
}

/// A path segment modifier written after the node test.
enum Modifier<'src> {
    Id(&'src str),
    Class(&'src str),
    Reference(&'src str),
}

struct SelectorParser<'res> {
    options: CompileOptions,
    resolver: Option<&'res dyn ReferenceResolver>,
}

impl SelectorParser<'_> {
    fn parse(&self, text: &str) -> ParseResult<SelectorChain> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SyntaxErrorKind::Empty);
        }
        let mut alternatives = split_alternatives(trimmed)?.into_iter();
        let first = alternatives.next().ok_or(SyntaxErrorKind::Empty)?;
        let mut chain = SelectorChain::Path(self.parse_path(first)?);
        let leading = chain.leading_depth_mode();
        for alternative in alternatives {
            let path = SelectorChain::Path(self.parse_path(alternative)?);
            if path.leading_depth_mode() != leading {
                return Err(SyntaxErrorKind::DepthModeMismatch);
            }
            chain = SelectorChain::Or(Box::new(chain), Box::new(path));
        }
        Ok(chain)
    }

    fn parse_path(&self, text: &str) -> ParseResult<Vec<Arc<SelectorItem>>> {
        let segments = split_segments(text)?;
        let last = segments.len().saturating_sub(1);
        let mut items = Vec::with_capacity(segments.len());
        for (position, (slashes, body)) in segments.into_iter().enumerate() {
            let depth_mode = match slashes {
                0 | 2 => DepthMode::AnyDescendant,
                1 => DepthMode::ExactChild,
                run => return Err(SyntaxErrorKind::SeparatorRun(run)),
            };
            let item = self.parse_segment(depth_mode, body)?;
            if position != last && item.node_test().leaf_kind().is_some() {
                return Err(SyntaxErrorKind::LeafNotLast(body.trim().to_owned()));
            }
            items.push(Arc::new(item));
        }
        Ok(items)
    }

    fn parse_segment(&self, depth_mode: DepthMode, body: &str) -> ParseResult<SelectorItem> {
        let body = body.trim();
        let groups_start = body.find('[').unwrap_or(body.len());
        let groups = split_groups(body.get(groups_start..).unwrap_or_default())?;
        let (name, modifier) = split_modifier(body.get(..groups_start).unwrap_or_default())?;
        let mut node_test = self.parse_node_test(name.trim())?;

        if node_test.leaf_kind().is_some() {
            if modifier.is_some() || !groups.is_empty() {
                return Err(SyntaxErrorKind::PredicateOnLeaf(name.trim().to_owned()));
            }
            return Ok(SelectorItem::new(depth_mode, node_test, None, None, self.options));
        }

        let mut predicate = match modifier {
            Some(Modifier::Id(id)) => Some(equals_condition("id", id)),
            Some(Modifier::Class(class)) => Some(equals_condition("class", class)),
            Some(Modifier::Reference(_)) | None => None,
        };
        let mut index = None;
        for group in groups {
            if index.is_some() {
                return Err(SyntaxErrorKind::PositionNotLast);
            }
            if let Some(condition) = parse_index(group)? {
                index = Some(condition);
                continue;
            }
            let tree = PredicateParser::new(group, self.options).parse()?;
            predicate = PredicateTree::conjoin(predicate, Some(tree));
        }

        if let Some(Modifier::Reference(reference)) = modifier {
            let target = self.resolve_reference(reference)?;
            if node_test == NodeTest::Element(None) {
                node_test = target.node_test().clone();
            }
            predicate = PredicateTree::conjoin(predicate, target.predicate().cloned());
            index = index.or_else(|| target.index());
        }

        Ok(SelectorItem::new(depth_mode, node_test, predicate, index, self.options))
    }

    fn parse_node_test(&self, name: &str) -> ParseResult<NodeTest> {
        let test = match name {
            "" | "*" => NodeTest::Element(None),
            "text()" => NodeTest::Text,
            "comment()" => NodeTest::Comment,
            "cdata()" => NodeTest::CData,
            "doctype()" => NodeTest::DocType,
            "xmldecl()" => NodeTest::XmlDeclaration,
            "procinstr()" => NodeTest::ProcessingInstruction,
            other => {
                if other.contains(['(', ')']) {
                    return Err(SyntaxErrorKind::UnknownNodeTest(other.to_owned()));
                }
                if let Some(bad) = other.chars().find(|&ch| {
                    ch.is_whitespace() || matches!(ch, '@' | '=' | '\'' | '"' | ']' | '|' | '*' | '!')
                }) {
                    return Err(SyntaxErrorKind::UnexpectedCharacter(bad));
                }
                NodeTest::Element(Some(self.options.normalize_name(other)))
            }
        };
        Ok(test)
    }

    /// Compile the text a reference stands for into a single element segment.
    fn resolve_reference(&self, reference: &str) -> ParseResult<SelectorItem> {
        let resolved = self
            .resolver
            .and_then(|resolver| resolver.resolve_reference(reference))
            .ok_or_else(|| SyntaxErrorKind::UnresolvedReference(reference.to_owned()))?;
        let invalid = || SyntaxErrorKind::InvalidReference {
            reference: reference.to_owned(),
            resolved: resolved.clone(),
        };
        let nested = SelectorParser {
            options: self.options,
            resolver: None,
        };
        let mut items = nested.parse_path(resolved.trim()).map_err(|_| invalid())?;
        if items.len() != 1 {
            return Err(invalid());
        }
        let item = items.pop().ok_or_else(invalid)?;
        if item.node_test().leaf_kind().is_some() {
            return Err(invalid());
        }
        Ok(Arc::unwrap_or_clone(item))
    }
}

fn equals_condition(name: &str, value: &str) -> PredicateTree {
    PredicateTree::Attribute(AttributeCondition {
        name: name.into(),
        operator: AttributeOperator::Equals,
        value: Some(value.into()),
    })
}

/// Quote and grouping state while walking selector bytes.
#[derive(Default)]
struct Nesting {
    quote: Option<u8>,
    brackets: usize,
    parens: usize,
}

impl Nesting {
    /// Consume one byte. Returns whether it sits outside every quote and group.
    fn step(&mut self, byte: u8) -> ParseResult<bool> {
        if let Some(quote) = self.quote {
            if byte == quote {
                self.quote = None;
            }
            return Ok(false);
        }
        match byte {
            b'\'' | b'"' => self.quote = Some(byte),
            b'[' => self.brackets = self.brackets.saturating_add(1),
            b']' => {
                self.brackets = self
                    .brackets
                    .checked_sub(1)
                    .ok_or(SyntaxErrorKind::UnexpectedCharacter(']'))?;
            }
            b'(' => self.parens = self.parens.saturating_add(1),
            b')' => {
                self.parens = self
                    .parens
                    .checked_sub(1)
                    .ok_or(SyntaxErrorKind::UnexpectedCharacter(')'))?;
            }
            _ => return Ok(self.brackets == 0 && self.parens == 0),
        }
        Ok(false)
    }

    fn finish(&self) -> ParseResult<()> {
        if self.quote.is_some() {
            Err(SyntaxErrorKind::UnterminatedQuote)
        } else if self.brackets > 0 {
            Err(SyntaxErrorKind::UnterminatedBracket)
        } else if self.parens > 0 {
            Err(SyntaxErrorKind::UnexpectedCharacter('('))
        } else {
            Ok(())
        }
    }
}

/// Split on top-level `|` and whitespace-delimited `or`.
fn split_alternatives(text: &str) -> ParseResult<Vec<&str>> {
    let bytes = text.as_bytes();
    let mut nesting = Nesting::default();
    let mut alternatives = Vec::with_capacity(1);
    let mut start = 0;
    let mut pos = 0;
    while let Some(&byte) = bytes.get(pos) {
        let top_level = nesting.step(byte)?;
        if top_level && byte == b'|' {
            alternatives.push(alternative(text, start, pos)?);
            start = pos.saturating_add(1);
        } else if top_level && is_or_keyword(bytes, pos) {
            alternatives.push(alternative(text, start, pos)?);
            pos = pos.saturating_add(1);
            start = pos.saturating_add(1);
        }
        pos = pos.saturating_add(1);
    }
    nesting.finish()?;
    alternatives.push(alternative(text, start, bytes.len())?);
    Ok(alternatives)
}

fn alternative(text: &str, start: usize, end: usize) -> ParseResult<&str> {
    let part = text.get(start..end).unwrap_or_default().trim();
    if part.is_empty() {
        Err(SyntaxErrorKind::EmptyAlternative)
    } else {
        Ok(part)
    }
}

fn is_or_keyword(bytes: &[u8], pos: usize) -> bool {
    let preceded = pos
        .checked_sub(1)
        .and_then(|prev| bytes.get(prev))
        .is_some_and(u8::is_ascii_whitespace);
    let followed = bytes
        .get(pos.saturating_add(2))
        .is_some_and(u8::is_ascii_whitespace);
    preceded && followed && bytes.get(pos..).is_some_and(|rest| rest.starts_with(b"or"))
}

/// Split a path into `(slash count, body)` pairs.
fn split_segments(text: &str) -> ParseResult<Vec<(usize, &str)>> {
    let bytes = text.as_bytes();
    let mut nesting = Nesting::default();
    let mut segments = Vec::with_capacity(4);
    let mut pos = 0;
    loop {
        let run_start = pos;
        while bytes.get(pos) == Some(&b'/') {
            pos = pos.saturating_add(1);
        }
        let slashes = pos.saturating_sub(run_start);
        let body_start = pos;
        while let Some(&byte) = bytes.get(pos) {
            if nesting.step(byte)? && byte == b'/' {
                break;
            }
            pos = pos.saturating_add(1);
        }
        let body = text.get(body_start..pos).unwrap_or_default();
        if body.trim().is_empty() {
            return Err(if slashes > 2 {
                SyntaxErrorKind::SeparatorRun(slashes)
            } else {
                SyntaxErrorKind::MissingNodeTest
            });
        }
        segments.push((slashes, body));
        if pos >= bytes.len() {
            break;
        }
    }
    nesting.finish()?;
    Ok(segments)
}

/// Contents of each `[...]` group, outer brackets removed.
fn split_groups(text: &str) -> ParseResult<Vec<&str>> {
    let bytes = text.as_bytes();
    let mut groups = Vec::new();
    let mut pos = 0;
    while let Some(&byte) = bytes.get(pos) {
        if byte.is_ascii_whitespace() {
            pos = pos.saturating_add(1);
            continue;
        }
        if byte != b'[' {
            let found = text
                .get(pos..)
                .and_then(|rest| rest.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            return Err(SyntaxErrorKind::UnexpectedCharacter(found));
        }
        let mut depth = 0_usize;
        let mut quote = None;
        let mut end = None;
        for (offset, &inner) in bytes.iter().enumerate().skip(pos) {
            if let Some(open) = quote {
                if inner == open {
                    quote = None;
                }
                continue;
            }
            match inner {
                b'\'' | b'"' => quote = Some(inner),
                b'[' => depth = depth.saturating_add(1),
                b']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = Some(offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(end) = end else {
            return Err(if quote.is_some() {
                SyntaxErrorKind::UnterminatedQuote
            } else {
                SyntaxErrorKind::UnterminatedBracket
            });
        };
        groups.push(text.get(pos.saturating_add(1)..end).unwrap_or_default());
        pos = end.saturating_add(1);
    }
    Ok(groups)
}

fn split_modifier(name: &str) -> ParseResult<(&str, Option<Modifier<'_>>)> {
    let mut markers = name.match_indices(['#', '.', '%']);
    let Some((at, marker)) = markers.next() else {
        return Ok((name, None));
    };
    if markers.next().is_some() {
        return Err(SyntaxErrorKind::ConflictingModifiers);
    }
    let value = name
        .get(at.saturating_add(1)..)
        .unwrap_or_default()
        .trim();
    if value.is_empty() {
        let symbol = marker.chars().next().unwrap_or('%');
        return Err(SyntaxErrorKind::EmptyModifier(symbol));
    }
    let modifier = match marker {
        "#" => Modifier::Id(value),
        "." => Modifier::Class(value),
        _ => Modifier::Reference(value),
    };
    Ok((name.get(..at).unwrap_or_default(), Some(modifier)))
}

/// Recognize a positional group. `Ok(None)` means the group is an attribute predicate.
fn parse_index(group: &str) -> ParseResult<Option<IndexCondition>> {
    let content = group.trim();
    if content.eq_ignore_ascii_case("even()") {
        return Ok(Some(IndexCondition::Even));
    }
    if content.eq_ignore_ascii_case("odd()") {
        return Ok(Some(IndexCondition::Odd));
    }
    let (number, build): (&str, fn(usize) -> IndexCondition) =
        if let Some(rest) = content.strip_prefix('<') {
            (rest, IndexCondition::LessThan)
        } else if let Some(rest) = content.strip_prefix('>') {
            (rest, IndexCondition::MoreThan)
        } else if content.starts_with(|ch: char| ch.is_ascii_digit()) {
            (content, IndexCondition::Value)
        } else if content
            .strip_prefix('-')
            .is_some_and(|rest| rest.trim_start().starts_with(|ch: char| ch.is_ascii_digit()))
        {
            return Err(SyntaxErrorKind::InvalidPosition(content.to_owned()));
        } else {
            return Ok(None);
        };
    let number = number.trim();
    if number.is_empty() || !number.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(SyntaxErrorKind::InvalidPosition(content.to_owned()));
    }
    let value = number
        .parse::<usize>()
        .map_err(|_| SyntaxErrorKind::InvalidPosition(content.to_owned()))?;
    // Positions are 1-based.
    if value == 0 && !content.starts_with('>') {
        return Err(SyntaxErrorKind::InvalidPosition(content.to_owned()));
    }
    Ok(Some(build(value)))
}

/// Bytes that end an attribute name.
#[inline]
fn is_name_byte(byte: u8) -> bool {
    !byte.is_ascii_whitespace()
        && !matches!(
            byte,
            b'=' | b'!' | b'^' | b'$' | b'*' | b'~' | b'(' | b')' | b'[' | b']' | b'\'' | b'"' | b'@'
        )
}

/// Recursive-descent parser for the inside of one `[...]` attribute group.
struct PredicateParser<'src> {
    /// Group contents, for error messages and slicing.
    text: &'src str,
    /// Byte view of `text`.
    bytes: &'src [u8],
    /// Current cursor into `bytes`.
    index: usize,
    options: CompileOptions,
}

impl<'src> PredicateParser<'src> {
    #[inline]
    fn new(text: &'src str, options: CompileOptions) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            index: 0,
            options,
        }
    }

    fn parse(mut self) -> ParseResult<PredicateTree> {
        let tree = self.parse_or()?;
        self.skip_spaces();
        if self.index < self.bytes.len() {
            return Err(self.invalid());
        }
        Ok(tree)
    }

    fn invalid(&self) -> SyntaxErrorKind {
        SyntaxErrorKind::InvalidPredicate(self.text.trim().to_owned())
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    #[inline]
    fn peek_second(&self) -> Option<u8> {
        self.bytes.get(self.index.saturating_add(1)).copied()
    }

    #[inline]
    fn advance(&mut self, count: usize) {
        self.index = self.index.saturating_add(count);
    }

    #[inline]
    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.advance(1);
        }
    }

    fn parse_or(&mut self) -> ParseResult<PredicateTree> {
        let mut tree = self.parse_and()?;
        while self.consume_keyword("or") {
            let rhs = self.parse_and()?;
            tree = PredicateTree::Or(Box::new(tree), Box::new(rhs));
        }
        Ok(tree)
    }

    fn parse_and(&mut self) -> ParseResult<PredicateTree> {
        let mut tree = self.parse_primary()?;
        while self.consume_keyword("and") {
            let rhs = self.parse_primary()?;
            tree = PredicateTree::And(Box::new(tree), Box::new(rhs));
        }
        Ok(tree)
    }

    fn parse_primary(&mut self) -> ParseResult<PredicateTree> {
        self.skip_spaces();
        if self.peek() == Some(b'(') {
            self.advance(1);
            let inner = self.parse_or()?;
            self.skip_spaces();
            if self.peek() != Some(b')') {
                return Err(self.invalid());
            }
            self.advance(1);
            return Ok(inner);
        }
        self.parse_condition().map(PredicateTree::Attribute)
    }

    fn parse_condition(&mut self) -> ParseResult<AttributeCondition> {
        let negated = self.peek() == Some(b'!');
        if negated {
            self.advance(1);
            self.skip_spaces();
        }
        if self.peek() == Some(b'@') {
            self.advance(1);
        }
        let name = self.consume_name();
        if name.is_empty() {
            return Err(self.invalid());
        }
        let name = self.options.normalize_name(name);
        self.skip_spaces();
        let operator = self.consume_operator();
        if negated {
            if operator.is_some() {
                return Err(self.invalid());
            }
            return Ok(AttributeCondition {
                name,
                operator: AttributeOperator::NotExists,
                value: None,
            });
        }
        let Some(operator) = operator else {
            return Ok(AttributeCondition {
                name,
                operator: AttributeOperator::Exists,
                value: None,
            });
        };
        self.skip_spaces();
        let value = self.consume_value()?;
        Ok(AttributeCondition {
            name,
            operator,
            value: Some(value.into()),
        })
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        let saved = self.index;
        self.skip_spaces();
        let rest = self.bytes.get(self.index..).unwrap_or_default();
        let bounded = rest
            .get(keyword.len())
            .is_none_or(|&byte| !is_name_byte(byte));
        if rest.starts_with(keyword.as_bytes()) && bounded {
            self.advance(keyword.len());
            true
        } else {
            self.index = saved;
            false
        }
    }

    fn consume_name(&mut self) -> &'src str {
        let start = self.index;
        while self.peek().is_some_and(is_name_byte) {
            self.advance(1);
        }
        self.text.get(start..self.index).unwrap_or_default()
    }

    fn consume_operator(&mut self) -> Option<AttributeOperator> {
        let (operator, width) = match (self.peek()?, self.peek_second()) {
            (b'=', _) => (AttributeOperator::Equals, 1),
            (b'!', Some(b'=')) => (AttributeOperator::NotEquals, 2),
            (b'^', Some(b'=')) => (AttributeOperator::StartsWith, 2),
            (b'$', Some(b'=')) => (AttributeOperator::EndsWith, 2),
            (b'*', Some(b'=')) => (AttributeOperator::Contains, 2),
            (b'~', Some(b'=')) => (AttributeOperator::Includes, 2),
            _ => return None,
        };
        self.advance(width);
        Some(operator)
    }

    fn consume_value(&mut self) -> ParseResult<&'src str> {
        if let Some(quote @ (b'\'' | b'"')) = self.peek() {
            let start = self.index.saturating_add(1);
            let length = self
                .bytes
                .get(start..)
                .and_then(|rest| rest.iter().position(|&byte| byte == quote))
                .ok_or(SyntaxErrorKind::UnterminatedQuote)?;
            let end = start.saturating_add(length);
            self.index = end.saturating_add(1);
            return Ok(self.text.get(start..end).unwrap_or_default());
        }
        let start = self.index;
        while self
            .peek()
            .is_some_and(|byte| !byte.is_ascii_whitespace() && byte != b')')
        {
            self.advance(1);
        }
        if self.index == start {
            return Err(self.invalid());
        }
        Ok(self.text.get(start..self.index).unwrap_or_default())
    }
}
