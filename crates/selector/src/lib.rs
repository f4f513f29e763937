//! Path selectors for streaming markup matching.
//!
//! A selector such as `//div[@class='box' and @id]/p[2]` compiles into a chain of
//! [`SelectorItem`]s, one per path segment. Items are immutable and shared through
//! `Arc`, so one compiled selector can drive any number of concurrent matching runs.
//!
//! This crate covers:
//! - Selector syntax: `/` and `//` separators, element and node-type tests,
//!   attribute predicates with `and`/`or`, positional predicates, `#id`/`.class`/`%ref` modifiers
//! - Top-level disjunction of whole paths (`a | b`)
//! - A bounded, thread-safe compilation cache ([`SelectorCompiler`])
//! - Pure predicate evaluation against any [`ElementAttributes`] implementation

mod cache;
mod config;
mod display;
mod error;
mod matcher;
mod parser;

use std::sync::Arc;

pub use cache::{ReferenceResolver, SelectorCompiler};
pub use config::{CompileOptions, CompilerConfig, Dialect};
pub use error::{SelectorResult, SelectorSyntaxError, SyntaxErrorKind};
pub use matcher::SiblingCounters;
pub use parser::compile_selector;

/// Read access to an element whose attributes are fully known.
///
/// The streaming side implements this for its staged element so that predicates
/// can be evaluated without building a tree.
pub trait ElementAttributes {
    /// Element name exactly as it appeared in the source.
    fn element_name(&self) -> &str;

    /// Number of attributes on the element.
    fn attribute_count(&self) -> usize;

    /// Value content (without quotes) of the named attribute, if present.
    /// Names compare ASCII case-insensitively unless `case_sensitive` is set.
    fn attribute_value(&self, name: &str, case_sensitive: bool) -> Option<&str>;
}

/// Whether a segment must sit directly below the previous one or anywhere beneath it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthMode {
    /// `/`: the immediate child level.
    ExactChild,
    /// `//`: any descendant level.
    AnyDescendant,
}

/// Event categories that never open a nesting level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Text,
    Comment,
    CData,
    DocType,
    XmlDeclaration,
    ProcessingInstruction,
}

/// What kind of node a segment selects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// An element, optionally restricted by name. `None` means any element.
    Element(Option<Box<str>>),
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `cdata()`
    CData,
    /// `doctype()`
    DocType,
    /// `xmldecl()`
    XmlDeclaration,
    /// `procinstr()`
    ProcessingInstruction,
}

impl NodeTest {
    /// The leaf category this test selects, or `None` for element tests.
    #[inline]
    pub const fn leaf_kind(&self) -> Option<LeafKind> {
        match self {
            Self::Element(_) => None,
            Self::Text => Some(LeafKind::Text),
            Self::Comment => Some(LeafKind::Comment),
            Self::CData => Some(LeafKind::CData),
            Self::DocType => Some(LeafKind::DocType),
            Self::XmlDeclaration => Some(LeafKind::XmlDeclaration),
            Self::ProcessingInstruction => Some(LeafKind::ProcessingInstruction),
        }
    }
}

/// Comparison applied by an attribute condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeOperator {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `^=`
    StartsWith,
    /// `$=`
    EndsWith,
    /// `*=`
    Contains,
    /// `~=`: one of the whitespace-separated tokens equals the value.
    Includes,
    /// Bare `name`.
    Exists,
    /// `!name`
    NotExists,
}

impl AttributeOperator {
    /// Source form of the operator; empty for the existence tests.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::StartsWith => "^=",
            Self::EndsWith => "$=",
            Self::Contains => "*=",
            Self::Includes => "~=",
            Self::Exists | Self::NotExists => "",
        }
    }
}

/// A single attribute test.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeCondition {
    /// Attribute name, lower-cased when compiled case-insensitively.
    pub name: Box<str>,
    pub operator: AttributeOperator,
    /// Expected value; `None` for the existence tests.
    pub value: Option<Box<str>>,
}

/// Attribute conditions joined by `and`/`or`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PredicateTree {
    Attribute(AttributeCondition),
    And(Box<PredicateTree>, Box<PredicateTree>),
    Or(Box<PredicateTree>, Box<PredicateTree>),
}

impl PredicateTree {
    /// Join two optional trees with `and`.
    #[inline]
    pub(crate) fn conjoin(left: Option<Self>, right: Option<Self>) -> Option<Self> {
        match (left, right) {
            (Some(lhs), Some(rhs)) => Some(Self::And(Box::new(lhs), Box::new(rhs))),
            (lhs, rhs) => lhs.or(rhs),
        }
    }

    /// True when no element without attributes can satisfy this tree.
    pub fn requires_attributes(&self) -> bool {
        match self {
            Self::Attribute(condition) => !matches!(
                condition.operator,
                AttributeOperator::NotExists | AttributeOperator::NotEquals
            ),
            Self::And(lhs, rhs) => lhs.requires_attributes() || rhs.requires_attributes(),
            Self::Or(lhs, rhs) => lhs.requires_attributes() && rhs.requires_attributes(),
        }
    }
}

/// Positional predicate. Numbers are 1-based sibling positions as written in the selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexCondition {
    /// `[n]`
    Value(usize),
    /// `[<n]`
    LessThan(usize),
    /// `[>n]`
    MoreThan(usize),
    /// `[even()]`: even 0-based counter.
    Even,
    /// `[odd()]`: odd 0-based counter.
    Odd,
}

/// One compiled path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectorItem {
    /// Separator that introduced this segment.
    depth_mode: DepthMode,
    /// Name or node-type test.
    node_test: NodeTest,
    /// Attribute predicate, if any.
    predicate: Option<PredicateTree>,
    /// Positional predicate, if any.
    index: Option<IndexCondition>,
    /// Derived from `predicate`; lets attribute-less elements be rejected in O(1).
    requires_attributes: bool,
    /// Options the segment was compiled with.
    options: CompileOptions,
}

impl SelectorItem {
    /// Build a segment, deriving the attribute short-circuit flag.
    #[inline]
    pub fn new(
        depth_mode: DepthMode,
        node_test: NodeTest,
        predicate: Option<PredicateTree>,
        index: Option<IndexCondition>,
        options: CompileOptions,
    ) -> Self {
        let requires_attributes = predicate
            .as_ref()
            .is_some_and(PredicateTree::requires_attributes);
        Self {
            depth_mode,
            node_test,
            predicate,
            index,
            requires_attributes,
            options,
        }
    }

    #[inline]
    pub const fn depth_mode(&self) -> DepthMode {
        self.depth_mode
    }

    /// True for `//` segments.
    #[inline]
    pub fn any_level(&self) -> bool {
        self.depth_mode == DepthMode::AnyDescendant
    }

    #[inline]
    pub const fn node_test(&self) -> &NodeTest {
        &self.node_test
    }

    #[inline]
    pub const fn predicate(&self) -> Option<&PredicateTree> {
        self.predicate.as_ref()
    }

    #[inline]
    pub const fn index(&self) -> Option<IndexCondition> {
        self.index
    }

    #[inline]
    pub const fn requires_attributes(&self) -> bool {
        self.requires_attributes
    }

    #[inline]
    pub const fn options(&self) -> CompileOptions {
        self.options
    }
}

/// A compiled path, or a disjunction of compiled paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectorChain {
    /// Segments in document order, outermost first.
    Path(Vec<Arc<SelectorItem>>),
    /// Either side may match; both sides start with the same depth mode.
    Or(Box<SelectorChain>, Box<SelectorChain>),
}

impl SelectorChain {
    /// Depth mode of the first segment (of the left-most path for disjunctions).
    pub fn leading_depth_mode(&self) -> Option<DepthMode> {
        match self {
            Self::Path(items) => items.first().map(|item| item.depth_mode()),
            Self::Or(lhs, _) => lhs.leading_depth_mode(),
        }
    }

    /// Total number of segments across every alternative.
    pub fn segment_count(&self) -> usize {
        match self {
            Self::Path(items) => items.len(),
            Self::Or(lhs, rhs) => lhs.segment_count().saturating_add(rhs.segment_count()),
        }
    }
}

/// The result of compiling one selector text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledSelector {
    /// Selector text as supplied by the caller.
    text: Box<str>,
    /// Options used for compilation.
    options: CompileOptions,
    /// The compiled chain.
    chain: SelectorChain,
}

impl CompiledSelector {
    #[inline]
    pub(crate) fn new(text: &str, options: CompileOptions, chain: SelectorChain) -> Self {
        Self {
            text: text.into(),
            options,
            chain,
        }
    }

    /// The source text this selector was compiled from.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub const fn options(&self) -> CompileOptions {
        self.options
    }

    #[inline]
    pub const fn chain(&self) -> &SelectorChain {
        &self.chain
    }
}
