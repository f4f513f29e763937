//! Canonical text rendering of compiled selectors.

use crate::{
    AttributeCondition, AttributeOperator, DepthMode, IndexCondition, NodeTest, PredicateTree,
    SelectorChain, SelectorItem,
};
use core::fmt::{Display, Formatter, Result as FmtResult};

impl Display for DepthMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(match self {
            Self::ExactChild => "/",
            Self::AnyDescendant => "//",
        })
    }
}

impl Display for NodeTest {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(match self {
            Self::Element(Some(name)) => name,
            Self::Element(None) => "*",
            Self::Text => "text()",
            Self::Comment => "comment()",
            Self::CData => "cdata()",
            Self::DocType => "doctype()",
            Self::XmlDeclaration => "xmldecl()",
            Self::ProcessingInstruction => "procinstr()",
        })
    }
}

impl Display for AttributeCondition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match (self.operator, self.value.as_deref()) {
            (AttributeOperator::NotExists, _) => write!(formatter, "!@{}", self.name),
            (_, None) => write!(formatter, "@{}", self.name),
            (operator, Some(value)) => {
                let quote = if value.contains('\'') { '"' } else { '\'' };
                write!(
                    formatter,
                    "@{}{}{quote}{value}{quote}",
                    self.name,
                    operator.as_str()
                )
            }
        }
    }
}

impl Display for PredicateTree {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Attribute(condition) => condition.fmt(formatter),
            Self::Or(lhs, rhs) => write!(formatter, "{lhs} or {rhs}"),
            Self::And(lhs, rhs) => {
                write_operand(formatter, lhs)?;
                formatter.write_str(" and ")?;
                write_operand(formatter, rhs)
            }
        }
    }
}

/// `or` binds looser than `and`, so nested disjunctions need parentheses.
fn write_operand(formatter: &mut Formatter<'_>, tree: &PredicateTree) -> FmtResult {
    if matches!(tree, PredicateTree::Or(..)) {
        write!(formatter, "({tree})")
    } else {
        tree.fmt(formatter)
    }
}

impl Display for IndexCondition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Value(position) => write!(formatter, "{position}"),
            Self::LessThan(position) => write!(formatter, "<{position}"),
            Self::MoreThan(position) => write!(formatter, ">{position}"),
            Self::Even => formatter.write_str("even()"),
            Self::Odd => formatter.write_str("odd()"),
        }
    }
}

impl Display for SelectorItem {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}{}", self.depth_mode(), self.node_test())?;
        if let Some(predicate) = self.predicate() {
            write!(formatter, "[{predicate}]")?;
        }
        if let Some(index) = self.index() {
            write!(formatter, "[{index}]")?;
        }
        Ok(())
    }
}

impl Display for SelectorChain {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Path(items) => items.iter().try_for_each(|item| item.fmt(formatter)),
            Self::Or(lhs, rhs) => write!(formatter, "{lhs} | {rhs}"),
        }
    }
}
