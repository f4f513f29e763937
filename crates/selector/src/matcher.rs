//! Predicate evaluation for a single segment.

use crate::{
    AttributeCondition, AttributeOperator, CompileOptions, ElementAttributes, IndexCondition,
    LeafKind, NodeTest, PredicateTree, SelectorItem,
};
use rustc_hash::FxHashMap;

/// Per-segment positional counters, keyed by sibling-group id.
///
/// The map is only allocated once a positional predicate is actually evaluated.
#[derive(Clone, Debug, Default)]
pub struct SiblingCounters {
    counters: Option<FxHashMap<usize, usize>>,
}

impl SiblingCounters {
    /// Return the 0-based count of candidates seen so far in `sibling_group`, then bump it.
    #[inline]
    pub fn advance(&mut self, sibling_group: usize) -> usize {
        let counter = self
            .counters
            .get_or_insert_with(FxHashMap::default)
            .entry(sibling_group)
            .or_insert(0);
        let current = *counter;
        *counter = counter.saturating_add(1);
        current
    }

    /// Number of sibling groups with a live counter.
    #[inline]
    pub fn group_count(&self) -> usize {
        self.counters.as_ref().map_or(0, FxHashMap::len)
    }
}

impl IndexCondition {
    /// Test a 0-based candidate counter.
    #[inline]
    pub const fn matches(self, counter: usize) -> bool {
        let position = counter.saturating_add(1);
        match self {
            Self::Value(expected) => position == expected,
            Self::LessThan(bound) => position < bound,
            Self::MoreThan(bound) => position > bound,
            Self::Even => counter % 2 == 0,
            Self::Odd => counter % 2 == 1,
        }
    }
}

impl AttributeCondition {
    /// Evaluate against an element's attributes.
    pub fn evaluate<E: ElementAttributes + ?Sized>(&self, element: &E, options: CompileOptions) -> bool {
        let actual = element.attribute_value(&self.name, options.case_sensitive);
        let expected = self.value.as_deref().unwrap_or_default();
        let tokenized = options.tokenizes_class() && &*self.name == "class";
        match self.operator {
            AttributeOperator::Exists => actual.is_some(),
            AttributeOperator::NotExists => actual.is_none(),
            AttributeOperator::Equals => {
                actual.is_some_and(|value| value_equals(value, expected, tokenized))
            }
            AttributeOperator::NotEquals => {
                actual.is_none_or(|value| !value_equals(value, expected, tokenized))
            }
            AttributeOperator::StartsWith => actual.is_some_and(|value| value.starts_with(expected)),
            AttributeOperator::EndsWith => actual.is_some_and(|value| value.ends_with(expected)),
            AttributeOperator::Contains => actual.is_some_and(|value| value.contains(expected)),
            AttributeOperator::Includes => actual.is_some_and(|value| has_token(value, expected)),
        }
    }
}

#[inline]
fn value_equals(value: &str, expected: &str, tokenized: bool) -> bool {
    if tokenized {
        has_token(value, expected)
    } else {
        value == expected
    }
}

#[inline]
fn has_token(value: &str, expected: &str) -> bool {
    value.split_ascii_whitespace().any(|token| token == expected)
}

impl PredicateTree {
    /// Evaluate the whole tree; both sides of `and`/`or` short-circuit.
    pub fn evaluate<E: ElementAttributes + ?Sized>(&self, element: &E, options: CompileOptions) -> bool {
        match self {
            Self::Attribute(condition) => condition.evaluate(element, options),
            Self::And(lhs, rhs) => lhs.evaluate(element, options) && rhs.evaluate(element, options),
            Self::Or(lhs, rhs) => lhs.evaluate(element, options) || rhs.evaluate(element, options),
        }
    }
}

impl SelectorItem {
    /// Whether this segment selects leaf events of `kind`.
    #[inline]
    pub fn matches_leaf(&self, kind: LeafKind) -> bool {
        self.node_test().leaf_kind() == Some(kind)
    }

    /// Test an element whose attributes are complete.
    ///
    /// Every element evaluated here counts as a candidate for the positional
    /// predicate of `sibling_group`, whether or not its name and attributes match.
    pub fn matches_element<E: ElementAttributes + ?Sized>(
        &self,
        sibling_group: usize,
        element: &E,
        counters: &mut SiblingCounters,
    ) -> bool {
        let NodeTest::Element(name) = self.node_test() else {
            return false;
        };
        let counter = self.index().map(|_| counters.advance(sibling_group));

        if self.requires_attributes() && element.attribute_count() == 0 {
            return false;
        }
        let options = self.options();
        if let Some(expected) = name {
            let actual = element.element_name();
            let same = if options.case_sensitive {
                actual == &**expected
            } else {
                actual.eq_ignore_ascii_case(expected)
            };
            if !same {
                return false;
            }
        }
        if self
            .predicate()
            .is_some_and(|predicate| !predicate.evaluate(element, options))
        {
            return false;
        }
        match (self.index(), counter) {
            (Some(index), Some(counter)) => index.matches(counter),
            _ => true,
        }
    }
}
