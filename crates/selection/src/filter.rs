//! Per-run matching state for one compiled selector.
//!
//! A [`SelectorFilter`] holds one node per path segment. Each node remembers at
//! which nesting levels its segment matched an open element, and keeps its own
//! positional counters. Compiled selectors stay immutable; all mutable state lives here.

use core::cmp;
use markup_selector::{
    CompiledSelector, ElementAttributes, LeafKind, SelectorChain, SelectorItem, SiblingCounters,
};
use std::sync::Arc;

/// Levels added at once when a node sees a deeper level than it has room for.
const LEVEL_GROWTH: usize = 10;

/// Candidate handed down a path.
enum Candidate<'elem, E: ?Sized> {
    Leaf(LeafKind),
    Open(&'elem E),
    Standalone(&'elem E),
}

impl<E: ?Sized> Clone for Candidate<'_, E> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ?Sized> Copy for Candidate<'_, E> {}

/// Matching state of one path segment.
#[derive(Clone, Debug)]
struct FilterNode {
    item: Arc<SelectorItem>,
    /// `matched_at_level[l]`: this segment matched the open element at level `l`.
    matched_at_level: Vec<bool>,
    counters: SiblingCounters,
}

impl FilterNode {
    #[inline]
    fn new(item: &Arc<SelectorItem>) -> Self {
        Self {
            item: Arc::clone(item),
            matched_at_level: vec![false; LEVEL_GROWTH],
            counters: SiblingCounters::default(),
        }
    }

    #[inline]
    fn matched_at(&self, level: usize) -> bool {
        self.matched_at_level.get(level).copied().unwrap_or(false)
    }

    /// Whether this segment matched at `level` or at any level above it.
    #[inline]
    fn matched_at_or_above(&self, level: usize) -> bool {
        self.matched_at_level
            .iter()
            .take(level.saturating_add(1))
            .any(|&matched| matched)
    }

    fn set_matched(&mut self, level: usize, matched: bool) {
        if level >= self.matched_at_level.len() {
            let grown = cmp::max(
                level.saturating_add(1),
                self.matched_at_level.len().saturating_add(LEVEL_GROWTH),
            );
            self.matched_at_level.resize(grown, false);
        }
        if let Some(slot) = self.matched_at_level.get_mut(level) {
            *slot = matched;
        }
    }

    #[inline]
    fn clear_level(&mut self, level: usize) {
        if let Some(slot) = self.matched_at_level.get_mut(level) {
            *slot = false;
        }
    }

    fn test<E: ElementAttributes + ?Sized>(
        &mut self,
        sibling_group: usize,
        candidate: Candidate<'_, E>,
    ) -> bool {
        match candidate {
            Candidate::Leaf(kind) => self.item.matches_leaf(kind),
            Candidate::Open(element) | Candidate::Standalone(element) => {
                self.item
                    .matches_element(sibling_group, element, &mut self.counters)
            }
        }
    }
}

/// Matching state of one path.
#[derive(Clone, Debug)]
pub struct PathFilter {
    nodes: Vec<FilterNode>,
}

impl PathFilter {
    fn new(items: &[Arc<SelectorItem>]) -> Self {
        Self {
            nodes: items.iter().map(FilterNode::new).collect(),
        }
    }

    /// Whether the segment at `position` may be tested at `level`.
    #[inline]
    fn depth_gate(&self, position: usize, level: usize) -> bool {
        let Some(node) = self.nodes.get(position) else {
            return false;
        };
        if node.item.any_level() || level == 0 {
            return true;
        }
        position
            .checked_sub(1)
            .and_then(|previous| self.nodes.get(previous))
            .is_some_and(|previous| previous.matched_at(level.saturating_sub(1)))
    }

    /// Walk the path from its first segment.
    ///
    /// A segment that already matched at this level or above hands the candidate to
    /// the next segment; the last segment decides. A segment that matches for the
    /// first time records the level (open elements only) and succeeds only when it
    /// is the last one.
    fn evaluate<E: ElementAttributes + ?Sized>(
        &mut self,
        level: usize,
        sibling_group: usize,
        candidate: Candidate<'_, E>,
    ) -> bool {
        let opens_level = matches!(candidate, Candidate::Open(_));
        let last = self.nodes.len().saturating_sub(1);
        let mut position = 0;
        loop {
            let gate = self.depth_gate(position, level);
            let Some(node) = self.nodes.get_mut(position) else {
                return false;
            };
            let is_last = position == last;

            if gate {
                let this_matches = node.test(sibling_group, candidate);
                if node.matched_at_or_above(level) {
                    if opens_level {
                        node.set_matched(level, this_matches);
                    }
                    if is_last {
                        return this_matches;
                    }
                } else {
                    if this_matches && opens_level {
                        node.set_matched(level, true);
                    }
                    return this_matches && is_last;
                }
            } else if !node.matched_at_or_above(level) || is_last {
                return false;
            }
            position = position.saturating_add(1);
        }
    }

    fn remove_matches_for_level(&mut self, level: usize) {
        for node in &mut self.nodes {
            node.clear_level(level);
        }
    }
}

/// Matching state for a compiled selector: a single path, or a disjunction of paths.
#[derive(Clone, Debug)]
pub enum SelectorFilter {
    Path(PathFilter),
    Or(Box<SelectorFilter>, Box<SelectorFilter>),
}

impl SelectorFilter {
    /// Fresh state for one matching run.
    #[must_use]
    pub fn new(selector: &CompiledSelector) -> Self {
        Self::from_chain(selector.chain())
    }

    fn from_chain(chain: &SelectorChain) -> Self {
        match chain {
            SelectorChain::Path(items) => Self::Path(PathFilter::new(items)),
            SelectorChain::Or(lhs, rhs) => Self::Or(
                Box::new(Self::from_chain(lhs)),
                Box::new(Self::from_chain(rhs)),
            ),
        }
    }

    /// Test a text, comment, CDATA, doctype, XML declaration or processing instruction.
    #[inline]
    pub fn match_leaf(&mut self, kind: LeafKind, level: usize, sibling_group: usize) -> bool {
        self.evaluate::<NoElement>(level, sibling_group, Candidate::Leaf(kind))
    }

    /// Test an element that opens `level + 1`. Matches are remembered for descendants.
    #[inline]
    pub fn match_open_element<E: ElementAttributes + ?Sized>(
        &mut self,
        level: usize,
        sibling_group: usize,
        element: &E,
    ) -> bool {
        self.evaluate(level, sibling_group, Candidate::Open(element))
    }

    /// Test an element that has no children. Nothing is remembered.
    #[inline]
    pub fn match_standalone_element<E: ElementAttributes + ?Sized>(
        &mut self,
        level: usize,
        sibling_group: usize,
        element: &E,
    ) -> bool {
        self.evaluate(level, sibling_group, Candidate::Standalone(element))
    }

    /// Forget every match recorded at `level`. Called when the element at that level closes.
    pub fn remove_matches_for_level(&mut self, level: usize) {
        match self {
            Self::Path(path) => path.remove_matches_for_level(level),
            Self::Or(lhs, rhs) => {
                lhs.remove_matches_for_level(level);
                rhs.remove_matches_for_level(level);
            }
        }
    }

    fn evaluate<E: ElementAttributes + ?Sized>(
        &mut self,
        level: usize,
        sibling_group: usize,
        candidate: Candidate<'_, E>,
    ) -> bool {
        match self {
            Self::Path(path) => path.evaluate(level, sibling_group, candidate),
            Self::Or(lhs, rhs) => {
                // Both sides must see every candidate to keep their level state current.
                let left = lhs.evaluate(level, sibling_group, candidate);
                let right = rhs.evaluate(level, sibling_group, candidate);
                left || right
            }
        }
    }
}

/// Element type used when only a leaf is being tested.
struct NoElement;

impl ElementAttributes for NoElement {
    #[inline]
    fn element_name(&self) -> &str {
        ""
    }

    #[inline]
    fn attribute_count(&self) -> usize {
        0
    }

    #[inline]
    fn attribute_value(&self, _name: &str, _case_sensitive: bool) -> Option<&str> {
        None
    }
}
