//! Block selection: once an element matches, its whole subtree is selected.

use crate::error::SelectionError;
use crate::event::MarkupEvent;
use crate::handler::{
    DiscardNonSelected, ForwardSelected, MarkupHandler, NonSelectedHandler, SelectedHandler,
};
use crate::level::NestingLevels;
use crate::router::{Router, compile_all};
use crate::staging::{ElementShape, ElementStagingBuffer};
use log::debug;
use markup_selector::{CompiledSelector, SelectorCompiler};
use std::sync::Arc;

/// Routes whole blocks: every event from a matching element's start tag through its
/// closing tag, descendants included, goes to the selected handler.
///
/// Each selector tracks its own block. While every selector is inside one, events
/// skip staging and evaluation and go straight to the selected handler.
pub struct BlockExtractionDispatcher<H, S = ForwardSelected, N = DiscardNonSelected> {
    router: Router<H, S, N>,
    staging: ElementStagingBuffer,
    levels: NestingLevels,
    /// Per selector: level of the element whose block is currently selected.
    matching_levels: Vec<Option<usize>>,
    inside_all: bool,
}

impl<H, S, N> BlockExtractionDispatcher<H, S, N>
where
    H: MarkupHandler,
    S: SelectedHandler,
    N: NonSelectedHandler,
{
    /// Compile `selectors` and build a dispatcher around the given sinks.
    ///
    /// # Errors
    /// `Syntax` for a malformed selector, `NoSelectors` for an empty list.
    pub fn new<I, T>(
        compiler: &SelectorCompiler,
        selectors: I,
        downstream: H,
        selected: S,
        non_selected: N,
    ) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let compiled = compile_all(compiler, selectors)?;
        Self::from_compiled(&compiled, downstream, selected, non_selected)
    }

    /// # Errors
    /// `NoSelectors` for an empty list.
    pub fn from_compiled(
        selectors: &[Arc<CompiledSelector>],
        downstream: H,
        selected: S,
        non_selected: N,
    ) -> Result<Self, SelectionError> {
        let router = Router::new(selectors, downstream, selected, non_selected)?;
        Ok(Self {
            router,
            staging: ElementStagingBuffer::new(),
            levels: NestingLevels::new(),
            matching_levels: vec![None; selectors.len()],
            inside_all: false,
        })
    }

    /// Route one event.
    ///
    /// # Errors
    /// `InvariantViolation` when the event stream breaks its ordering contract, after
    /// which every call fails with `Poisoned`. `Handler` when a sink fails.
    pub fn dispatch(&mut self, event: &MarkupEvent<'_>) -> Result<(), SelectionError> {
        self.router.check_poisoned()?;
        let outcome = self.route(event);
        self.router.observe(event, outcome)
    }

    #[inline]
    pub const fn level(&self) -> usize {
        self.levels.level()
    }

    #[inline]
    pub const fn downstream(&self) -> &H {
        &self.router.downstream
    }

    #[inline]
    pub fn downstream_mut(&mut self) -> &mut H {
        &mut self.router.downstream
    }

    #[inline]
    pub fn into_downstream(self) -> H {
        self.router.downstream
    }

    fn route(&mut self, event: &MarkupEvent<'_>) -> Result<(), SelectionError> {
        match event {
            MarkupEvent::OpenElementStart(tag) | MarkupEvent::StandaloneElementStart(tag) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                let shape = if matches!(event, MarkupEvent::OpenElementStart(_)) {
                    ElementShape::Open
                } else {
                    ElementShape::Standalone
                };
                self.staging.begin(shape, tag);
                Ok(())
            }
            MarkupEvent::Attribute(attribute) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.staging.append_attribute(attribute)
            }
            MarkupEvent::InnerWhiteSpace(whitespace) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.staging.append_whitespace(whitespace)
            }
            MarkupEvent::StandaloneElementEnd(tag) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.staging.finish(tag)?;
                self.evaluate_element(ElementShape::Standalone);
                self.router.replay(&mut self.staging)
            }
            MarkupEvent::OpenElementEnd(tag) => {
                if self.inside_all {
                    self.levels.enter();
                    return self.router.deliver_selected(event);
                }
                self.staging.finish(tag)?;
                self.evaluate_element(ElementShape::Open);
                self.levels.enter();
                self.router.replay(&mut self.staging)
            }
            MarkupEvent::CloseElementStart(_) | MarkupEvent::AutoCloseElementStart(_) => {
                let level = self.levels.exit()?;
                for filter in &mut self.router.filters {
                    filter.remove_matches_for_level(level);
                }
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.recall_blocks(level);
                self.router.deliver(event)
            }
            MarkupEvent::CloseElementEnd(_) | MarkupEvent::AutoCloseElementEnd(_) => {
                let level = self.levels.level();
                let was_inside_all = self.inside_all;
                if !was_inside_all {
                    self.recall_blocks(level);
                }
                self.leave_blocks(level);
                if was_inside_all {
                    self.router.deliver_selected(event)
                } else {
                    self.router.deliver(event)
                }
            }
            MarkupEvent::UnmatchedCloseElementStart(_)
            | MarkupEvent::UnmatchedCloseElementEnd(_) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.recall_blocks(self.levels.level());
                self.router.deliver(event)
            }
            MarkupEvent::DocumentStart { .. }
            | MarkupEvent::DocumentEnd { .. }
            | MarkupEvent::XmlDeclaration(_)
            | MarkupEvent::DocType(_)
            | MarkupEvent::CData(_)
            | MarkupEvent::Text(_)
            | MarkupEvent::Comment(_)
            | MarkupEvent::ProcessingInstruction(_) => {
                if self.inside_all {
                    return self.router.deliver_selected(event);
                }
                self.evaluate_leaf(event);
                self.router.deliver(event)
            }
        }
    }

    #[inline]
    fn is_inside(matching_level: Option<usize>, level: usize) -> bool {
        matching_level.is_some_and(|block| block <= level)
    }

    fn evaluate_leaf(&mut self, event: &MarkupEvent<'_>) {
        let level = self.levels.level();
        let group = self.levels.sibling_group();
        let kind = event.leaf_kind();
        let Router {
            filters, matches, ..
        } = &mut self.router;
        for ((filter, matched), &block) in filters
            .iter_mut()
            .zip(matches.iter_mut())
            .zip(&self.matching_levels)
        {
            *matched = Self::is_inside(block, level)
                || kind.is_some_and(|leaf| filter.match_leaf(leaf, level, group));
        }
    }

    fn evaluate_element(&mut self, shape: ElementShape) {
        let level = self.levels.level();
        let group = self.levels.sibling_group();
        let element = &self.staging;
        let Router {
            filters, matches, ..
        } = &mut self.router;
        for ((filter, matched), block) in filters
            .iter_mut()
            .zip(matches.iter_mut())
            .zip(&mut self.matching_levels)
        {
            if Self::is_inside(*block, level) {
                *matched = true;
                continue;
            }
            *matched = match shape {
                ElementShape::Open => filter.match_open_element(level, group, element),
                ElementShape::Standalone => filter.match_standalone_element(level, group, element),
            };
            if *matched && shape == ElementShape::Open {
                *block = Some(level);
            }
        }
        if shape == ElementShape::Open && self.matching_levels.iter().all(Option::is_some) {
            debug!("Every selector is inside a block from level {level}");
            self.inside_all = true;
        }
    }

    /// Selected exactly for the selectors whose block encloses `level`.
    fn recall_blocks(&mut self, level: usize) {
        for (matched, &block) in self.router.matches.iter_mut().zip(&self.matching_levels) {
            *matched = Self::is_inside(block, level);
        }
    }

    /// End every block whose element at `level` has just closed.
    fn leave_blocks(&mut self, level: usize) {
        for block in &mut self.matching_levels {
            if *block == Some(level) {
                *block = None;
                self.inside_all = false;
            }
        }
    }
}

impl<H: MarkupHandler> BlockExtractionDispatcher<H> {
    /// Forward the selected blocks and drop everything else.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn extracting<I, T>(
        compiler: &SelectorCompiler,
        selectors: I,
        downstream: H,
    ) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::new(
            compiler,
            selectors,
            downstream,
            ForwardSelected,
            DiscardNonSelected,
        )
    }
}

impl<H, S, N> MarkupHandler for BlockExtractionDispatcher<H, S, N>
where
    H: MarkupHandler,
    S: SelectedHandler,
    N: NonSelectedHandler,
{
    #[inline]
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> anyhow::Result<()> {
        self.dispatch(event).map_err(Into::into)
    }
}
