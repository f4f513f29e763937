//! Per-node selection: every event is routed on its own merits.

use crate::error::SelectionError;
use crate::event::MarkupEvent;
use crate::handler::{
    DiscardNonSelected, DiscardSelected, ForwardNonSelected, ForwardSelected, MarkSelected,
    MarkupHandler, NonSelectedHandler, SelectedHandler,
};
use crate::level::NestingLevels;
use crate::router::{Router, compile_all};
use crate::staging::{ElementShape, ElementStagingBuffer};
use markup_selector::{CompiledSelector, SelectorCompiler};
use smallvec::SmallVec;
use std::sync::Arc;

/// Routes each event to the selected or non-selected handler depending on whether
/// any selector matches that event itself.
///
/// Element start tags are staged until their end, evaluated once all attributes are
/// known, and replayed as a unit. Closing tags are selected exactly when their open
/// tag was.
pub struct NodeSelectionDispatcher<H, S, N> {
    router: Router<H, S, N>,
    staging: ElementStagingBuffer,
    levels: NestingLevels,
    /// Per selector: levels whose open element it matched and which are still open.
    open_levels: Vec<SmallVec<[usize; 4]>>,
}

impl<H, S, N> NodeSelectionDispatcher<H, S, N>
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

    /// Build a dispatcher from already compiled selectors.
    ///
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
            open_levels: vec![SmallVec::new(); selectors.len()],
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

    /// Current nesting level.
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

    /// Consume the dispatcher and hand back the downstream sink.
    #[inline]
    pub fn into_downstream(self) -> H {
        self.router.downstream
    }

    fn route(&mut self, event: &MarkupEvent<'_>) -> Result<(), SelectionError> {
        match event {
            MarkupEvent::OpenElementStart(tag) => {
                self.staging.begin(ElementShape::Open, tag);
                Ok(())
            }
            MarkupEvent::StandaloneElementStart(tag) => {
                self.staging.begin(ElementShape::Standalone, tag);
                Ok(())
            }
            MarkupEvent::Attribute(attribute) => self.staging.append_attribute(attribute),
            MarkupEvent::InnerWhiteSpace(whitespace) => self.staging.append_whitespace(whitespace),
            MarkupEvent::StandaloneElementEnd(tag) => {
                self.staging.finish(tag)?;
                self.evaluate_element(ElementShape::Standalone);
                self.router.replay(&mut self.staging)
            }
            MarkupEvent::OpenElementEnd(tag) => {
                self.staging.finish(tag)?;
                self.evaluate_element(ElementShape::Open);
                let level = self.levels.level();
                for (levels, &matched) in self.open_levels.iter_mut().zip(&self.router.matches) {
                    if matched {
                        levels.push(level);
                    }
                }
                self.levels.enter();
                self.router.replay(&mut self.staging)
            }
            MarkupEvent::CloseElementStart(_) | MarkupEvent::AutoCloseElementStart(_) => {
                let level = self.levels.exit()?;
                for filter in &mut self.router.filters {
                    filter.remove_matches_for_level(level);
                }
                self.recall_open_matches(level);
                self.router.deliver(event)
            }
            MarkupEvent::CloseElementEnd(_) | MarkupEvent::AutoCloseElementEnd(_) => {
                let level = self.levels.level();
                self.recall_open_matches(level);
                for levels in &mut self.open_levels {
                    levels.retain(|open| *open != level);
                }
                self.router.deliver(event)
            }
            MarkupEvent::UnmatchedCloseElementStart(_)
            | MarkupEvent::UnmatchedCloseElementEnd(_) => {
                self.recall_open_matches(self.levels.level());
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
                self.evaluate_leaf(event);
                self.router.deliver(event)
            }
        }
    }

    fn evaluate_leaf(&mut self, event: &MarkupEvent<'_>) {
        let level = self.levels.level();
        let group = self.levels.sibling_group();
        let kind = event.leaf_kind();
        let Router {
            filters, matches, ..
        } = &mut self.router;
        for (filter, matched) in filters.iter_mut().zip(matches.iter_mut()) {
            *matched = kind.is_some_and(|leaf| filter.match_leaf(leaf, level, group));
        }
    }

    fn evaluate_element(&mut self, shape: ElementShape) {
        let level = self.levels.level();
        let group = self.levels.sibling_group();
        let element = &self.staging;
        let Router {
            filters, matches, ..
        } = &mut self.router;
        for (filter, matched) in filters.iter_mut().zip(matches.iter_mut()) {
            *matched = match shape {
                ElementShape::Open => filter.match_open_element(level, group, element),
                ElementShape::Standalone => filter.match_standalone_element(level, group, element),
            };
        }
    }

    /// A closing tag is selected by exactly the selectors that selected its open tag.
    fn recall_open_matches(&mut self, level: usize) {
        for (levels, matched) in self.open_levels.iter().zip(self.router.matches.iter_mut()) {
            *matched = levels.contains(&level);
        }
    }
}

impl<H: MarkupHandler> NodeSelectionDispatcher<H, MarkSelected, ForwardNonSelected> {
    /// Forward everything, adding `attribute_name="<matching selectors>"` to selected elements.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn marking<I, T>(
        compiler: &SelectorCompiler,
        selectors: I,
        attribute_name: &str,
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
            MarkSelected::new(attribute_name),
            ForwardNonSelected,
        )
    }
}

impl<H: MarkupHandler> NodeSelectionDispatcher<H, ForwardSelected, DiscardNonSelected> {
    /// Forward only selected events.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn including<I, T>(
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

impl<H: MarkupHandler> NodeSelectionDispatcher<H, DiscardSelected, ForwardNonSelected> {
    /// Forward everything except selected events.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn excluding<I, T>(
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
            DiscardSelected,
            ForwardNonSelected,
        )
    }
}

impl<H, S, N> MarkupHandler for NodeSelectionDispatcher<H, S, N>
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
