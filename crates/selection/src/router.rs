//! State shared by both dispatchers: compiled selectors, their filters, the current
//! match flags, and the three sinks.

use crate::error::SelectionError;
use crate::event::MarkupEvent;
use crate::filter::SelectorFilter;
use crate::handler::{MarkupHandler, NonSelectedHandler, SelectedHandler, SelectorMatch};
use crate::staging::ElementStagingBuffer;
use log::{trace, warn};
use markup_selector::{CompiledSelector, SelectorCompiler};
use std::sync::Arc;

/// Compile every selector text through `compiler`.
pub(crate) fn compile_all<I, T>(
    compiler: &SelectorCompiler,
    selectors: I,
) -> Result<Vec<Arc<CompiledSelector>>, SelectionError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    selectors
        .into_iter()
        .map(|text| compiler.compile(text.as_ref()).map_err(SelectionError::from))
        .collect()
}

pub(crate) struct Router<H, S, N> {
    pub(crate) downstream: H,
    pub(crate) selected: S,
    pub(crate) non_selected: N,
    pub(crate) selectors: Vec<String>,
    pub(crate) filters: Vec<SelectorFilter>,
    /// One flag per selector for the event being routed.
    pub(crate) matches: Vec<bool>,
    poisoned: bool,
}

impl<H, S, N> Router<H, S, N>
where
    H: MarkupHandler,
    S: SelectedHandler,
    N: NonSelectedHandler,
{
    pub(crate) fn new(
        compiled: &[Arc<CompiledSelector>],
        downstream: H,
        selected: S,
        non_selected: N,
    ) -> Result<Self, SelectionError> {
        if compiled.is_empty() {
            return Err(SelectionError::NoSelectors);
        }
        Ok(Self {
            downstream,
            selected,
            non_selected,
            selectors: compiled
                .iter()
                .map(|selector| selector.text().to_owned())
                .collect(),
            filters: compiled
                .iter()
                .map(|selector| SelectorFilter::new(selector))
                .collect(),
            matches: vec![false; compiled.len()],
            poisoned: false,
        })
    }

    #[inline]
    pub(crate) fn any_match(&self) -> bool {
        self.matches.iter().any(|&matched| matched)
    }

    /// Refuse further events once an ordering contract has been broken.
    #[inline]
    pub(crate) fn check_poisoned(&self) -> Result<(), SelectionError> {
        if self.poisoned {
            Err(SelectionError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Poison the router if `outcome` is an ordering violation.
    pub(crate) fn observe(
        &mut self,
        event: &MarkupEvent<'_>,
        outcome: Result<(), SelectionError>,
    ) -> Result<(), SelectionError> {
        if let Err(SelectionError::InvariantViolation(invariant)) = &outcome {
            warn!(
                "Selection stopped at {} event: {invariant}",
                event.kind_name()
            );
            self.poisoned = true;
        }
        outcome
    }

    /// Route to the selected handler if any selector matches, otherwise to the non-selected one.
    pub(crate) fn deliver(&mut self, event: &MarkupEvent<'_>) -> Result<(), SelectionError> {
        if self.any_match() {
            self.deliver_selected(event)
        } else {
            trace!("Non-selected {} event", event.kind_name());
            self.non_selected
                .on_non_selected(event, &mut self.downstream)
                .map_err(SelectionError::Handler)
        }
    }

    pub(crate) fn deliver_selected(
        &mut self,
        event: &MarkupEvent<'_>,
    ) -> Result<(), SelectionError> {
        trace!("Selected {} event", event.kind_name());
        let selection = SelectorMatch::new(&self.selectors, &self.matches);
        self.selected
            .on_selected(selection, event, &mut self.downstream)
            .map_err(SelectionError::Handler)
    }

    /// Replay a finished element to the sink chosen by the current match flags.
    pub(crate) fn replay(
        &mut self,
        staging: &mut ElementStagingBuffer,
    ) -> Result<(), SelectionError> {
        let Self {
            downstream,
            selected,
            non_selected,
            selectors,
            matches,
            ..
        } = self;
        if matches.iter().any(|&matched| matched) {
            let selection = SelectorMatch::new(selectors, matches);
            staging.replay_into(|staged| selected.on_selected(selection, staged, &mut *downstream))
        } else {
            staging.replay_into(|staged| non_selected.on_non_selected(staged, &mut *downstream))
        }
    }
}
