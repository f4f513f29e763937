use markup_selector::SelectorSyntaxError;
use thiserror::Error;

/// Event-ordering contracts a dispatcher relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Invariant {
    #[error("attribute or inner whitespace outside of an element start tag")]
    AppendOutsideElement,
    #[error("element end without a matching element start")]
    FinishOutsideElement,
    #[error("staged element replayed before it was finished, or replayed twice")]
    ReplayBeforeFinish,
    #[error("closing tag at nesting level 0")]
    LevelUnderflow,
}

/// Errors raised while building or driving a selection dispatcher.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Syntax(#[from] SelectorSyntaxError),
    #[error("at least one selector is required")]
    NoSelectors,
    #[error("event stream broke an ordering contract: {0}")]
    InvariantViolation(Invariant),
    #[error("dispatcher stopped after an earlier ordering violation")]
    Poisoned,
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl From<Invariant> for SelectionError {
    #[inline]
    fn from(invariant: Invariant) -> Self {
        Self::InvariantViolation(invariant)
    }
}
