//! Streaming selection over markup event streams.
//!
//! A dispatcher sits between a markup tokenizer and a downstream [`MarkupHandler`].
//! It evaluates compiled path selectors against the events as they arrive, with no
//! tree in memory, and routes every event to a selected or a non-selected handler:
//!
//! - [`NodeSelectionDispatcher`] routes each event on its own: an element start tag
//!   and its closing tag are selected together, while its children are judged separately.
//! - [`BlockExtractionDispatcher`] routes whole subtrees: everything from a matching
//!   element's start tag through its closing tag is selected.
//!
//! Element start tags are staged in an [`ElementStagingBuffer`] until all attributes
//! are known, so predicates see complete elements while the output order is kept.

mod block;
mod error;
mod event;
mod filter;
mod handler;
mod level;
mod node;
mod router;
mod staging;

pub use block::BlockExtractionDispatcher;
pub use error::{Invariant, SelectionError};
pub use event::{
    Attribute, DocType, ElementTag, Location, MarkupEvent, ProcessingInstruction, TextNode,
    XmlDeclaration,
};
pub use filter::{PathFilter, SelectorFilter};
pub use handler::{
    DiscardNonSelected, DiscardSelected, ForwardNonSelected, ForwardSelected, MarkSelected,
    MarkupHandler, NonSelectedHandler, SelectedHandler, SelectorMatch,
};
pub use node::NodeSelectionDispatcher;
pub use staging::{ElementShape, ElementStagingBuffer};
