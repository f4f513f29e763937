//! Sinks that receive events after selection, and the built-in routing policies.

use crate::event::{Attribute, ElementTag, MarkupEvent, TextNode};
use anyhow::Result;

/// Downstream consumer of markup events.
pub trait MarkupHandler {
    /// Receive one event. Borrowed payloads are only valid for this call.
    ///
    /// # Errors
    /// Implementations report failures to the caller, which stops dispatching.
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> Result<()>;
}

impl<H: MarkupHandler + ?Sized> MarkupHandler for &mut H {
    #[inline]
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> Result<()> {
        (**self).handle_event(event)
    }
}

impl<H: MarkupHandler + ?Sized> MarkupHandler for Box<H> {
    #[inline]
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> Result<()> {
        (**self).handle_event(event)
    }
}

/// Which selectors apply to the event being delivered.
#[derive(Clone, Copy, Debug)]
pub struct SelectorMatch<'sel> {
    selectors: &'sel [String],
    matches: &'sel [bool],
}

impl<'sel> SelectorMatch<'sel> {
    #[inline]
    pub(crate) const fn new(selectors: &'sel [String], matches: &'sel [bool]) -> Self {
        Self { selectors, matches }
    }

    /// Every selector text, in registration order.
    #[inline]
    pub const fn selectors(&self) -> &'sel [String] {
        self.selectors
    }

    /// One flag per selector.
    #[inline]
    pub const fn matches(&self) -> &'sel [bool] {
        self.matches
    }

    /// Texts of the selectors that apply.
    pub fn matched_selectors(&self) -> impl Iterator<Item = &'sel str> + 'sel {
        self.selectors
            .iter()
            .zip(self.matches)
            .filter(|&(_, &matched)| matched)
            .map(|(selector, _)| selector.as_str())
    }
}

/// Receives events matched by at least one selector.
pub trait SelectedHandler {
    /// # Errors
    /// Failures from `downstream` or from the handler itself.
    fn on_selected(
        &mut self,
        selection: SelectorMatch<'_>,
        event: &MarkupEvent<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()>;
}

/// Receives events no selector matched.
pub trait NonSelectedHandler {
    /// # Errors
    /// Failures from `downstream` or from the handler itself.
    fn on_non_selected(
        &mut self,
        event: &MarkupEvent<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()>;
}

/// Passes selected events through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardSelected;

impl SelectedHandler for ForwardSelected {
    #[inline]
    fn on_selected(
        &mut self,
        _selection: SelectorMatch<'_>,
        event: &MarkupEvent<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        downstream.handle_event(event)
    }
}

/// Drops selected events.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSelected;

impl SelectedHandler for DiscardSelected {
    #[inline]
    fn on_selected(
        &mut self,
        _selection: SelectorMatch<'_>,
        _event: &MarkupEvent<'_>,
        _downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        Ok(())
    }
}

/// Passes non-selected events through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardNonSelected;

impl NonSelectedHandler for ForwardNonSelected {
    #[inline]
    fn on_non_selected(
        &mut self,
        event: &MarkupEvent<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        downstream.handle_event(event)
    }
}

/// Drops non-selected events.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardNonSelected;

impl NonSelectedHandler for DiscardNonSelected {
    #[inline]
    fn on_non_selected(
        &mut self,
        _event: &MarkupEvent<'_>,
        _downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        Ok(())
    }
}

/// Forwards selected events and tags every selected element start with an
/// attribute listing the matching selectors, e.g. `data-sel="//p //div/p"`.
///
/// A single space is inserted before the attribute unless the tag already ends in
/// inner whitespace.
#[derive(Clone, Debug)]
pub struct MarkSelected {
    /// Name of the injected attribute.
    attribute_name: String,
    /// Whether the last selected event was inner whitespace.
    last_was_whitespace: bool,
    /// Quoted value of the injected attribute, reused between elements.
    value_outer: String,
}

impl MarkSelected {
    #[inline]
    #[must_use]
    pub fn new(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            last_was_whitespace: false,
            value_outer: String::new(),
        }
    }

    #[inline]
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn inject_attribute(
        &mut self,
        selection: SelectorMatch<'_>,
        tag: &ElementTag<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        if !self.last_was_whitespace {
            downstream.handle_event(&MarkupEvent::InnerWhiteSpace(TextNode {
                content: " ",
                location: tag.location,
            }))?;
        }

        self.value_outer.clear();
        self.value_outer.push('"');
        for (position, selector) in selection.matched_selectors().enumerate() {
            if position > 0 {
                self.value_outer.push(' ');
            }
            for character in selector.chars() {
                if character == '"' {
                    self.value_outer.push_str("&quot;");
                } else {
                    self.value_outer.push(character);
                }
            }
        }
        self.value_outer.push('"');

        let value_content = self
            .value_outer
            .get(1..self.value_outer.len().saturating_sub(1))
            .unwrap_or_default();
        downstream.handle_event(&MarkupEvent::Attribute(Attribute {
            name: &self.attribute_name,
            operator: "=",
            value_content,
            value_outer: &self.value_outer,
            name_location: tag.location,
            operator_location: tag.location,
            value_location: tag.location,
        }))
    }
}

impl SelectedHandler for MarkSelected {
    fn on_selected(
        &mut self,
        selection: SelectorMatch<'_>,
        event: &MarkupEvent<'_>,
        downstream: &mut dyn MarkupHandler,
    ) -> Result<()> {
        if let MarkupEvent::OpenElementEnd(tag) | MarkupEvent::StandaloneElementEnd(tag) = event {
            self.inject_attribute(selection, tag, downstream)?;
        }
        self.last_was_whitespace = matches!(event, MarkupEvent::InnerWhiteSpace(_));
        downstream.handle_event(event)
    }
}
