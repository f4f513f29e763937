//! Buffering of one element start tag until its attributes are complete.
//!
//! Predicates can only be evaluated once every attribute of an element is known, so
//! the start event, its attributes and inner whitespace are copied here and replayed
//! in their original order once the tag ends. The buffer owns its text; producers
//! are free to reuse their own buffers as soon as an event has been delivered.

use crate::error::{Invariant, SelectionError};
use crate::event::{Attribute, ElementTag, Location, MarkupEvent, TextNode};
use markup_selector::ElementAttributes;

/// Whether the staged element opens a nesting level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementShape {
    Open,
    Standalone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StagingState {
    Idle,
    Recording,
    Finished,
}

/// Byte range into the staging text.
#[derive(Clone, Copy, Debug, Default)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Clone, Copy, Debug)]
struct StagedTag {
    name: Span,
    minimized: bool,
    location: Location,
}

#[derive(Clone, Copy, Debug)]
enum StagedPart {
    Attribute {
        name: Span,
        operator: Span,
        value_content: Span,
        value_outer: Span,
        name_location: Location,
        operator_location: Location,
        value_location: Location,
    },
    Whitespace {
        content: Span,
        location: Location,
    },
}

/// Copy of one element start tag.
#[derive(Debug)]
pub struct ElementStagingBuffer {
    state: StagingState,
    shape: ElementShape,
    /// Backing storage for every staged string.
    text: String,
    start: StagedTag,
    end: StagedTag,
    /// Attributes and inner whitespace in arrival order.
    parts: Vec<StagedPart>,
    attribute_count: usize,
}

impl Default for ElementStagingBuffer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ElementStagingBuffer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let empty = StagedTag {
            name: Span::default(),
            minimized: false,
            location: Location::default(),
        };
        Self {
            state: StagingState::Idle,
            shape: ElementShape::Open,
            text: String::new(),
            start: empty,
            end: empty,
            parts: Vec::new(),
            attribute_count: 0,
        }
    }

    /// Start recording a new element, discarding whatever was staged before.
    pub fn begin(&mut self, shape: ElementShape, tag: &ElementTag<'_>) {
        self.text.clear();
        self.parts.clear();
        self.attribute_count = 0;
        self.shape = shape;
        self.start = StagedTag {
            name: self.store(tag.name),
            minimized: tag.minimized,
            location: tag.location,
        };
        self.state = StagingState::Recording;
    }

    /// # Errors
    /// `AppendOutsideElement` unless an element is being recorded.
    pub fn append_attribute(&mut self, attribute: &Attribute<'_>) -> Result<(), SelectionError> {
        self.ensure_recording()?;
        let part = StagedPart::Attribute {
            name: self.store(attribute.name),
            operator: self.store(attribute.operator),
            value_content: self.store(attribute.value_content),
            value_outer: self.store(attribute.value_outer),
            name_location: attribute.name_location,
            operator_location: attribute.operator_location,
            value_location: attribute.value_location,
        };
        self.parts.push(part);
        self.attribute_count = self.attribute_count.saturating_add(1);
        Ok(())
    }

    /// # Errors
    /// `AppendOutsideElement` unless an element is being recorded.
    pub fn append_whitespace(&mut self, whitespace: &TextNode<'_>) -> Result<(), SelectionError> {
        self.ensure_recording()?;
        let part = StagedPart::Whitespace {
            content: self.store(whitespace.content),
            location: whitespace.location,
        };
        self.parts.push(part);
        Ok(())
    }

    /// Record the end of the start tag; the element is now ready for evaluation.
    ///
    /// # Errors
    /// `FinishOutsideElement` unless an element is being recorded.
    pub fn finish(&mut self, tag: &ElementTag<'_>) -> Result<(), SelectionError> {
        if self.state != StagingState::Recording {
            return Err(Invariant::FinishOutsideElement.into());
        }
        self.end = StagedTag {
            name: self.store(tag.name),
            minimized: tag.minimized,
            location: tag.location,
        };
        self.state = StagingState::Finished;
        Ok(())
    }

    /// Emit the staged events in their original order. Allowed once per element.
    ///
    /// # Errors
    /// `ReplayBeforeFinish` if the element is not finished or was already replayed,
    /// `Handler` if `sink` fails.
    pub fn replay_into<F>(&mut self, mut sink: F) -> Result<(), SelectionError>
    where
        F: FnMut(&MarkupEvent<'_>) -> anyhow::Result<()>,
    {
        if self.state != StagingState::Finished {
            return Err(Invariant::ReplayBeforeFinish.into());
        }
        self.state = StagingState::Idle;

        let start = self.tag(self.start);
        let end = self.tag(self.end);
        let (start_event, end_event) = match self.shape {
            ElementShape::Open => (
                MarkupEvent::OpenElementStart(start),
                MarkupEvent::OpenElementEnd(end),
            ),
            ElementShape::Standalone => (
                MarkupEvent::StandaloneElementStart(start),
                MarkupEvent::StandaloneElementEnd(end),
            ),
        };

        sink(&start_event).map_err(SelectionError::Handler)?;
        for part in &self.parts {
            let event = match *part {
                StagedPart::Attribute {
                    name,
                    operator,
                    value_content,
                    value_outer,
                    name_location,
                    operator_location,
                    value_location,
                } => MarkupEvent::Attribute(Attribute {
                    name: self.slice(name),
                    operator: self.slice(operator),
                    value_content: self.slice(value_content),
                    value_outer: self.slice(value_outer),
                    name_location,
                    operator_location,
                    value_location,
                }),
                StagedPart::Whitespace { content, location } => {
                    MarkupEvent::InnerWhiteSpace(TextNode {
                        content: self.slice(content),
                        location,
                    })
                }
            };
            sink(&event).map_err(SelectionError::Handler)?;
        }
        sink(&end_event).map_err(SelectionError::Handler)
    }

    /// True between `begin` and `finish`.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.state == StagingState::Recording
    }

    /// Shape of the element currently staged.
    #[inline]
    pub const fn shape(&self) -> ElementShape {
        self.shape
    }

    #[inline]
    fn ensure_recording(&self) -> Result<(), SelectionError> {
        if self.is_recording() {
            Ok(())
        } else {
            Err(Invariant::AppendOutsideElement.into())
        }
    }

    #[inline]
    fn store(&mut self, value: &str) -> Span {
        let start = self.text.len();
        self.text.push_str(value);
        Span {
            start,
            end: self.text.len(),
        }
    }

    #[inline]
    fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or_default()
    }

    #[inline]
    fn tag(&self, staged: StagedTag) -> ElementTag<'_> {
        ElementTag {
            name: self.slice(staged.name),
            minimized: staged.minimized,
            location: staged.location,
        }
    }
}

impl ElementAttributes for ElementStagingBuffer {
    #[inline]
    fn element_name(&self) -> &str {
        self.slice(self.start.name)
    }

    #[inline]
    fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    fn attribute_value(&self, name: &str, case_sensitive: bool) -> Option<&str> {
        self.parts.iter().find_map(|part| match *part {
            StagedPart::Attribute {
                name: staged_name,
                value_content,
                ..
            } => {
                let candidate = self.slice(staged_name);
                let same = if case_sensitive {
                    candidate == name
                } else {
                    candidate.eq_ignore_ascii_case(name)
                };
                same.then(|| self.slice(value_content))
            }
            StagedPart::Whitespace { .. } => None,
        })
    }
}
