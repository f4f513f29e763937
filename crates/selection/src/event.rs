//! Markup events as produced by a streaming tokenizer.
//!
//! Payloads borrow from the producer's buffer and are only valid for the duration
//! of one `handle_event` call. Anything that must outlive the call is copied.

use core::time::Duration;
use markup_selector::LeafKind;
use std::time::Instant;

/// 1-based position of a token in the source document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl Location {
    #[inline]
    #[must_use]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Start or end of an element tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementTag<'src> {
    /// Element name exactly as written.
    pub name: &'src str,
    /// Written in minimized form (`<br/>`). Only meaningful for standalone tags.
    pub minimized: bool,
    pub location: Location,
}

/// One attribute inside a start tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute<'src> {
    pub name: &'src str,
    /// Operator text, usually `=`. Empty for value-less attributes.
    pub operator: &'src str,
    /// Value without surrounding quotes.
    pub value_content: &'src str,
    /// Value including its quotes, as written.
    pub value_outer: &'src str,
    pub name_location: Location,
    pub operator_location: Location,
    pub value_location: Location,
}

/// Text content, comments, CDATA sections and whitespace between attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextNode<'src> {
    pub content: &'src str,
    pub location: Location,
}

/// `<?xml ... ?>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XmlDeclaration<'src> {
    /// Full declaration text.
    pub text: &'src str,
    pub version: &'src str,
    pub encoding: Option<&'src str>,
    pub standalone: Option<&'src str>,
    pub location: Location,
}

/// `<!DOCTYPE ...>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocType<'src> {
    /// Full doctype text.
    pub text: &'src str,
    pub root_element_name: &'src str,
    pub public_id: Option<&'src str>,
    pub system_id: Option<&'src str>,
    pub location: Location,
}

/// `<?target content?>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingInstruction<'src> {
    /// Full instruction text.
    pub text: &'src str,
    pub target: &'src str,
    pub content: Option<&'src str>,
    pub location: Location,
}

/// Every event a markup tokenizer emits, in document order.
///
/// An element arrives as a start event, zero or more `Attribute`/`InnerWhiteSpace`
/// events, and an end event. Closing tags come in start/end pairs as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkupEvent<'src> {
    DocumentStart {
        started_at: Instant,
    },
    DocumentEnd {
        ended_at: Instant,
        elapsed: Duration,
    },
    XmlDeclaration(XmlDeclaration<'src>),
    DocType(DocType<'src>),
    CData(TextNode<'src>),
    Text(TextNode<'src>),
    Comment(TextNode<'src>),
    StandaloneElementStart(ElementTag<'src>),
    StandaloneElementEnd(ElementTag<'src>),
    OpenElementStart(ElementTag<'src>),
    OpenElementEnd(ElementTag<'src>),
    CloseElementStart(ElementTag<'src>),
    CloseElementEnd(ElementTag<'src>),
    /// Closing tag synthesized by the tokenizer for an element that was never closed.
    AutoCloseElementStart(ElementTag<'src>),
    AutoCloseElementEnd(ElementTag<'src>),
    /// Closing tag without a matching open element.
    UnmatchedCloseElementStart(ElementTag<'src>),
    UnmatchedCloseElementEnd(ElementTag<'src>),
    Attribute(Attribute<'src>),
    /// Whitespace between attributes of a start tag.
    InnerWhiteSpace(TextNode<'src>),
    ProcessingInstruction(ProcessingInstruction<'src>),
}

impl MarkupEvent<'_> {
    /// The leaf category a node test can select, if this is a leaf event.
    #[inline]
    pub const fn leaf_kind(&self) -> Option<LeafKind> {
        match self {
            Self::Text(_) => Some(LeafKind::Text),
            Self::Comment(_) => Some(LeafKind::Comment),
            Self::CData(_) => Some(LeafKind::CData),
            Self::DocType(_) => Some(LeafKind::DocType),
            Self::XmlDeclaration(_) => Some(LeafKind::XmlDeclaration),
            Self::ProcessingInstruction(_) => Some(LeafKind::ProcessingInstruction),
            _ => None,
        }
    }

    /// Short name used in log output.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::DocumentStart { .. } => "document-start",
            Self::DocumentEnd { .. } => "document-end",
            Self::XmlDeclaration(_) => "xml-declaration",
            Self::DocType(_) => "doctype",
            Self::CData(_) => "cdata",
            Self::Text(_) => "text",
            Self::Comment(_) => "comment",
            Self::StandaloneElementStart(_) => "standalone-start",
            Self::StandaloneElementEnd(_) => "standalone-end",
            Self::OpenElementStart(_) => "open-start",
            Self::OpenElementEnd(_) => "open-end",
            Self::CloseElementStart(_) => "close-start",
            Self::CloseElementEnd(_) => "close-end",
            Self::AutoCloseElementStart(_) => "auto-close-start",
            Self::AutoCloseElementEnd(_) => "auto-close-end",
            Self::UnmatchedCloseElementStart(_) => "unmatched-close-start",
            Self::UnmatchedCloseElementEnd(_) => "unmatched-close-end",
            Self::Attribute(_) => "attribute",
            Self::InnerWhiteSpace(_) => "inner-whitespace",
            Self::ProcessingInstruction(_) => "processing-instruction",
        }
    }
}
