#![allow(dead_code, reason = "Not every test binary uses every helper")]

use anyhow::{Result, bail};
use markup_selection::{
    Attribute, ElementTag, Location, MarkupEvent, MarkupHandler, TextNode,
};
use core::time::Duration;
use std::time::Instant;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a well-formed event stream the way a tokenizer would emit it.
pub struct Script {
    events: Vec<MarkupEvent<'static>>,
    col: usize,
}

impl Script {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            col: 1,
        }
    }

    /// Wrap the stream in document start and end events.
    pub fn document(mut self) -> Self {
        let started_at = Instant::now();
        self.events
            .insert(0, MarkupEvent::DocumentStart { started_at });
        self.events.push(MarkupEvent::DocumentEnd {
            ended_at: started_at,
            elapsed: Duration::ZERO,
        });
        self
    }

    pub fn open(self, name: &'static str) -> Self {
        self.open_with(name, &[])
    }

    pub fn open_with(mut self, name: &'static str, attributes: &[(&'static str, &'static str)]) -> Self {
        let tag = self.tag(name, false);
        self.events.push(MarkupEvent::OpenElementStart(tag));
        self.push_attributes(attributes);
        self.events.push(MarkupEvent::OpenElementEnd(tag));
        self
    }

    pub fn empty(self, name: &'static str) -> Self {
        self.empty_with(name, &[])
    }

    /// A minimized standalone element such as `<br/>`.
    pub fn empty_with(mut self, name: &'static str, attributes: &[(&'static str, &'static str)]) -> Self {
        let tag = self.tag(name, true);
        self.events.push(MarkupEvent::StandaloneElementStart(tag));
        self.push_attributes(attributes);
        self.events.push(MarkupEvent::StandaloneElementEnd(tag));
        self
    }

    pub fn close(mut self, name: &'static str) -> Self {
        let tag = self.tag(name, false);
        self.events.push(MarkupEvent::CloseElementStart(tag));
        self.events.push(MarkupEvent::CloseElementEnd(tag));
        self
    }

    pub fn auto_close(mut self, name: &'static str) -> Self {
        let tag = self.tag(name, false);
        self.events.push(MarkupEvent::AutoCloseElementStart(tag));
        self.events.push(MarkupEvent::AutoCloseElementEnd(tag));
        self
    }

    pub fn unmatched_close(mut self, name: &'static str) -> Self {
        let tag = self.tag(name, false);
        self.events.push(MarkupEvent::UnmatchedCloseElementStart(tag));
        self.events.push(MarkupEvent::UnmatchedCloseElementEnd(tag));
        self
    }

    pub fn text(mut self, content: &'static str) -> Self {
        let location = self.advance(content.len());
        self.events
            .push(MarkupEvent::Text(TextNode { content, location }));
        self
    }

    pub fn comment(mut self, content: &'static str) -> Self {
        let location = self.advance(content.len());
        self.events
            .push(MarkupEvent::Comment(TextNode { content, location }));
        self
    }

    pub fn events(&self) -> &[MarkupEvent<'static>] {
        &self.events
    }

    fn tag(&mut self, name: &'static str, minimized: bool) -> ElementTag<'static> {
        ElementTag {
            name,
            minimized,
            location: self.advance(name.len()),
        }
    }

    fn push_attributes(&mut self, attributes: &[(&'static str, &'static str)]) {
        for &(name, value) in attributes {
            let location = self.advance(1);
            self.events.push(MarkupEvent::InnerWhiteSpace(TextNode {
                content: " ",
                location,
            }));
            let value_outer: &'static str = Box::leak(format!("\"{value}\"").into_boxed_str());
            let name_location = self.advance(name.len());
            let operator_location = self.advance(1);
            let value_location = self.advance(value_outer.len());
            self.events.push(MarkupEvent::Attribute(Attribute {
                name,
                operator: "=",
                value_content: value,
                value_outer,
                name_location,
                operator_location,
                value_location,
            }));
        }
    }

    fn advance(&mut self, width: usize) -> Location {
        let location = Location::new(1, self.col);
        self.col += width;
        location
    }
}

/// Feed every event of `script` to `handler`.
pub fn run<H: MarkupHandler>(handler: &mut H, script: &Script) -> Result<()> {
    for event in script.events() {
        handler.handle_event(event)?;
    }
    Ok(())
}

/// Rebuilds markup text from the events it receives.
#[derive(Default)]
pub struct MarkupWriter {
    pub output: String,
    pub calls: usize,
    pub kinds: Vec<&'static str>,
}

impl MarkupHandler for MarkupWriter {
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> Result<()> {
        self.calls += 1;
        self.kinds.push(event.kind_name());
        match event {
            MarkupEvent::DocumentStart { .. }
            | MarkupEvent::DocumentEnd { .. }
            | MarkupEvent::AutoCloseElementStart(_)
            | MarkupEvent::AutoCloseElementEnd(_) => {}
            MarkupEvent::OpenElementStart(tag) | MarkupEvent::StandaloneElementStart(tag) => {
                self.output.push('<');
                self.output.push_str(tag.name);
            }
            MarkupEvent::OpenElementEnd(_) => self.output.push('>'),
            MarkupEvent::StandaloneElementEnd(tag) => {
                self.output.push_str(if tag.minimized { "/>" } else { ">" });
            }
            MarkupEvent::CloseElementStart(tag) | MarkupEvent::UnmatchedCloseElementStart(tag) => {
                self.output.push_str("</");
                self.output.push_str(tag.name);
            }
            MarkupEvent::CloseElementEnd(_) | MarkupEvent::UnmatchedCloseElementEnd(_) => {
                self.output.push('>');
            }
            MarkupEvent::Attribute(attribute) => {
                self.output.push_str(attribute.name);
                self.output.push_str(attribute.operator);
                self.output.push_str(attribute.value_outer);
            }
            MarkupEvent::InnerWhiteSpace(node) | MarkupEvent::Text(node) => {
                self.output.push_str(node.content);
            }
            MarkupEvent::Comment(node) => {
                self.output.push_str("<!--");
                self.output.push_str(node.content);
                self.output.push_str("-->");
            }
            MarkupEvent::CData(node) => {
                self.output.push_str("<![CDATA[");
                self.output.push_str(node.content);
                self.output.push_str("]]>");
            }
            MarkupEvent::XmlDeclaration(declaration) => self.output.push_str(declaration.text),
            MarkupEvent::DocType(doctype) => self.output.push_str(doctype.text),
            MarkupEvent::ProcessingInstruction(instruction) => {
                self.output.push_str(instruction.text);
            }
        }
        Ok(())
    }
}

/// Fails on the first event it receives.
pub struct FailingHandler;

impl MarkupHandler for FailingHandler {
    fn handle_event(&mut self, event: &MarkupEvent<'_>) -> Result<()> {
        bail!("refusing {} event", event.kind_name())
    }
}
