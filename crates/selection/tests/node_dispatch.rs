#![allow(
    clippy::unwrap_used,
    reason = "Assertions in tests are expected"
)]

mod common;

use common::{FailingHandler, MarkupWriter, Script, init_logs, run};
use markup_selection::{
    ElementTag, ForwardNonSelected, Invariant, Location, MarkSelected, MarkupEvent,
    NodeSelectionDispatcher, SelectionError, TextNode,
};
use core::mem;
use markup_selector::SelectorCompiler;

fn include(selectors: &[&str], script: &Script) -> MarkupWriter {
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::including(&compiler, selectors, MarkupWriter::default()).unwrap();
    run(&mut dispatcher, script).unwrap();
    dispatcher.into_downstream()
}

fn mark(selectors: &[&str], script: &Script) -> String {
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::marking(&compiler, selectors, "data-sel", MarkupWriter::default())
            .unwrap();
    run(&mut dispatcher, script).unwrap();
    dispatcher.into_downstream().output
}

fn two_lists() -> Script {
    Script::new()
        .open("ul")
        .empty("li")
        .empty("li")
        .close("ul")
        .open("ul")
        .empty("li")
        .empty("li")
        .close("ul")
}

#[test]
fn second_item_of_each_list() {
    init_logs();
    let writer = include(&["//li[2]"], &two_lists());
    assert_eq!(writer.output, "<li/><li/>");
    assert_eq!(writer.kinds.iter().filter(|kind| **kind == "standalone-start").count(), 2);
}

#[test]
fn exact_child_and_any_descendant() {
    init_logs();
    let direct = Script::new().open("a").empty("b").close("a");
    let nested = Script::new().open("a").open("c").empty("b").close("c").close("a");
    assert_eq!(include(&["/a/b"], &direct).output, "<b/>");
    assert_eq!(include(&["/a/b"], &nested).output, "");
    assert_eq!(include(&["/a//b"], &direct).output, "<b/>");
    assert_eq!(include(&["/a//b"], &nested).output, "<b/>");
}

#[test]
fn standalone_parent_selects_nothing_below_it() {
    init_logs();
    let script = Script::new().open("r").empty("a").empty("b").close("r");
    assert_eq!(include(&["//a/b"], &script).output, "");
    assert_eq!(include(&["//a/b"], &script).calls, 0);
    let nested = Script::new().open("r").open("a").empty("b").close("a").close("r");
    assert_eq!(include(&["//a/b"], &nested).output, "<b/>");
}

#[test]
fn positional_match_rearms_for_the_next_parent() {
    init_logs();
    let script = Script::new()
        .open_with("a", &[("n", "1")])
        .empty_with("b", &[("n", "1")])
        .empty_with("b", &[("n", "2")])
        .close("a")
        .open_with("a", &[("n", "2")])
        .empty_with("b", &[("n", "3")])
        .close("a");
    assert_eq!(
        include(&["/a/b[1]"], &script).output,
        "<b n=\"1\"/><b n=\"3\"/>"
    );
}

#[test]
fn late_attribute_is_matched_and_replayed_verbatim() {
    init_logs();
    let script = Script::new()
        .open_with("a", &[("href", "/"), ("title", "t"), ("id", "x")])
        .text("link")
        .close("a");
    assert_eq!(
        include(&["//a[@id='x']"], &script).output,
        "<a href=\"/\" title=\"t\" id=\"x\"></a>"
    );
}

#[test]
fn class_attribute_is_tokenized() {
    init_logs();
    let script = Script::new()
        .empty_with("div", &[("class", "row box active")])
        .empty_with("div", &[("class", "boxes")]);
    assert_eq!(
        include(&["//div[@class='box']"], &script).output,
        "<div class=\"row box active\"/>"
    );
    assert_eq!(include(&["//div[@class^=bo]"], &script).output, "<div class=\"boxes\"/>");
}

#[test]
fn closing_tags_follow_their_open_tags() {
    init_logs();
    let script = Script::new()
        .open("b")
        .text("x")
        .open("b")
        .text("y")
        .close("b")
        .close("b")
        .open("i")
        .close("i");
    assert_eq!(include(&["//b"], &script).output, "<b><b></b></b>");
}

#[test]
fn text_nodes_are_selected_on_their_own() {
    init_logs();
    let script = Script::new()
        .open("p")
        .text("hi ")
        .open("b")
        .text("bold")
        .close("b")
        .text("there")
        .close("p")
        .comment("note");
    assert_eq!(include(&["//p/text()"], &script).output, "hi there");
    assert_eq!(include(&["//comment()"], &script).output, "<!--note-->");
}

#[test]
fn marking_tags_selected_elements() {
    init_logs();
    let script = Script::new()
        .open("div")
        .open_with("p", &[("class", "x")])
        .text("hi")
        .close("p")
        .empty("p")
        .close("div");
    assert_eq!(
        mark(&["//p", "//div/p", "//span"], &script),
        "<div><p class=\"x\" data-sel=\"//p //div/p\">hi</p><p data-sel=\"//p //div/p\"/></div>"
    );
}

#[test]
fn marking_escapes_quotes_in_selector_text() {
    init_logs();
    let script = Script::new().empty_with("a", &[("rel", "x")]);
    assert_eq!(
        mark(&["//a[@rel=\"x\"]"], &script),
        "<a rel=\"x\" data-sel=\"//a[@rel=&quot;x&quot;]\"/>"
    );
}

#[test]
fn excluding_drops_selected_events_only() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let script = Script::new()
        .open("body")
        .open("script")
        .text("alert()")
        .close("script")
        .open("p")
        .text("kept")
        .close("p")
        .close("body");

    let mut tags_only =
        NodeSelectionDispatcher::excluding(&compiler, ["//script"], MarkupWriter::default())
            .unwrap();
    run(&mut tags_only, &script).unwrap();
    assert_eq!(
        tags_only.into_downstream().output,
        "<body>alert()<p>kept</p></body>"
    );

    let mut with_content = NodeSelectionDispatcher::excluding(
        &compiler,
        ["//script", "//script/text()"],
        MarkupWriter::default(),
    )
    .unwrap();
    run(&mut with_content, &script).unwrap();
    assert_eq!(
        with_content.into_downstream().output,
        "<body><p>kept</p></body>"
    );
}

#[test]
fn document_framing_follows_the_non_selected_handler() {
    init_logs();
    let script = Script::new().open("p").close("p").document();
    let included = include(&["//p"], &script);
    assert_eq!(included.kinds.first(), Some(&"open-start"));
    assert!(!included.kinds.contains(&"document-end"));

    let compiler = SelectorCompiler::default();
    let mut marking =
        NodeSelectionDispatcher::marking(&compiler, ["//p"], "data-sel", MarkupWriter::default())
            .unwrap();
    run(&mut marking, &script).unwrap();
    let writer = marking.into_downstream();
    assert_eq!(writer.kinds.first(), Some(&"document-start"));
    assert_eq!(writer.kinds.last(), Some(&"document-end"));
}

#[test]
fn auto_and_unmatched_closes() {
    init_logs();
    let script = Script::new()
        .open("ul")
        .open("li")
        .text("a")
        .unmatched_close("span")
        .auto_close("li")
        .close("ul");
    let writer = include(&["//li"], &script);
    assert_eq!(writer.output, "<li>");
    assert_eq!(
        writer.kinds,
        vec!["open-start", "open-end", "auto-close-start", "auto-close-end"]
    );
    assert_eq!(
        mark(&["//li"], &script),
        "<ul><li data-sel=\"//li\">a</span></ul>"
    );
}

#[test]
fn recompiled_selectors_decide_identically() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let script = two_lists().open("ul").empty("li").close("ul");
    let outputs: Vec<_> = (0..2)
        .map(|_| {
            let mut dispatcher = NodeSelectionDispatcher::including(
                &compiler,
                ["//li[odd()]"],
                MarkupWriter::default(),
            )
            .unwrap();
            run(&mut dispatcher, &script).unwrap();
            dispatcher.into_downstream().kinds
        })
        .collect();
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(compiler.cached_len(), 1);
}

#[test]
fn disjunctions_select_either_path() {
    init_logs();
    let script = Script::new()
        .open("nav")
        .empty("a")
        .close("nav")
        .open("footer")
        .empty("a")
        .close("footer")
        .open("main")
        .empty("a")
        .close("main");
    assert_eq!(
        include(&["//nav/a or //footer/a"], &script).output,
        "<a/><a/>"
    );
}

#[test]
fn dispatchers_compose() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let marker = MarkSelected::new("data-id");
    assert_eq!(marker.attribute_name(), "data-id");
    let inner = NodeSelectionDispatcher::new(
        &compiler,
        ["//div[@id]"],
        MarkupWriter::default(),
        marker,
        ForwardNonSelected,
    )
    .unwrap();
    let mut outer = NodeSelectionDispatcher::including(&compiler, ["//div"], inner).unwrap();
    let script = Script::new()
        .open("body")
        .open_with("div", &[("id", "a")])
        .close("div")
        .empty("div")
        .close("body");
    run(&mut outer, &script).unwrap();
    assert_eq!(
        outer.into_downstream().into_downstream().output,
        "<div id=\"a\" data-id=\"//div[@id]\"></div><div/>"
    );
}

#[test]
fn construction_errors() {
    let compiler = SelectorCompiler::default();
    let empty: [&str; 0] = [];
    assert!(matches!(
        NodeSelectionDispatcher::including(&compiler, empty, MarkupWriter::default()),
        Err(SelectionError::NoSelectors)
    ));
    assert!(matches!(
        NodeSelectionDispatcher::including(&compiler, ["//a", "///b"], MarkupWriter::default()),
        Err(SelectionError::Syntax(_))
    ));
    assert!(matches!(
        NodeSelectionDispatcher::including(&compiler, ["//a | /b"], MarkupWriter::default()),
        Err(SelectionError::Syntax(_))
    ));
}

#[test]
fn ordering_violations_poison_the_dispatcher() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::including(&compiler, ["//p"], MarkupWriter::default()).unwrap();
    let stray = MarkupEvent::InnerWhiteSpace(TextNode {
        content: " ",
        location: Location::new(1, 1),
    });
    assert!(matches!(
        dispatcher.dispatch(&stray),
        Err(SelectionError::InvariantViolation(Invariant::AppendOutsideElement))
    ));
    let text = MarkupEvent::Text(TextNode {
        content: "x",
        location: Location::new(1, 2),
    });
    assert!(matches!(dispatcher.dispatch(&text), Err(SelectionError::Poisoned)));
}

#[test]
fn closing_below_the_root_is_a_violation() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::including(&compiler, ["//p"], MarkupWriter::default()).unwrap();
    let close = MarkupEvent::CloseElementStart(ElementTag {
        name: "p",
        minimized: false,
        location: Location::new(1, 1),
    });
    assert!(matches!(
        dispatcher.dispatch(&close),
        Err(SelectionError::InvariantViolation(Invariant::LevelUnderflow))
    ));
    assert_eq!(dispatcher.level(), 0);

    let error = run(&mut dispatcher, &Script::new().text("x")).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SelectionError>(),
        Some(SelectionError::Poisoned)
    ));
}

#[test]
fn handler_failures_are_reported_without_poisoning() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::excluding(&compiler, ["//p"], FailingHandler).unwrap();
    let script = Script::new().text("a").text("b");
    for event in script.events() {
        let error = dispatcher.dispatch(event).unwrap_err();
        assert!(matches!(error, SelectionError::Handler(_)));
        assert_eq!(error.to_string(), "refusing text event");
    }
}

#[test]
fn downstream_can_be_drained_between_documents() {
    init_logs();
    let compiler = SelectorCompiler::default();
    let mut dispatcher =
        NodeSelectionDispatcher::including(&compiler, ["//p"], MarkupWriter::default()).unwrap();
    let script = Script::new().open("p").text("x").close("p").document();
    run(&mut dispatcher, &script).unwrap();
    assert_eq!(mem::take(&mut dispatcher.downstream_mut().output), "<p></p>");
    run(&mut dispatcher, &script).unwrap();
    assert_eq!(dispatcher.downstream().output, "<p></p>");
    assert_eq!(dispatcher.level(), 0);
}
