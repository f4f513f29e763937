#![allow(
    clippy::unwrap_used,
    reason = "Assertions in tests are expected"
)]

use markup_selection::SelectorFilter;
use markup_selector::{ElementAttributes, LeafKind, SelectorCompiler};

struct Element(&'static str);

impl ElementAttributes for Element {
    fn element_name(&self) -> &str {
        self.0
    }

    fn attribute_count(&self) -> usize {
        0
    }

    fn attribute_value(&self, _name: &str, _case_sensitive: bool) -> Option<&str> {
        None
    }
}

/// Drives a filter with a tiny tree walker that mirrors dispatcher bookkeeping.
struct Walk {
    filter: SelectorFilter,
    level: usize,
    groups: Vec<usize>,
    last_group: usize,
}

impl Walk {
    fn new(selector: &str) -> Self {
        let compiler = SelectorCompiler::default();
        Self {
            filter: SelectorFilter::new(&compiler.compile(selector).unwrap()),
            level: 0,
            groups: vec![0],
            last_group: 0,
        }
    }

    fn group(&self) -> usize {
        self.groups[self.level]
    }

    fn open(&mut self, name: &'static str) -> bool {
        let matched = self
            .filter
            .match_open_element(self.level, self.group(), &Element(name));
        self.level += 1;
        self.last_group += 1;
        self.groups.truncate(self.level);
        self.groups.push(self.last_group);
        matched
    }

    fn empty(&mut self, name: &'static str) -> bool {
        self.filter
            .match_standalone_element(self.level, self.group(), &Element(name))
    }

    fn text(&mut self) -> bool {
        self.filter
            .match_leaf(LeafKind::Text, self.level, self.group())
    }

    fn close(&mut self) {
        self.level -= 1;
        self.filter.remove_matches_for_level(self.level);
    }
}

#[test]
fn exact_child_requires_direct_parent() {
    let mut walk = Walk::new("/a/b");
    assert!(!walk.open("a"));
    assert!(walk.empty("b"));
    walk.close();

    let mut nested = Walk::new("/a/b");
    nested.open("a");
    nested.open("c");
    assert!(!nested.empty("b"));
}

#[test]
fn any_descendant_skips_intermediate_levels() {
    let mut walk = Walk::new("/a//b");
    walk.open("a");
    walk.open("c");
    assert!(walk.empty("b"));
    walk.close();
    assert!(walk.empty("b"));
}

#[test]
fn intermediate_segments_never_select() {
    let mut walk = Walk::new("//div/p");
    assert!(!walk.open("div"));
    assert!(walk.open("p"));
}

#[test]
fn standalone_elements_only_match_as_the_last_segment() {
    let mut walk = Walk::new("//a/b");
    walk.open("r");
    assert!(!walk.empty("a"));
    assert!(!walk.empty("b"));
    assert!(!walk.text());
    assert!(!walk.open("a"));
    assert!(walk.empty("b"));
    walk.close();
    assert!(!walk.empty("b"));
}

#[test]
fn positions_are_counted_per_parent() {
    let mut walk = Walk::new("//li[2]");
    let mut matches = Vec::new();
    for _ in 0..2 {
        walk.open("ul");
        matches.push(walk.empty("li"));
        matches.push(walk.empty("li"));
        walk.close();
    }
    assert_eq!(matches, vec![false, true, false, true]);
}

#[test]
fn closing_a_parent_rearms_its_children() {
    let mut walk = Walk::new("/a/b[1]");
    walk.open("a");
    let first = [walk.empty("b"), walk.empty("b")];
    walk.close();
    walk.open("a");
    let second = walk.empty("b");
    assert_eq!(first, [true, false]);
    assert!(second);
}

#[test]
fn leaf_tests_follow_their_parent() {
    let mut walk = Walk::new("//p/text()");
    assert!(!walk.text());
    walk.open("p");
    assert!(walk.text());
    walk.open("b");
    assert!(!walk.text());
    walk.close();
    assert!(walk.text());
    walk.close();
    assert!(!walk.text());
}

#[test]
fn disjunction_tracks_both_paths() {
    let mut walk = Walk::new("//a/b | //c/d");
    walk.open("a");
    assert!(walk.empty("b"));
    assert!(!walk.empty("d"));
    walk.close();
    walk.open("c");
    assert!(walk.empty("d"));
    assert!(!walk.empty("b"));
}

#[test]
fn closed_subtrees_do_not_leak_matches() {
    let mut walk = Walk::new("//section/h1");
    walk.open("section");
    walk.close();
    walk.open("div");
    assert!(!walk.open("h1"));
}

#[test]
fn deep_documents_grow_level_state() {
    let mut walk = Walk::new("//x//leaf");
    for _ in 0..40 {
        walk.open("x");
    }
    assert!(walk.empty("leaf"));
    for _ in 0..40 {
        walk.close();
    }
    assert!(!walk.empty("leaf"));
}
