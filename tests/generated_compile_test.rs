//! Builds real generator output against `mocksmith::runtime` with warnings
//! denied, then runs it.

mod common;

use common::Fixture;
use std::fs;

const LIBRARY: &str = r#"
pub trait Inbox {
    fn deliver(&self, to: &str, body: String) -> Result<u64, String>;
    fn latest(&self) -> Option<String>;
    fn label(&self) -> String {
        String::from("default")
    }
    fn widen(&self, mut by: u32) -> u32 {
        by += 1;
        by
    }
    fn clear(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub count: u32,
}

impl Tally {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    pub fn bump(&mut self, by: u32) -> u32 {
        self.count += by;
        self.count
    }
}
"#;

const EXERCISE: &str = r#"
use mocks::{MockInbox, MockTally};
use mocksmith::runtime::{Constraint, Matcher};

fn main() {
    let inbox = MockInbox::new();
    inbox.mocksmith().given(MockInbox::SEL_DELIVER).will_return(7u64);
    inbox.mocksmith().given(MockInbox::SEL_LATEST).will_return(String::from("hi"));
    inbox.mocksmith().given(MockInbox::SEL_LABEL).will_call_through();
    inbox.mocksmith().given(MockInbox::SEL_WIDEN).will_call_through();

    assert_eq!(inbox.deliver("ann", String::from("body")), Ok(7));
    assert_eq!(inbox.latest(), Some(String::from("hi")));
    assert_eq!(inbox.label(), "default");
    assert_eq!(inbox.widen(4), 5);
    inbox.clear();
    inbox
        .mocksmith()
        .verify(MockInbox::SEL_CLEAR, Matcher::no_args(), Constraint::once())
        .assert();

    let mut tally = MockTally::from_new();
    tally.mocksmith().given(MockTally::SEL_BUMP).will_call_through();
    assert_eq!(tally.bump(2), 2);
    assert_eq!(tally.bump(3), 5);
    assert_eq!(tally.real().with(|real| real.count), Some(5));
}
"#;

#[test]
fn test_generated_mocks_build_without_warnings() {
    let fixture = Fixture::new(&[("lib.rs", LIBRARY)]);
    let report = fixture.generate();
    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    assert_eq!(report.units.len(), 2);

    // The fixture becomes a binary: library items at the crate root, the
    // generated directory mounted as `mocks`.
    let program = format!(
        "#![deny(warnings)]\n#![allow(dead_code)]\n{}\n#[path = {:?}]\nmod mocks;\n{}",
        LIBRARY,
        fixture.out().join("mod.rs"),
        EXERCISE
    );
    let check = fixture.dir.path().join("generated_mocks.rs");
    fs::write(&check, program).unwrap();

    let cases = trybuild::TestCases::new();
    cases.pass(&check);
    drop(cases);
}

#[test]
fn test_generated_source_is_formatted() {
    let fixture = Fixture::new(&[("lib.rs", LIBRARY)]);
    fixture.generate();
    let mock = fixture.generated("mock_inbox.rs");

    assert!(mock.contains("impl crate::Inbox for MockInbox {\n"));
    assert!(mock.contains("    fn label(&self) -> String {\n"));
    assert!(!mock.contains(" :: "));
    assert!(!mock.contains("{ {"));
    assert!(mock.lines().all(|line| line.len() <= 120), "{}", mock);
}
