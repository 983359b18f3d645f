//! Tests for strategy shorthand parsing.

use crate::selector::{Strategy, StrategyList};

#[test]
fn attr_prefix_parses_to_attribute_query() {
    assert_eq!(
        Strategy::from("attr:input[type='email']"),
        Strategy::Attr("input[type='email']".to_string())
    );
}

#[test]
fn bare_bracket_query_reads_as_attribute_query() {
    assert_eq!(
        Strategy::from("iframe[src*='hsprotect.net']"),
        Strategy::Attr("iframe[src*='hsprotect.net']".to_string())
    );
}

#[test]
fn role_text_is_the_precise_format() {
    assert_eq!(
        Strategy::from("role:button|text:Next"),
        Strategy::RoleText {
            role: "button".to_string(),
            text: "Next".to_string(),
        }
    );
}

#[test]
fn role_without_text_matches_any_of_that_role() {
    assert_eq!(
        Strategy::from("role:option"),
        Strategy::RoleText {
            role: "option".to_string(),
            text: String::new(),
        }
    );
}

#[test]
fn class_prefix_and_path_parse_to_class_or_path() {
    assert_eq!(
        Strategy::from("class:android.widget.Button"),
        Strategy::ClassOrPath("android.widget.Button".to_string())
    );
    assert_eq!(
        Strategy::from("//android.widget.Button[contains(@text,'Press')]"),
        Strategy::ClassOrPath("//android.widget.Button[contains(@text,'Press')]".to_string())
    );
}

#[test]
fn unknown_format_is_invalid_with_reason() {
    match Strategy::from("whatever") {
        Strategy::Invalid(reason) => assert!(reason.contains("whatever")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn parse_builds_ordered_list() {
    let list = StrategyList::parse(
        "email alias",
        &["attr:input[type='email']", "role:input|text:email"],
    );
    assert_eq!(list.target, "email alias");
    assert_eq!(list.strategies.len(), 2);
    assert!(matches!(list.strategies[0], Strategy::Attr(_)));
    assert!(matches!(list.strategies[1], Strategy::RoleText { .. }));
}
