//! Tests for the strategy cascade against the scripted driver.

use crate::resolver::{resolve, Resolution};
use crate::selector::{HeuristicScan, StrategyList};
use crate::simulation::{ScriptedControl, ScriptedDriver};
use std::time::Duration;

fn fast(list: StrategyList) -> StrategyList {
    list.with_strategy_timeout(Duration::from_millis(30))
}

const BUDGET: Duration = Duration::from_secs(1);

#[tokio::test]
async fn exactly_the_satisfiable_strategy_wins() {
    // Three-strategy cascade where only the middle one can match.
    let driver = ScriptedDriver::single_screen(vec![ScriptedControl::new("input", "the field")
        .answering(&["attr:input[name='B']"])]);
    let list = fast(StrategyList::parse(
        "the field",
        &[
            "attr:input[name='A']",
            "attr:input[name='B']",
            "attr:input[name='C']",
        ],
    ));

    let control = resolve(&driver, &list, BUDGET)
        .await
        .unwrap()
        .found()
        .expect("should resolve");
    assert_eq!(control.strategy_index, 1);
}

#[tokio::test]
async fn hidden_and_disabled_matches_are_skipped() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("input", "ghost")
            .answering(&["attr:input[name='X']"])
            .hidden(),
        ScriptedControl::new("input", "dead")
            .answering(&["attr:input[name='X']"])
            .disabled(),
        ScriptedControl::new("input", "live").answering(&["attr:input[name='X']"]),
    ]);
    let list = fast(StrategyList::parse("field", &["attr:input[name='X']"]));

    let control = resolve(&driver, &list, BUDGET)
        .await
        .unwrap()
        .found()
        .expect("should resolve the interactable match");
    assert_eq!(control.facts.name.as_deref(), Some("live"));
}

#[tokio::test]
async fn exhausted_cascade_is_not_found_not_an_error() {
    let driver = ScriptedDriver::single_screen(vec![ScriptedControl::new("button", "unrelated")]);
    let list = fast(StrategyList::parse("field", &["attr:input[name='A']"]));

    assert!(matches!(
        resolve(&driver, &list, BUDGET).await.unwrap(),
        Resolution::NotFound
    ));
}

#[tokio::test]
async fn fallback_scan_matches_first_in_document_order() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("button", "unrelated"),
        ScriptedControl::new("input", "first").with_label("Your email address"),
        ScriptedControl::new("input", "second").with_label("Backup email"),
    ]);
    let list = fast(StrategyList::parse("email", &["attr:input[name='nope']"])).with_fallback(
        HeuristicScan::new(["input"], ["email"]),
    );

    let control = resolve(&driver, &list, BUDGET)
        .await
        .unwrap()
        .found()
        .expect("fallback should match");
    assert_eq!(control.facts.name.as_deref(), Some("first"));
    // Fallback is reported as the index one past the native strategies.
    assert_eq!(control.strategy_index, 1);
}

#[tokio::test]
async fn fallback_respects_role_filter() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("div", "banner").with_text("enter your email"),
        ScriptedControl::new("input", "target").with_placeholder("email or phone"),
    ]);
    let list = fast(StrategyList::parse("email", &["attr:input[name='nope']"])).with_fallback(
        HeuristicScan::new(["input"], ["email"]),
    );

    let control = resolve(&driver, &list, BUDGET)
        .await
        .unwrap()
        .found()
        .expect("fallback should skip the div");
    assert_eq!(control.facts.name.as_deref(), Some("target"));
}

#[tokio::test]
async fn fallback_matches_across_descriptive_attributes() {
    // Keyword can live in placeholder or id, not just the label.
    let driver = ScriptedDriver::single_screen(vec![ScriptedControl::new("input", "field")
        .with_id("floatingLabelEmail5")]);
    let list = fast(StrategyList::parse("email", &["attr:input[name='nope']"])).with_fallback(
        HeuristicScan::new(["input"], ["email"]),
    );

    assert!(resolve(&driver, &list, BUDGET)
        .await
        .unwrap()
        .found()
        .is_some());
}
