//! Tests for write-and-verify and choice selection.

use crate::driver::{UiDriver, UiHandle};
use crate::pipeline::choice_option_strategies;
use crate::simulation::{ScriptedControl, ScriptedDriver};
use crate::writer::{select_choice, write_and_verify, FieldRole, WriteOutcome};
use std::time::Duration;

const BUDGET: Duration = Duration::from_secs(1);

/// The scripted driver assigns sequential handle ids starting at 1.
fn first_handle() -> UiHandle {
    UiHandle(1)
}

#[tokio::test]
async fn clean_write_confirms_on_first_attempt() {
    let driver =
        ScriptedDriver::single_screen(vec![ScriptedControl::new("input", "field")]);
    let outcome = write_and_verify(&driver, &first_handle(), "hello", FieldRole::Text)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Confirmed);
    assert_eq!(driver.read_value(&first_handle()).await.unwrap(), "hello");
}

#[tokio::test]
async fn write_succeeds_on_the_last_budgeted_attempt() {
    // Incorrect echo for the first (budget - 1) attempts, correct on the
    // last: one keystroke attempt plus two direct-assignment retries.
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("input", "field").glitching_writes(2)
    ]);
    let outcome = write_and_verify(&driver, &first_handle(), "value", FieldRole::Text)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Confirmed);
}

#[tokio::test]
async fn write_reports_mismatch_past_the_retry_budget() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("input", "field").glitching_writes(3)
    ]);
    let outcome = write_and_verify(&driver, &first_handle(), "value", FieldRole::Text)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Mismatch);
}

#[tokio::test]
async fn secret_fields_verify_by_length_only() {
    // A password control echoes mask characters; exact comparison would
    // never match, length comparison does.
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("input", "password").masked_readback()
    ]);
    let outcome = write_and_verify(&driver, &first_handle(), "s3cret!pw", FieldRole::Secret)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Confirmed);
}

#[tokio::test]
async fn text_fields_require_exact_equality() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("input", "field").masked_readback()
    ]);
    let outcome = write_and_verify(&driver, &first_handle(), "plain", FieldRole::Text)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Mismatch);
}

#[tokio::test]
async fn backspace_clearing_covers_controls_without_native_clear() {
    let driver = ScriptedDriver::single_screen(vec![ScriptedControl::new("input", "year")
        .without_native_clear()
        .with_value("1987")]);
    let outcome = write_and_verify(&driver, &first_handle(), "1993", FieldRole::Text)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Confirmed);
    assert_eq!(driver.read_value(&first_handle()).await.unwrap(), "1993");
}

#[tokio::test]
async fn choice_selection_opens_resolves_and_verifies() {
    let driver = ScriptedDriver::single_screen(vec![
        ScriptedControl::new("button", "Birth month"),
        ScriptedControl::new("option", "March").sets_value_of("Birth month", "March"),
    ]);
    let outcome = select_choice(
        &driver,
        &first_handle(),
        &choice_option_strategies("March"),
        "March",
        BUDGET,
    )
    .await
    .unwrap();
    assert_eq!(outcome, WriteOutcome::Confirmed);
}

#[tokio::test]
async fn missing_choice_option_is_a_mismatch() {
    let driver =
        ScriptedDriver::single_screen(vec![ScriptedControl::new("button", "Birth month")]);
    let mut option_list = choice_option_strategies("March");
    option_list.strategy_timeout = Duration::from_millis(30);
    let outcome = select_choice(&driver, &first_handle(), &option_list, "March", BUDGET)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Mismatch);
}
