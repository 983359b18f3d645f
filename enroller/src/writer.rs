use crate::driver::{Key, UiDriver, UiHandle};
use crate::errors::AutomationError;
use crate::resolver::{self, Resolution};
use crate::selector::StrategyList;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Additional attempts after the first keystroke write fails verification.
pub const WRITE_RETRY_BUDGET: usize = 2;

/// Backspaces sent beyond the current value length during synthetic
/// clearing, to cover controls that pad or reformat their content.
const CLEAR_SLACK: usize = 4;

/// Semantic role of a field, controlling how a write is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    /// Verified by exact read-back equality.
    Text,
    /// Verified by length only; the plaintext never reaches logs.
    Secret,
    /// A dropdown/combobox choice, verified by read-back containment.
    Choice,
}

/// Explicit write outcome; a mismatch after the retry budget is an ordinary
/// result the stage policy turns into a failure.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Confirmed,
    Mismatch,
}

fn masked(value: &str) -> String {
    "*".repeat(value.chars().count())
}

fn display_value(value: &str, role: FieldRole) -> String {
    match role {
        FieldRole::Secret => masked(value),
        _ => value.to_string(),
    }
}

fn verified(current: &str, expected: &str, role: FieldRole) -> bool {
    match role {
        FieldRole::Secret => current.chars().count() == expected.chars().count(),
        FieldRole::Choice => current.to_lowercase().contains(&expected.to_lowercase()),
        FieldRole::Text => current == expected,
    }
}

/// Write `value` into a resolved control and confirm it landed.
///
/// First attempt: focus, native clear (synthetic backspace clearing when the
/// control rejects it), keystroke write, read-back. Each retry switches to
/// the alternate method: direct value assignment plus synthetic
/// input/change/blur notification. Secret roles compare length only.
#[instrument(level = "debug", skip(driver, handle, value))]
pub async fn write_and_verify(
    driver: &dyn UiDriver,
    handle: &UiHandle,
    value: &str,
    role: FieldRole,
) -> Result<WriteOutcome, AutomationError> {
    driver.focus(handle).await?;
    clear_control(driver, handle).await?;
    driver.type_text(handle, value).await?;

    let mut current = driver.read_value(handle).await?;
    if verified(&current, value, role) {
        debug!(value = %display_value(value, role), "write confirmed");
        return Ok(WriteOutcome::Confirmed);
    }

    for attempt in 1..=WRITE_RETRY_BUDGET {
        warn!(
            attempt,
            expected = %display_value(value, role),
            got = %display_value(&current, role),
            "write verification failed, retrying with direct assignment"
        );
        driver.set_value(handle, value).await?;
        current = driver.read_value(handle).await?;
        if verified(&current, value, role) {
            debug!(attempt, "write confirmed on retry");
            return Ok(WriteOutcome::Confirmed);
        }
    }

    warn!(
        expected = %display_value(value, role),
        got = %display_value(&current, role),
        "write retries exhausted"
    );
    Ok(WriteOutcome::Mismatch)
}

/// Native clear with synthetic backspace fallback.
async fn clear_control(driver: &dyn UiDriver, handle: &UiHandle) -> Result<(), AutomationError> {
    match driver.clear(handle).await {
        Ok(()) => Ok(()),
        Err(AutomationError::UnsupportedOperation(_)) => {
            let existing = driver.read_value(handle).await?;
            let presses = existing.chars().count() + CLEAR_SLACK;
            debug!(presses, "native clear unsupported, backspace clearing");
            for _ in 0..presses {
                driver.press_key(Key::Backspace).await?;
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Select an option from a dropdown-style control: open it, resolve the
/// option by visible text through its own strategy cascade, activate it,
/// and confirm via read-back containment.
#[instrument(level = "debug", skip(driver, control), fields(option = %option_list.target))]
pub async fn select_choice(
    driver: &dyn UiDriver,
    control: &UiHandle,
    option_list: &StrategyList,
    expected: &str,
    budget: Duration,
) -> Result<WriteOutcome, AutomationError> {
    driver.click(control).await?;

    match resolver::resolve(driver, option_list, budget).await? {
        Resolution::Found(option) => {
            driver.click(&option.handle).await?;
        }
        Resolution::NotFound => {
            warn!(option = %option_list.target, "choice option not found");
            return Ok(WriteOutcome::Mismatch);
        }
    }

    let current = driver.read_value(control).await?;
    if verified(&current, expected, FieldRole::Choice) {
        debug!(%expected, "choice confirmed");
        Ok(WriteOutcome::Confirmed)
    } else {
        warn!(%expected, %current, "choice read-back mismatch");
        Ok(WriteOutcome::Mismatch)
    }
}
