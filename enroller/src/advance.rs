use crate::driver::{Key, UiDriver};
use crate::errors::AutomationError;
use crate::resolver::{self, Resolution};
use crate::selector::{button_roles, HeuristicScan, StrategyList, PROCEED_KEYWORDS};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Explicit advance outcome; `NotFound` means both the resolver cascade and
/// the keyboard fallback failed to move the flow forward.
#[derive(Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced,
    NotFound,
}

/// Resolves and activates the proceed control common to every stage.
#[derive(Debug, Clone)]
pub struct Advancer {
    strategies: StrategyList,
    settle_timeout: Duration,
}

/// Proceed-control cascade observed across the target's revisions: submit
/// controls first, then localized text heuristics, then the keyword scan.
pub fn proceed_strategies() -> StrategyList {
    StrategyList::parse(
        "proceed control",
        &[
            "attr:input[type='submit']",
            "attr:button[type='submit']",
            "role:button|text:Next",
            "role:button|text:Continue",
            "role:button|text:Create",
            "role:button|text:Siguiente",
        ],
    )
    .with_fallback(HeuristicScan::new(
        button_roles(),
        PROCEED_KEYWORDS.iter().copied(),
    ))
}

impl Advancer {
    pub fn new(settle_timeout: Duration) -> Self {
        Self {
            strategies: proceed_strategies(),
            settle_timeout,
        }
    }

    /// Replace the proceed cascade, e.g. with a stage-specific dismiss
    /// control.
    pub fn with_strategies(mut self, strategies: StrategyList) -> Self {
        self.strategies = strategies;
        self
    }

    /// Resolve the proceed control, activate it, and wait for the surface
    /// to settle. Falls back to the submit key when the cascade exhausts.
    #[instrument(level = "debug", skip(self, driver, budget))]
    pub async fn advance(
        &self,
        driver: &dyn UiDriver,
        budget: Duration,
    ) -> Result<AdvanceOutcome, AutomationError> {
        match resolver::resolve(driver, &self.strategies, budget).await? {
            Resolution::Found(control) => {
                driver.click(&control.handle).await?;
                if driver.wait_settled(self.settle_timeout).await? {
                    debug!(target_name = %self.strategies.target, "advanced");
                    return Ok(AdvanceOutcome::Advanced);
                }
                warn!(target_name = %self.strategies.target, "click had no settle, trying submit key");
            }
            Resolution::NotFound => {
                warn!(target_name = %self.strategies.target, "proceed control unresolvable, trying submit key");
            }
        }

        driver.press_key(Key::Submit).await?;
        if driver.wait_settled(self.settle_timeout).await? {
            debug!("advanced via submit key");
            Ok(AdvanceOutcome::Advanced)
        } else {
            Ok(AdvanceOutcome::NotFound)
        }
    }
}
