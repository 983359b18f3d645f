use crate::driver::{ControlFacts, UiDriver, UiHandle};
use crate::errors::AutomationError;
use crate::selector::StrategyList;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// How often a strategy re-queries while waiting for its target to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A control the resolver produced, with the facts read at resolution time
/// and the index of the strategy that won (`strategies.len()` means the
/// scripted fallback).
#[derive(Debug, Clone)]
pub struct ResolvedControl {
    pub handle: UiHandle,
    pub facts: ControlFacts,
    pub strategy_index: usize,
}

/// Explicit found/not-found outcome; exhausting the cascade is an ordinary
/// result, not an error. Callers decide whether it is fatal.
#[derive(Debug)]
pub enum Resolution {
    Found(ResolvedControl),
    NotFound,
}

impl Resolution {
    pub fn found(self) -> Option<ResolvedControl> {
        match self {
            Resolution::Found(c) => Some(c),
            Resolution::NotFound => None,
        }
    }
}

/// Walk the strategy cascade for one logical target.
///
/// Strategies run in priority order, each polling under its own timeout
/// (clipped to whatever remains of `budget`). The first strategy that
/// produces a visible and enabled control wins; interactability comes from
/// facts read at resolution time, never from a cached handle. After the
/// native strategies are exhausted the scripted fallback, when declared,
/// scans visible controls in document order and keyword-matches their
/// descriptive attributes; the first match in document order is the
/// tie-break. Read-only: no clicks, no focus changes.
#[instrument(level = "debug", skip(driver, list), fields(target_name = %list.target))]
pub async fn resolve(
    driver: &dyn UiDriver,
    list: &StrategyList,
    budget: Duration,
) -> Result<Resolution, AutomationError> {
    resolve_within(driver, list, budget, None).await
}

/// Same cascade, scoped to a boundary previously entered with
/// `cross_into_boundary`.
pub async fn resolve_within(
    driver: &dyn UiDriver,
    list: &StrategyList,
    budget: Duration,
    scope: Option<&UiHandle>,
) -> Result<Resolution, AutomationError> {
    let deadline = Instant::now() + budget;

    for (index, strategy) in list.strategies.iter().enumerate() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(target_name = %list.target, "resolution budget exhausted before fallback");
            break;
        }
        let strategy_deadline = Instant::now() + list.strategy_timeout.min(remaining);

        debug!(target_name = %list.target, %strategy, index, "trying strategy");
        loop {
            let handles = driver.query(strategy, scope).await?;
            for handle in handles {
                // Fresh facts on every probe; stale handles are discarded by
                // construction.
                let facts = driver.facts(&handle).await?;
                if facts.is_interactable() {
                    debug!(target_name = %list.target, index, role = %facts.role, "strategy matched");
                    return Ok(Resolution::Found(ResolvedControl {
                        handle,
                        facts,
                        strategy_index: index,
                    }));
                }
            }

            let left = strategy_deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                debug!(target_name = %list.target, index, "strategy timed out");
                break;
            }
            tokio::time::sleep(POLL_INTERVAL.min(left)).await;
        }
    }

    if let Some(scan) = &list.fallback {
        let controls = driver.visible_controls(scope).await?;
        for (handle, facts) in controls {
            if !facts.is_interactable() || !scan.role_matches(&facts.role) {
                continue;
            }
            if scan.keywords.iter().any(|kw| facts.mentions(kw)) {
                debug!(target_name = %list.target, role = %facts.role, "heuristic fallback matched");
                return Ok(Resolution::Found(ResolvedControl {
                    handle,
                    facts,
                    strategy_index: list.strategies.len(),
                }));
            }
        }
    }

    debug!(target_name = %list.target, "cascade exhausted");
    Ok(Resolution::NotFound)
}
