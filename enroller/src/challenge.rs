use crate::driver::{Point, PointerController, UiDriver};
use crate::errors::AutomationError;
use crate::resolver::{self, Resolution};
use crate::selector::{Strategy, StrategyList, CHALLENGE_KEYWORDS};
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Canonical hold duration. The observed flow used several conflicting
/// values across revisions; one configurable duration replaces them all.
pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(15);

/// Interval between success-predicate polls during the hold.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A condition that signals the challenge was accepted while the hold is
/// still in progress.
#[derive(Debug, Clone)]
pub enum SuccessPredicate {
    /// A known success-marker element became visible.
    Marker(Strategy),
    /// A visible control's class or id matches this pattern.
    ClassPattern(Regex),
    /// The surface navigated away from the challenge page.
    UrlChange,
}

impl SuccessPredicate {
    pub fn class_pattern(pattern: &str) -> Result<Self, AutomationError> {
        Regex::new(pattern)
            .map(SuccessPredicate::ClassPattern)
            .map_err(|e| AutomationError::InvalidArgument(format!("bad class pattern: {e}")))
    }

    fn name(&self) -> &'static str {
        match self {
            SuccessPredicate::Marker(_) => "marker element",
            SuccessPredicate::ClassPattern(_) => "class pattern",
            SuccessPredicate::UrlChange => "url change",
        }
    }
}

/// Everything the handler needs to find the pointer target and judge
/// success. Declarative apart from the compiled patterns.
#[derive(Debug, Clone)]
pub struct ChallengeSpec {
    /// Strategies for the embedded boundary (iframe/webview) hosting the
    /// challenge.
    pub boundary: StrategyList,
    /// Strategies for the precise target inside the boundary content.
    pub inner_target: StrategyList,
    /// Text vocabulary for the same-surface branch.
    pub surface_keywords: Vec<String>,
    /// Substring identifying the challenge page in its URL.
    pub url_fragment: String,
    pub success: Vec<SuccessPredicate>,
    pub hold_duration: Duration,
    pub poll_interval: Duration,
}

impl ChallengeSpec {
    /// The cascade observed on the target signup flow.
    pub fn signup_default() -> Self {
        Self {
            boundary: StrategyList::parse(
                "challenge boundary",
                &[
                    "attr:iframe[data-testid='humanCaptchaIframe']",
                    "attr:iframe[title='Verification challenge']",
                    "attr:iframe[src*='hsprotect.net']",
                ],
            ),
            inner_target: StrategyList::parse("challenge target", &["attr:[id='px-captcha']"]),
            surface_keywords: CHALLENGE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            url_fragment: "challenge".to_string(),
            success: vec![
                SuccessPredicate::Marker(Strategy::from("attr:div[id='checkmark']")),
                SuccessPredicate::class_pattern("(?i)checkmark|success|verified|complete")
                    .expect("static pattern"),
                SuccessPredicate::UrlChange,
            ],
            hold_duration: DEFAULT_HOLD_DURATION,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Outcome of the hold. `TimedOut` is non-fatal: the hold completed but no
/// success signal was observed, and callers proceed best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Success,
    TimedOut,
}

/// What happened during one hold, for the controller's process log.
#[derive(Debug)]
pub struct HoldReport {
    pub outcome: HoldOutcome,
    /// Absolute device point the pointer pressed.
    pub target: Point,
    /// The computed point fell outside the display and the display center
    /// was substituted.
    pub degraded_pointer: bool,
    /// Name of the predicate that fired during the hold, if any.
    pub fired: Option<&'static str>,
}

/// Holds the physical button down and guarantees exactly one release, on
/// every path out of the hold including panics and cancellation.
pub struct PointerGuard<'a> {
    pointer: &'a dyn PointerController,
    released: bool,
}

impl<'a> PointerGuard<'a> {
    pub fn press(pointer: &'a dyn PointerController) -> Result<Self, AutomationError> {
        pointer.pointer_down()?;
        Ok(Self {
            pointer,
            released: false,
        })
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = self.pointer.pointer_up() {
                warn!("pointer release failed: {e}");
            }
        }
    }
}

impl Drop for PointerGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolve the pointer target, convert to device coordinates, and perform
/// the timed hold while polling success predicates.
///
/// Early success never shortens the hold; the configured duration always
/// elapses before release. A session cancellation observed mid-hold
/// releases the pointer and then propagates.
#[instrument(level = "info", skip_all)]
pub async fn perform_hold(
    driver: &dyn UiDriver,
    pointer: &dyn PointerController,
    spec: &ChallengeSpec,
    resolve_budget: Duration,
) -> Result<HoldReport, AutomationError> {
    let initial_url = driver.current_url().await?;

    let (page_point, origin_kind) = locate_target(driver, spec, resolve_budget).await?;
    let origin = driver.window_origin().await?;
    let mut target = Point {
        x: origin.x + page_point.x,
        y: origin.y + page_point.y,
    };

    let mut degraded_pointer = false;
    let bounds = pointer.display_bounds()?;
    if !bounds.contains(target) {
        warn!(point = ?target, ?bounds, "target outside display, substituting display center");
        target = bounds.center();
        degraded_pointer = true;
    }

    pointer.move_to(target.x, target.y)?;

    info!(point = ?target, duration = ?spec.hold_duration, "starting pointer hold");
    let mut guard = PointerGuard::press(pointer)?;
    let started = Instant::now();
    let mut fired: Option<&'static str> = None;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= spec.hold_duration {
            break;
        }
        let remaining = spec.hold_duration - elapsed;
        tokio::time::sleep(spec.poll_interval.min(remaining)).await;

        // The poll must never interrupt the hold: probe errors are ignored,
        // only cancellation ends the hold early.
        match check_predicates(driver, spec, &initial_url).await {
            Ok(Some(name)) => {
                if fired.is_none() {
                    info!(predicate = name, elapsed = ?started.elapsed(), "success signal during hold");
                    fired = Some(name);
                }
            }
            Ok(None) => {}
            Err(e) if e.is_cancellation() => {
                guard.release();
                return Err(e);
            }
            Err(e) => {
                debug!("predicate probe failed during hold: {e}");
            }
        }
    }

    guard.release();
    info!(held = ?started.elapsed(), "pointer hold complete");

    let outcome = if fired.is_some() || challenge_gone(driver, spec, &initial_url, origin_kind).await
    {
        HoldOutcome::Success
    } else {
        HoldOutcome::TimedOut
    };

    Ok(HoldReport {
        outcome,
        target,
        degraded_pointer,
        fired,
    })
}

/// Which branch produced the pointer target; the post-hold "surface gone"
/// probe differs between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOrigin {
    Boundary,
    Surface,
}

/// Two-branch target resolution: boundary-embedded first, then the
/// same-surface text heuristic.
async fn locate_target(
    driver: &dyn UiDriver,
    spec: &ChallengeSpec,
    budget: Duration,
) -> Result<(Point, TargetOrigin), AutomationError> {
    if let Resolution::Found(boundary) = resolver::resolve(driver, &spec.boundary, budget).await? {
        let boundary_box = driver.bounding_box(&boundary.handle).await?;
        // Boundary center is the default; crossing refines it when allowed.
        let mut point = boundary_box.center();

        match driver.cross_into_boundary(&boundary.handle).await? {
            Some(scope) => {
                match resolver::resolve_within(driver, &spec.inner_target, budget, Some(&scope))
                    .await?
                {
                    Resolution::Found(inner) => {
                        // Inner boxes are relative to the boundary content.
                        let inner_center = driver.bounding_box(&inner.handle).await?.center();
                        point = Point {
                            x: boundary_box.x + inner_center.x,
                            y: boundary_box.y + inner_center.y,
                        };
                        debug!(?point, "refined to inner target center");
                    }
                    Resolution::NotFound => {
                        debug!("inner target not found, keeping boundary center");
                    }
                }
            }
            None => {
                debug!("boundary crossing blocked, keeping boundary center");
            }
        }
        return Ok((point, TargetOrigin::Boundary));
    }

    // Same-surface branch: descriptive-text scan over visible controls.
    for (handle, facts) in driver.visible_controls(None).await? {
        if facts.is_interactable() && spec.surface_keywords.iter().any(|kw| facts.mentions(kw)) {
            let point = driver.bounding_box(&handle).await?.center();
            debug!(?point, role = %facts.role, "same-surface challenge target");
            return Ok((point, TargetOrigin::Surface));
        }
    }

    Err(AutomationError::ElementNotFound(
        "challenge target not present on any branch".to_string(),
    ))
}

async fn check_predicates(
    driver: &dyn UiDriver,
    spec: &ChallengeSpec,
    initial_url: &str,
) -> Result<Option<&'static str>, AutomationError> {
    for predicate in &spec.success {
        match predicate {
            SuccessPredicate::Marker(strategy) => {
                for handle in driver.query(strategy, None).await? {
                    if driver.facts(&handle).await?.visible {
                        return Ok(Some(predicate.name()));
                    }
                }
            }
            SuccessPredicate::ClassPattern(pattern) => {
                for (_, facts) in driver.visible_controls(None).await? {
                    let matched = facts
                        .class_name
                        .as_deref()
                        .is_some_and(|c| pattern.is_match(c))
                        || facts.id.as_deref().is_some_and(|i| pattern.is_match(i));
                    if matched {
                        return Ok(Some(predicate.name()));
                    }
                }
            }
            SuccessPredicate::UrlChange => {
                let url = driver.current_url().await?;
                if url != initial_url && !url.to_lowercase().contains(&spec.url_fragment) {
                    return Ok(Some(predicate.name()));
                }
            }
        }
    }
    Ok(None)
}

/// Post-hold check: the challenge surface disappearing counts as success
/// even when no predicate fired mid-hold.
async fn challenge_gone(
    driver: &dyn UiDriver,
    spec: &ChallengeSpec,
    initial_url: &str,
    origin: TargetOrigin,
) -> bool {
    match check_predicates(driver, spec, initial_url).await {
        Ok(Some(_)) => return true,
        Ok(None) => {}
        Err(_) => return false,
    }

    match origin {
        TargetOrigin::Boundary => {
            let mut probe = spec.boundary.clone();
            probe.strategy_timeout = Duration::from_millis(250);
            matches!(
                resolver::resolve(driver, &probe, Duration::from_secs(1)).await,
                Ok(Resolution::NotFound)
            )
        }
        TargetOrigin::Surface => match driver.visible_controls(None).await {
            Ok(controls) => !controls
                .iter()
                .any(|(_, facts)| spec.surface_keywords.iter().any(|kw| facts.mentions(kw))),
            Err(_) => false,
        },
    }
}
