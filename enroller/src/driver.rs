use crate::errors::AutomationError;
use crate::selector::Strategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An opaque token for one on-screen control, issued by the driver.
///
/// Handles are only valid until the page or screen changes underneath them.
/// The resolver never retries a stale handle in place; it re-resolves from
/// scratch, so holding a `UiHandle` across a navigation is always a bug in
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UiHandle(pub u64);

/// Attribute snapshot for one control, read fresh from the live UI.
///
/// `visible`/`enabled` reflect the state at the moment of the read; the
/// resolver re-reads them at resolution time rather than trusting anything
/// cached alongside the handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlFacts {
    pub role: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub text: Option<String>,
    pub class_name: Option<String>,
    pub visible: bool,
    pub enabled: bool,
}

impl ControlFacts {
    /// True if any descriptive attribute contains `needle` (case-insensitive).
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            self.name.as_deref(),
            self.id.as_deref(),
            self.label.as_deref(),
            self.placeholder.as_deref(),
            self.text.as_deref(),
        ]
        .iter()
        .flatten()
        .any(|v| v.to_lowercase().contains(&needle))
    }

    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Axis-aligned rectangle in page or screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Keys the pipeline sends to the target UI.
///
/// `Submit` is the keyboard fallback for an unresolvable proceed control
/// (Enter on the web surface, keycode 66 on the mobile analog); `Backspace`
/// drives synthetic clearing when a control rejects the native clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Submit,
    Backspace,
}

/// The automation surface one run consumes, behind which a browser page or
/// a mobile device session lives.
///
/// The mobile analogs map onto the same methods: class/XPath lookup is
/// [`Strategy::ClassOrPath`] through `query`, `sendKeyCode` is `press_key`,
/// `inputText` is `type_text`, and the in-page heuristic scan backs
/// `visible_controls`.
///
/// Expected negative outcomes are values (`query` returning an empty vec,
/// `cross_into_boundary` returning `None`); errors are reserved for session
/// loss (`SessionCancelled`) and driver failures (`DriverError`).
#[async_trait::async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate the session to a URL (or deep link on mobile).
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Current page URL, or a screen identifier on mobile.
    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Query controls matching one declarative strategy, in document order,
    /// optionally scoped to a boundary previously entered with
    /// `cross_into_boundary`.
    async fn query(
        &self,
        strategy: &Strategy,
        scope: Option<&UiHandle>,
    ) -> Result<Vec<UiHandle>, AutomationError>;

    /// Read a fresh attribute snapshot for a handle.
    async fn facts(&self, handle: &UiHandle) -> Result<ControlFacts, AutomationError>;

    /// Enumerate all currently visible controls in document order. Backs the
    /// resolver's scripted fallback; web drivers implement this with an
    /// injected script, mobile drivers with a source dump.
    async fn visible_controls(
        &self,
        scope: Option<&UiHandle>,
    ) -> Result<Vec<(UiHandle, ControlFacts)>, AutomationError>;

    async fn click(&self, handle: &UiHandle) -> Result<(), AutomationError>;

    async fn focus(&self, handle: &UiHandle) -> Result<(), AutomationError>;

    /// Type text into a focused control as discrete keystrokes.
    async fn type_text(&self, handle: &UiHandle, text: &str) -> Result<(), AutomationError>;

    /// Native clear. Drivers that cannot clear a given control return
    /// `UnsupportedOperation`; the writer then falls back to synthetic
    /// backspace clearing.
    async fn clear(&self, handle: &UiHandle) -> Result<(), AutomationError>;

    /// Direct value assignment plus synthetic input/change/blur
    /// notification. The writer's alternate method when keystroke writes
    /// fail verification.
    async fn set_value(&self, handle: &UiHandle, value: &str) -> Result<(), AutomationError>;

    /// Read the control's current value back for write verification.
    async fn read_value(&self, handle: &UiHandle) -> Result<String, AutomationError>;

    async fn press_key(&self, key: Key) -> Result<(), AutomationError>;

    /// Bounding box in page coordinates.
    async fn bounding_box(&self, handle: &UiHandle) -> Result<Rect, AutomationError>;

    /// Attempt to enter an embedded boundary (iframe, webview). Returns a
    /// scope handle for queries inside the boundary content, or `None` when
    /// crossing is blocked by origin isolation.
    async fn cross_into_boundary(
        &self,
        handle: &UiHandle,
    ) -> Result<Option<UiHandle>, AutomationError>;

    /// On-screen origin of the host window, for converting page coordinates
    /// to absolute device coordinates.
    async fn window_origin(&self) -> Result<Point, AutomationError>;

    /// Wait for the surface to reach a settled state after an action, up to
    /// `timeout`. Returns `Ok(false)` if the surface is still busy.
    async fn wait_settled(&self, timeout: Duration) -> Result<bool, AutomationError>;
}

/// OS-level pointer capability used by the challenge hold.
///
/// Methods are synchronous so that [`crate::challenge::PointerGuard`] can
/// release the button from `Drop` on every exit path. Real backends inject
/// hardware events; tests use [`crate::simulation::SimulatedPointer`].
pub trait PointerController: Send + Sync {
    fn move_to(&self, x: f64, y: f64) -> Result<(), AutomationError>;

    fn pointer_down(&self) -> Result<(), AutomationError>;

    fn pointer_up(&self) -> Result<(), AutomationError>;

    /// Physical display bounds, for the out-of-bounds safety check before a
    /// hold.
    fn display_bounds(&self) -> Result<Rect, AutomationError>;
}
