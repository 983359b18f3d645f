//! Scripted in-memory backends for exercising the pipeline without a real
//! browser, device, or pointer hardware.
//!
//! [`ScriptedDriver`] plays back a fixed sequence of screens and answers
//! queries from declarative control scripts; [`SimulatedPointer`] records
//! every pointer transition so tests can assert the release guarantee.
//! Both implement the production traits, so everything from a single
//! resolver call to a whole pipeline run drives through them unchanged.

use crate::driver::{ControlFacts, Key, Point, PointerController, Rect, UiDriver, UiHandle};
use crate::errors::AutomationError;
use crate::selector::Strategy;
use std::sync::Mutex;
use std::time::Duration;

/// Scope bit marking a handle as a boundary's inner content scope.
const SCOPE_BIT: u64 = 1 << 32;

/// One scripted control and how it behaves under interaction.
#[derive(Debug, Clone)]
pub struct ScriptedControl {
    pub facts: ControlFacts,
    /// Strategies this control answers beyond generic role/text matching.
    pub answers: Vec<Strategy>,
    pub bbox: Rect,
    pub value: String,
    /// `false` makes native clear report `UnsupportedOperation`.
    pub supports_clear: bool,
    /// Writes corrupted for this many write operations before landing
    /// correctly, for write-retry tests.
    pub write_glitches: u32,
    /// Clicking this control advances to the next screen.
    pub advances: bool,
    /// Read-back echoes mask characters instead of the stored value, like a
    /// password field.
    pub masked_readback: bool,
    /// Clicking this control writes `(1)` into the value of the sibling
    /// control named `(0)`, like a dropdown option committing its choice.
    pub sets_value_of: Option<(String, String)>,
    /// Present when the control is an embedded boundary; `Some(true)` is
    /// crossable, `Some(false)` simulates origin isolation.
    pub crossable: Option<bool>,
    /// Inner controls behind the boundary, reachable only after crossing.
    pub inner: Vec<ScriptedControl>,
}

impl ScriptedControl {
    pub fn new(role: &str, name: &str) -> Self {
        Self {
            facts: ControlFacts {
                role: role.to_string(),
                name: Some(name.to_string()),
                visible: true,
                enabled: true,
                ..Default::default()
            },
            answers: Vec::new(),
            bbox: Rect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 30.0,
            },
            value: String::new(),
            supports_clear: true,
            write_glitches: 0,
            advances: false,
            masked_readback: false,
            sets_value_of: None,
            crossable: None,
            inner: Vec::new(),
        }
    }

    /// Shorthand strategy strings this control answers, e.g.
    /// `"attr:input[type='email']"`.
    pub fn answering(mut self, strategies: &[&str]) -> Self {
        self.answers
            .extend(strategies.iter().map(|s| Strategy::from(*s)));
        self
    }

    pub fn at(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = Rect {
            x,
            y,
            width,
            height,
        };
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.facts.id = Some(id.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.facts.label = Some(label.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.facts.text = Some(text.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.facts.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.facts.class_name = Some(class.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.facts.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.facts.enabled = false;
        self
    }

    pub fn without_native_clear(mut self) -> Self {
        self.supports_clear = false;
        self
    }

    pub fn glitching_writes(mut self, count: u32) -> Self {
        self.write_glitches = count;
        self
    }

    pub fn advances_on_click(mut self) -> Self {
        self.advances = true;
        self
    }

    pub fn masked_readback(mut self) -> Self {
        self.masked_readback = true;
        self
    }

    pub fn sets_value_of(mut self, sibling_name: &str, value: &str) -> Self {
        self.sets_value_of = Some((sibling_name.to_string(), value.to_string()));
        self
    }

    pub fn boundary(mut self, crossable: bool, inner: Vec<ScriptedControl>) -> Self {
        self.crossable = Some(crossable);
        self.inner = inner;
        self
    }
}

/// One screen of the scripted flow, in document order.
#[derive(Debug, Clone)]
pub struct ScriptedScreen {
    pub url: String,
    pub controls: Vec<ScriptedControl>,
}

impl ScriptedScreen {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            controls: Vec::new(),
        }
    }

    pub fn with(mut self, control: ScriptedControl) -> Self {
        self.controls.push(control);
        self
    }
}

struct Node {
    id: u64,
    scope: Option<u64>,
    control: ScriptedControl,
}

struct Screen {
    url: String,
    nodes: Vec<Node>,
}

struct DriverState {
    screens: Vec<Screen>,
    current: usize,
    focused: Option<u64>,
    cancelled: Option<String>,
    submit_advances: bool,
    settled: bool,
    origin: Point,
}

/// Plays back scripted screens behind the production [`UiDriver`] trait.
pub struct ScriptedDriver {
    state: Mutex<DriverState>,
}

impl ScriptedDriver {
    pub fn new(screens: Vec<ScriptedScreen>) -> Self {
        let mut next_id: u64 = 1;
        let screens = screens
            .into_iter()
            .map(|screen| {
                let mut nodes = Vec::new();
                for mut control in screen.controls {
                    let inner = std::mem::take(&mut control.inner);
                    let id = next_id;
                    next_id += 1;
                    nodes.push(Node {
                        id,
                        scope: None,
                        control,
                    });
                    for inner_control in inner {
                        let inner_id = next_id;
                        next_id += 1;
                        nodes.push(Node {
                            id: inner_id,
                            scope: Some(id | SCOPE_BIT),
                            control: inner_control,
                        });
                    }
                }
                Screen {
                    url: screen.url,
                    nodes,
                }
            })
            .collect();

        Self {
            state: Mutex::new(DriverState {
                screens,
                current: 0,
                focused: None,
                cancelled: None,
                submit_advances: false,
                settled: true,
                origin: Point { x: 0.0, y: 0.0 },
            }),
        }
    }

    pub fn single_screen(controls: Vec<ScriptedControl>) -> Self {
        Self::new(vec![ScriptedScreen {
            url: "scripted://screen-0".to_string(),
            controls,
        }])
    }

    /// Make the submit key advance screens, like the keyboard fallback on
    /// the real flow.
    pub fn submit_key_advances(self) -> Self {
        self.state.lock().expect("driver poisoned").submit_advances = true;
        self
    }

    pub fn with_window_origin(self, x: f64, y: f64) -> Self {
        self.state.lock().expect("driver poisoned").origin = Point { x, y };
        self
    }

    /// Inject a session cancellation: every subsequent driver call fails
    /// with `SessionCancelled`.
    pub fn cancel(&self, reason: &str) {
        self.state.lock().expect("driver poisoned").cancelled = Some(reason.to_string());
    }

    /// Move playback to the next screen, as an external page transition.
    pub fn advance_screen(&self) {
        let mut state = self.state.lock().expect("driver poisoned");
        if state.current + 1 < state.screens.len() {
            state.current += 1;
        }
    }

    pub fn current_screen(&self) -> usize {
        self.state.lock().expect("driver poisoned").current
    }

    fn guard(state: &DriverState) -> Result<(), AutomationError> {
        match &state.cancelled {
            Some(reason) => Err(AutomationError::SessionCancelled(reason.clone())),
            None => Ok(()),
        }
    }

    fn with_node<T>(
        &self,
        handle: &UiHandle,
        f: impl FnOnce(&mut Node) -> T,
    ) -> Result<T, AutomationError> {
        let mut state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        let current = state.current;
        let screen = &mut state.screens[current];
        let node = screen
            .nodes
            .iter_mut()
            .find(|n| n.id == handle.0)
            .ok_or_else(|| AutomationError::DriverError(format!("stale handle {}", handle.0)))?;
        Ok(f(node))
    }

    fn matches(node: &Node, strategy: &Strategy) -> bool {
        if node.control.answers.contains(strategy) {
            return true;
        }
        match strategy {
            Strategy::RoleText { role, text } => {
                node.control.facts.role.eq_ignore_ascii_case(role)
                    && (text.is_empty() || node.control.facts.mentions(text))
            }
            _ => false,
        }
    }

    fn apply_write(control: &mut ScriptedControl, value: String) {
        if control.write_glitches > 0 {
            control.write_glitches -= 1;
            control.value = format!("{value}\u{fffd}");
        } else {
            control.value = value;
        }
    }
}

#[async_trait::async_trait]
impl UiDriver for ScriptedDriver {
    // Scripted playback always re-enters at the first screen regardless of
    // the requested URL.
    async fn navigate(&self, _url: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        state.current = 0;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        Ok(state.screens[state.current].url.clone())
    }

    async fn query(
        &self,
        strategy: &Strategy,
        scope: Option<&UiHandle>,
    ) -> Result<Vec<UiHandle>, AutomationError> {
        let state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        let scope_id = scope.map(|s| s.0);
        Ok(state.screens[state.current]
            .nodes
            .iter()
            .filter(|n| n.scope == scope_id && Self::matches(n, strategy))
            .map(|n| UiHandle(n.id))
            .collect())
    }

    async fn facts(&self, handle: &UiHandle) -> Result<ControlFacts, AutomationError> {
        self.with_node(handle, |node| node.control.facts.clone())
    }

    async fn visible_controls(
        &self,
        scope: Option<&UiHandle>,
    ) -> Result<Vec<(UiHandle, ControlFacts)>, AutomationError> {
        let state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        let scope_id = scope.map(|s| s.0);
        Ok(state.screens[state.current]
            .nodes
            .iter()
            .filter(|n| n.scope == scope_id && n.control.facts.visible)
            .map(|n| (UiHandle(n.id), n.control.facts.clone()))
            .collect())
    }

    async fn click(&self, handle: &UiHandle) -> Result<(), AutomationError> {
        let mut state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        let current = state.current;
        let node = state.screens[current]
            .nodes
            .iter()
            .find(|n| n.id == handle.0)
            .ok_or_else(|| AutomationError::DriverError(format!("stale handle {}", handle.0)))?;
        let advances = node.control.advances;
        let setter = node.control.sets_value_of.clone();

        if let Some((sibling, value)) = setter {
            if let Some(target) = state.screens[current]
                .nodes
                .iter_mut()
                .find(|n| n.control.facts.name.as_deref() == Some(sibling.as_str()))
            {
                target.control.value = value;
            }
        }
        if advances && state.current + 1 < state.screens.len() {
            state.current += 1;
        }
        Ok(())
    }

    async fn focus(&self, handle: &UiHandle) -> Result<(), AutomationError> {
        let id = handle.0;
        self.with_node(handle, |_| ())?;
        self.state.lock().expect("driver poisoned").focused = Some(id);
        Ok(())
    }

    async fn type_text(&self, handle: &UiHandle, text: &str) -> Result<(), AutomationError> {
        let text = text.to_string();
        self.with_node(handle, |node| {
            let combined = format!("{}{}", node.control.value, text);
            Self::apply_write(&mut node.control, combined);
        })
    }

    async fn clear(&self, handle: &UiHandle) -> Result<(), AutomationError> {
        self.with_node(handle, |node| {
            if node.control.supports_clear {
                node.control.value.clear();
                Ok(())
            } else {
                Err(AutomationError::UnsupportedOperation(
                    "native clear rejected".to_string(),
                ))
            }
        })?
    }

    async fn set_value(&self, handle: &UiHandle, value: &str) -> Result<(), AutomationError> {
        let value = value.to_string();
        self.with_node(handle, |node| {
            Self::apply_write(&mut node.control, value);
        })
    }

    async fn read_value(&self, handle: &UiHandle) -> Result<String, AutomationError> {
        self.with_node(handle, |node| {
            if node.control.masked_readback {
                "\u{2022}".repeat(node.control.value.chars().count())
            } else {
                node.control.value.clone()
            }
        })
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        let mut state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        match key {
            Key::Submit => {
                if state.submit_advances && state.current + 1 < state.screens.len() {
                    state.current += 1;
                }
            }
            Key::Backspace => {
                if let Some(focused) = state.focused {
                    let current = state.current;
                    if let Some(node) = state.screens[current]
                        .nodes
                        .iter_mut()
                        .find(|n| n.id == focused)
                    {
                        node.control.value.pop();
                    }
                }
            }
        }
        Ok(())
    }

    async fn bounding_box(&self, handle: &UiHandle) -> Result<Rect, AutomationError> {
        self.with_node(handle, |node| node.control.bbox)
    }

    async fn cross_into_boundary(
        &self,
        handle: &UiHandle,
    ) -> Result<Option<UiHandle>, AutomationError> {
        self.with_node(handle, |node| match node.control.crossable {
            Some(true) => Some(UiHandle(node.id | SCOPE_BIT)),
            _ => None,
        })
    }

    async fn window_origin(&self) -> Result<Point, AutomationError> {
        let state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        Ok(state.origin)
    }

    async fn wait_settled(&self, _timeout: Duration) -> Result<bool, AutomationError> {
        let state = self.state.lock().expect("driver poisoned");
        Self::guard(&state)?;
        Ok(state.settled)
    }
}

#[derive(Debug, Default)]
struct PointerState {
    downs: u32,
    ups: u32,
    moves: Vec<Point>,
}

/// Records pointer transitions instead of injecting hardware events.
pub struct SimulatedPointer {
    state: Mutex<PointerState>,
    display: Rect,
}

impl Default for SimulatedPointer {
    fn default() -> Self {
        Self::new(Rect {
            x: 0.0,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
        })
    }
}

impl SimulatedPointer {
    pub fn new(display: Rect) -> Self {
        Self {
            state: Mutex::new(PointerState::default()),
            display,
        }
    }

    pub fn downs(&self) -> u32 {
        self.state.lock().expect("pointer poisoned").downs
    }

    pub fn ups(&self) -> u32 {
        self.state.lock().expect("pointer poisoned").ups
    }

    pub fn last_move(&self) -> Option<Point> {
        self.state
            .lock()
            .expect("pointer poisoned")
            .moves
            .last()
            .copied()
    }
}

impl PointerController for SimulatedPointer {
    fn move_to(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.state
            .lock()
            .expect("pointer poisoned")
            .moves
            .push(Point { x, y });
        Ok(())
    }

    fn pointer_down(&self) -> Result<(), AutomationError> {
        self.state.lock().expect("pointer poisoned").downs += 1;
        Ok(())
    }

    fn pointer_up(&self) -> Result<(), AutomationError> {
        self.state.lock().expect("pointer poisoned").ups += 1;
        Ok(())
    }

    fn display_bounds(&self) -> Result<Rect, AutomationError> {
        Ok(self.display)
    }
}
