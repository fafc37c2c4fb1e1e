//! Input plumbing for the first-person camera
//!
//! The renderer never talks to the window directly. Each frame the camera polls an
//! [`InputSource`] for the cursor position and key states, then recenters the cursor.
//! [`WinitInput`] tracks winit window events, [`IdleInput`] is a fixed source used by
//! headless runs and tests.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;
use winit::dpi::PhysicalPosition;
use winit::event::ElementState;
use winit::keyboard::KeyCode;
use winit::window::Window;

/// Source of pointer and keyboard state, polled once per frame
pub trait InputSource {
    /// Current cursor position in client coordinates
    fn cursor_position(&self) -> (i32, i32);

    /// Move the cursor to the given client coordinates
    fn set_cursor_position(&mut self, x: i32, y: i32);

    /// Whether the key is currently held down
    fn is_key_down(&self, key: KeyCode) -> bool;
}

/// InputSource backed by winit window events
pub struct WinitInput {
    window: Arc<Window>,
    pressed_keys: HashSet<KeyCode>,
    cursor: (i32, i32),
}

impl WinitInput {
    /// Create the input tracker, hiding the cursor like a mouse-look camera does
    pub fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();
        window.set_cursor_visible(false);
        Self {
            window,
            pressed_keys: HashSet::new(),
            cursor: ((size.width / 2) as i32, (size.height / 2) as i32),
        }
    }

    /// Process keyboard input event
    pub fn on_keyboard_input(&mut self, keycode: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.pressed_keys.insert(keycode);
            }
            ElementState::Released => {
                self.pressed_keys.remove(&keycode);
            }
        }
    }

    /// Process cursor movement event
    pub fn on_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.cursor = (position.x as i32, position.y as i32);
    }

    /// Forget held keys (useful when window loses focus)
    pub fn reset(&mut self) {
        self.pressed_keys.clear();
    }
}

impl InputSource for WinitInput {
    fn cursor_position(&self) -> (i32, i32) {
        self.cursor
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        if let Err(e) = self.window.set_cursor_position(PhysicalPosition::new(x, y)) {
            warn!("Failed to recenter cursor: {}", e);
        }
        self.cursor = (x, y);
    }

    fn is_key_down(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }
}

/// InputSource with a fixed cursor and an explicit set of held keys
#[derive(Debug, Clone, Default)]
pub struct IdleInput {
    cursor: (i32, i32),
    pressed_keys: HashSet<KeyCode>,
}

impl IdleInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the cursor somewhere; the next recenter overwrites it
    pub fn move_cursor(&mut self, x: i32, y: i32) {
        self.cursor = (x, y);
    }

    pub fn press(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }
}

impl InputSource for IdleInput {
    fn cursor_position(&self) -> (i32, i32) {
        self.cursor
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        self.cursor = (x, y);
    }

    fn is_key_down(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }
}
