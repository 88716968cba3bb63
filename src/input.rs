use std::collections::HashSet;

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

/// Tracks keyboard and scroll-wheel state between frames.
#[derive(Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    modifiers: ModifiersState,
    scroll_delta: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the start of each frame to reset per-frame state.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.scroll_delta = 0.0;
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press(key),
                        ElementState::Released => self.release(key),
                    }
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => *y,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
            }
            _ => {}
        }
    }

    fn press(&mut self, key: KeyCode) {
        if !self.keys_down.contains(&key) {
            self.keys_pressed.insert(key);
        }
        self.keys_down.insert(key);
    }

    fn release(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    /// Returns true if either control key (or command on macOS) is held.
    pub fn ctrl(&self) -> bool {
        self.modifiers.control_key() || self.modifiers.super_key()
    }

    /// Vertical scroll this frame, in lines. Positive scrolls up.
    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    /// Commands triggered by this frame's key presses.
    pub fn commands(&self) -> Vec<Command> {
        let ctrl = self.ctrl();
        let mut commands: Vec<Command> = self
            .keys_pressed
            .iter()
            .filter_map(|&key| Command::from_key(key, ctrl))
            .collect();
        commands.sort();
        commands
    }
}

/// Viewer actions bound to keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Command {
    TogglePlaying,
    ToggleBloom,
    CycleDebugPass,
    Focus,
    ExposureUp,
    ExposureDown,
    GammaUp,
    GammaDown,
    Recompile,
    Snapshot,
    Save,
    NewShader,
    DoubleOutputSize,
    HalveOutputSize,
    MatchViewport,
}

impl Command {
    pub fn from_key(key: KeyCode, ctrl: bool) -> Option<Self> {
        let command = match (key, ctrl) {
            (KeyCode::KeyS, true) => Command::Save,
            (KeyCode::KeyN, true) => Command::NewShader,
            (KeyCode::ArrowUp, true) => Command::DoubleOutputSize,
            (KeyCode::ArrowDown, true) => Command::HalveOutputSize,
            (_, true) => return None,
            (KeyCode::Space, false) => Command::TogglePlaying,
            (KeyCode::KeyB, false) => Command::ToggleBloom,
            (KeyCode::KeyD, false) => Command::CycleDebugPass,
            (KeyCode::KeyF, false) => Command::Focus,
            (KeyCode::ArrowUp, false) => Command::ExposureUp,
            (KeyCode::ArrowDown, false) => Command::ExposureDown,
            (KeyCode::ArrowRight, false) => Command::GammaUp,
            (KeyCode::ArrowLeft, false) => Command::GammaDown,
            (KeyCode::KeyR, false) => Command::Recompile,
            (KeyCode::KeyP, false) => Command::Snapshot,
            (KeyCode::KeyM, false) => Command::MatchViewport,
            _ => return None,
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_is_pressed_once() {
        let mut input = Input::new();
        input.press(KeyCode::KeyB);
        assert!(input.keys_pressed.contains(&KeyCode::KeyB));

        input.begin_frame();
        input.press(KeyCode::KeyB);
        assert!(input.keys_down.contains(&KeyCode::KeyB));
        assert!(!input.keys_pressed.contains(&KeyCode::KeyB));

        input.release(KeyCode::KeyB);
        input.press(KeyCode::KeyB);
        assert!(input.keys_pressed.contains(&KeyCode::KeyB));
    }

    #[test]
    fn key_bindings() {
        assert_eq!(
            Command::from_key(KeyCode::Space, false),
            Some(Command::TogglePlaying)
        );
        assert_eq!(Command::from_key(KeyCode::KeyS, true), Some(Command::Save));
        assert_eq!(Command::from_key(KeyCode::KeyS, false), None);
        assert_eq!(Command::from_key(KeyCode::KeyB, true), None);
        assert_eq!(
            Command::from_key(KeyCode::ArrowLeft, false),
            Some(Command::GammaDown)
        );
    }

    #[test]
    fn ctrl_arrows_resize_output() {
        assert_eq!(
            Command::from_key(KeyCode::ArrowUp, true),
            Some(Command::DoubleOutputSize)
        );
        assert_eq!(
            Command::from_key(KeyCode::ArrowDown, true),
            Some(Command::HalveOutputSize)
        );
        assert_eq!(
            Command::from_key(KeyCode::ArrowUp, false),
            Some(Command::ExposureUp)
        );
        assert_eq!(
            Command::from_key(KeyCode::KeyM, false),
            Some(Command::MatchViewport)
        );
        assert_eq!(Command::from_key(KeyCode::KeyM, true), None);
    }

    #[test]
    fn commands_follow_pressed_keys() {
        let mut input = Input::new();
        input.press(KeyCode::KeyD);
        input.press(KeyCode::KeyB);
        input.press(KeyCode::KeyZ);
        assert_eq!(
            input.commands(),
            vec![Command::ToggleBloom, Command::CycleDebugPass]
        );

        input.begin_frame();
        assert!(input.commands().is_empty());
    }
}
