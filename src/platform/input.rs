//! Input state
//!
//! Keyboard directions use physical key codes first, so WASD/ZQSD both work,
//! with a character fallback. A touch joystick, while active, overrides the
//! keys entirely.

use glam::Vec2;

use crate::sim::TickInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Up,
    Down,
    Left,
    Right,
}

fn dir_for_code(code: &str) -> Option<Dir> {
    match code {
        "ArrowUp" | "KeyW" => Some(Dir::Up),
        "ArrowDown" | "KeyS" => Some(Dir::Down),
        "ArrowLeft" | "KeyA" => Some(Dir::Left),
        "ArrowRight" | "KeyD" => Some(Dir::Right),
        _ => None,
    }
}

fn dir_for_key(key: &str) -> Option<Dir> {
    match key {
        "w" | "W" | "z" | "Z" => Some(Dir::Up),
        "s" | "S" => Some(Dir::Down),
        "a" | "A" | "q" | "Q" => Some(Dir::Left),
        "d" | "D" => Some(Dir::Right),
        _ => None,
    }
}

/// Discrete requests raised since the last [`InputState::take_intents`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Intents {
    pub pause: bool,
    pub restart: bool,
    pub start: bool,
    pub dash: bool,
}

#[derive(Debug, Default, Clone)]
pub struct InputState {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
    analog: Vec2,
    analog_active: bool,
    pending: Intents,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the key was consumed
    pub fn key_down(&mut self, code: &str, key: &str) -> bool {
        if let Some(dir) = dir_for_code(code).or_else(|| dir_for_key(key)) {
            self.set_dir(dir, true);
            return true;
        }
        match key {
            "p" | "P" | "Escape" => self.pending.pause = true,
            "r" | "R" => self.pending.restart = true,
            "Enter" => self.pending.start = true,
            " " | "Shift" => self.pending.dash = true,
            _ => return false,
        }
        true
    }

    pub fn key_up(&mut self, code: &str, key: &str) -> bool {
        match dir_for_code(code).or_else(|| dir_for_key(key)) {
            Some(dir) => {
                self.set_dir(dir, false);
                true
            }
            None => false,
        }
    }

    fn set_dir(&mut self, dir: Dir, down: bool) {
        match dir {
            Dir::Up => self.up = down,
            Dir::Down => self.down = down,
            Dir::Left => self.left = down,
            Dir::Right => self.right = down,
        }
    }

    /// Joystick axis in [-1, 1]^2; inactive releases it
    pub fn set_joystick(&mut self, active: bool, axis: Vec2) {
        self.analog_active = active;
        self.analog = if active && axis.is_finite() {
            axis.clamp(Vec2::NEG_ONE, Vec2::ONE)
        } else {
            Vec2::ZERO
        };
    }

    pub fn request_dash(&mut self) {
        self.pending.dash = true;
    }

    /// Release everything, e.g. on focus loss
    pub fn clear(&mut self) {
        *self = Self {
            pending: self.pending,
            ..Self::default()
        };
    }

    /// Movement with length at most 1; the joystick wins while active
    pub fn move_vector(&self) -> Vec2 {
        let v = if self.analog_active {
            self.analog
        } else {
            let axis = |neg: bool, pos: bool| pos as i32 as f32 - neg as i32 as f32;
            Vec2::new(axis(self.left, self.right), axis(self.up, self.down))
        };
        v.clamp_length_max(1.0)
    }

    pub fn take_intents(&mut self) -> Intents {
        std::mem::take(&mut self.pending)
    }

    /// Simulation input for this frame
    pub fn tick_input(&self, intents: &Intents, now_ms: f64) -> TickInput {
        TickInput {
            move_dir: self.move_vector(),
            dash: intents.dash,
            pause: intents.pause,
            now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_layout_fallback() {
        let mut input = InputState::new();
        assert!(input.key_down("KeyD", "d"));
        assert_eq!(input.move_vector(), Vec2::X);
        input.key_up("KeyD", "d");

        // AZERTY 'z' reported without a physical code
        assert!(input.key_down("", "z"));
        assert_eq!(input.move_vector(), Vec2::NEG_Y);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let mut input = InputState::new();
        input.key_down("ArrowRight", "ArrowRight");
        input.key_down("ArrowDown", "ArrowDown");
        let v = input.move_vector();
        assert!((v.length() - 1.0).abs() < 1e-5);
        assert!(v.x > 0.0 && v.y > 0.0);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut input = InputState::new();
        input.key_down("KeyA", "a");
        input.key_down("KeyD", "d");
        assert_eq!(input.move_vector(), Vec2::ZERO);
    }

    #[test]
    fn test_joystick_overrides_keys() {
        let mut input = InputState::new();
        input.key_down("KeyD", "d");
        input.set_joystick(true, Vec2::new(0.0, 0.4));
        assert_eq!(input.move_vector(), Vec2::new(0.0, 0.4));

        input.set_joystick(true, Vec2::new(1.0, 1.0));
        assert!(input.move_vector().length() <= 1.0 + 1e-6);

        input.set_joystick(false, Vec2::new(0.0, 0.4));
        assert_eq!(input.move_vector(), Vec2::X);
    }

    #[test]
    fn test_intents_are_edges() {
        let mut input = InputState::new();
        assert!(input.key_down("KeyP", "p"));
        assert!(input.key_down("Space", " "));
        assert!(!input.key_down("KeyX", "x"));

        let intents = input.take_intents();
        assert!(intents.pause && intents.dash);
        let tick = input.tick_input(&intents, 5.0);
        assert!(tick.pause && tick.dash);
        assert_eq!(tick.now_ms, 5.0);

        assert_eq!(input.take_intents(), Intents::default());
    }

    #[test]
    fn test_clear_releases_keys() {
        let mut input = InputState::new();
        input.key_down("KeyW", "w");
        input.key_down("Enter", "Enter");
        input.clear();
        assert_eq!(input.move_vector(), Vec2::ZERO);
        assert!(input.take_intents().start);
    }
}
