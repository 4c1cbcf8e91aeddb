//! Platform abstraction layer
//!
//! Host-facing plumbing that stays out of the simulation:
//! - Input: key/joystick state to a movement vector and discrete intents
//! - Time: frame timestamps to clamped simulation steps

pub mod input;
pub mod time;

pub use input::{InputState, Intents};
pub use time::FrameClock;
