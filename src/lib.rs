//! ASCII Survivors - simulation core of a top-down survival shooter
//!
//! Core modules:
//! - `sim`: Fixed-cadence simulation (world field, combat, waves, progression)
//! - `audio`: Procedural sound effects and the step-sequenced music scheduler
//! - `platform`: Input vector and frame clock abstraction
//! - `persistence`: Signed key/value storage
//! - `session`: Host glue tying a run to input, audio and storage
//! - `tuning`: Data-driven game balance

pub mod audio;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod settings;
pub mod sim;
pub mod tuning;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use highscores::HighScore;
pub use session::Session;
pub use settings::Settings;

use glam::Vec2;
use rand::Rng;

/// Game configuration constants
pub mod consts {
    /// Largest simulation step accepted from the host (seconds)
    pub const MAX_DT: f32 = 0.04;

    /// Nominal frame step used by the headless runner and tests
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Player collision radius
    pub const PLAYER_RADIUS: f32 = 8.0;

    /// Upgrade choices offered per menu
    pub const UPGRADE_CHOICES: usize = 3;

    /// Pickup lifetime in seconds
    pub const PICKUP_TTL: f32 = 16.0;

    /// Highest weapon level
    pub const WEAPON_MAX_LEVEL: u8 = 4;
}

/// Unit vector toward (x, y), or +X when the vector is degenerate
#[inline]
pub fn dir_or_x(v: Vec2) -> Vec2 {
    let n = v.normalize_or_zero();
    if n == Vec2::ZERO { Vec2::X } else { n }
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Uniform float in `[lo, hi)`; returns `lo` for an empty range
#[inline]
pub fn rand_range<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi <= lo {
        return lo;
    }
    rng.random_range(lo..hi)
}

/// Pick an item from `(item, weight)` pairs proportionally to weight.
///
/// Falls back to the first item when every weight is zero.
pub fn pick_weighted<T: Copy, R: Rng + ?Sized>(rng: &mut R, items: &[(T, f32)]) -> Option<T> {
    let sum: f32 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if sum <= 0.0 {
        return items.first().map(|(t, _)| *t);
    }
    let mut r = rng.random::<f32>() * sum;
    for (item, w) in items {
        r -= w.max(0.0);
        if r <= 0.0 {
            return Some(*item);
        }
    }
    items.last().map(|(t, _)| *t)
}

/// Squared distance from `p` to the segment `a..b`
pub fn dist2_point_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}
