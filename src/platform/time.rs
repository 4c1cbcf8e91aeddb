//! Frame clock

use crate::consts::MAX_DT;

/// Turns host millisecond timestamps into clamped simulation steps
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous frame, clamped to `[0, MAX_DT]`
    ///
    /// The first frame after construction or [`reset`](Self::reset) yields 0.
    pub fn frame(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) if now_ms.is_finite() => ((now_ms - last) / 1000.0) as f32,
            _ => 0.0,
        };
        if now_ms.is_finite() {
            self.last_ms = Some(now_ms);
        }
        dt.clamp(0.0, MAX_DT)
    }

    /// Drop the previous timestamp, e.g. when the page becomes visible again
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame(1000.0), 0.0);
        assert!((clock.frame(1016.0) - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_stall_is_clamped() {
        let mut clock = FrameClock::new();
        clock.frame(0.0);
        assert_eq!(clock.frame(5000.0), MAX_DT);
        assert_eq!(clock.frame(4000.0), 0.0);
    }

    #[test]
    fn test_reset_avoids_catch_up() {
        let mut clock = FrameClock::new();
        clock.frame(0.0);
        clock.reset();
        assert_eq!(clock.frame(90_000.0), 0.0);
        assert!((clock.frame(90_020.0) - 0.02).abs() < 1e-6);
    }
}
