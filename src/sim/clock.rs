//! Frame clock
//!
//! Turns raw display timestamps (ms, as delivered by the refresh callback) into
//! clamped, optionally time-scaled deltas.

use crate::consts::MAX_FRAME_DELTA_MS;

/// Deltas produced by one clock advance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tick {
    /// Unscaled wall-clock delta (ms), clamped. Drives timers, abilities, deadlines.
    pub raw_ms: f32,
    /// `raw_ms * time_scale`. Drives entity motion.
    pub scaled_ms: f32,
}

impl Tick {
    /// A tick with no time scaling applied
    pub fn unscaled(ms: f32) -> Self {
        Self {
            raw_ms: ms,
            scaled_ms: ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clock {
    last_timestamp: Option<f64>,
    time_scale: f32,
    max_delta_ms: f32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(MAX_FRAME_DELTA_MS)
    }
}

impl Clock {
    pub fn new(max_delta_ms: f32) -> Self {
        Self {
            last_timestamp: None,
            time_scale: 1.0,
            max_delta_ms: max_delta_ms.max(0.0),
        }
    }

    /// Advance to `timestamp` and return the scaled delta
    pub fn tick(&mut self, timestamp: f64) -> f32 {
        self.advance(timestamp).scaled_ms
    }

    /// Advance to `timestamp` and return both raw and scaled deltas.
    ///
    /// The first call after construction or `reset` yields zero.
    pub fn advance(&mut self, timestamp: f64) -> Tick {
        let raw = match self.last_timestamp {
            Some(last) => (timestamp - last) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);

        // NaN and negative deltas (non-monotonic sources) collapse to zero
        let raw = if raw.is_finite() {
            raw.clamp(0.0, self.max_delta_ms)
        } else {
            0.0
        };

        Tick {
            raw_ms: raw,
            scaled_ms: raw * self.time_scale,
        }
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        if !scale.is_finite() || scale < 0.0 {
            log::warn!("Ignoring invalid time scale {}", scale);
            return;
        }
        self.time_scale = scale;
    }

    pub fn max_delta_ms(&self) -> f32 {
        self.max_delta_ms
    }

    /// Forget the last timestamp so the next tick yields zero
    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }
}
