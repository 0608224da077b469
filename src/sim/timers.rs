//! Tick-driven timers
//!
//! Countdowns, cooldowns and delayed transitions are plain values advanced from
//! clock deltas inside the tick. Nothing fires outside a tick, and clearing the
//! registry on restart drops every pending timer of the previous session.

/// A one-shot countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    duration: f32,
    elapsed: f32,
    fired: bool,
}

impl Timer {
    pub fn new(duration_ms: f32) -> Self {
        Self {
            duration: duration_ms.max(0.0),
            elapsed: 0.0,
            fired: false,
        }
    }

    /// Advance by `dt`. Returns true on the tick the timer finishes; a
    /// zero-length timer finishes on its first advance.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.fired {
            return false;
        }
        self.elapsed += dt.max(0.0);
        self.fired = self.elapsed >= self.duration;
        self.fired
    }

    /// True once `advance` has reported the finish
    pub fn is_finished(&self) -> bool {
        self.fired
    }

    /// Time left before finishing (ms)
    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }

    /// Time past the deadline on the finishing tick (ms)
    pub fn overshoot(&self) -> f32 {
        (self.elapsed - self.duration).max(0.0)
    }

    /// Fraction completed in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }
}

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    timer: Timer,
    repeat: bool,
}

/// Keyed timers owned by a session
#[derive(Debug, Clone)]
pub struct TimerRegistry<K> {
    entries: Vec<Entry<K>>,
}

impl<K> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq + std::fmt::Debug> TimerRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot timer, replacing any pending timer with the same key
    pub fn schedule(&mut self, key: K, delay_ms: f32) {
        self.insert(key, delay_ms, false);
    }

    /// Schedule a timer that re-arms itself every `period_ms`
    pub fn schedule_repeating(&mut self, key: K, period_ms: f32) {
        self.insert(key, period_ms, true);
    }

    fn insert(&mut self, key: K, ms: f32, repeat: bool) {
        self.cancel(key);
        self.entries.push(Entry {
            key,
            timer: Timer::new(ms),
            repeat,
        });
    }

    /// Returns true if a timer was pending
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn remaining(&self, key: K) -> Option<f32> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.timer.remaining())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance every timer by `dt` and return the keys that fired, in schedule
    /// order. A repeating timer fires once per elapsed period.
    pub fn advance(&mut self, dt: f32) -> Vec<K> {
        let mut fired = Vec::new();

        for entry in &mut self.entries {
            if !entry.timer.advance(dt) {
                continue;
            }
            fired.push(entry.key);

            if entry.repeat && entry.timer.duration() > 0.0 {
                let period = entry.timer.duration();
                let mut carry = entry.timer.overshoot();
                while carry >= period {
                    fired.push(entry.key);
                    carry -= period;
                }
                entry.timer = Timer::new(period);
                entry.timer.advance(carry);
            }
        }

        self.entries
            .retain(|e| (e.repeat && e.timer.duration() > 0.0) || !e.timer.is_finished());
        fired
    }
}
