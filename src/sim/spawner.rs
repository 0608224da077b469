//! Spawn scheduling
//!
//! - `Bounds`: validated [min, max] range for uniform draws
//! - `SpawnTimer`: fires after a randomized interval, redrawn after every spawn
//! - `SpawnBag`: shuffled finite multiset that bounds short-term repetition

use serde::{Deserialize, Serialize};

use super::rng::Randomness;
use crate::config::ConfigError;

/// Inclusive range for uniform draws
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    /// Build a range, rejecting inverted or non-finite bounds
    pub fn new(field: &'static str, min: f32, max: f32) -> Result<Self, ConfigError> {
        let bounds = Self { min, max };
        bounds.validate(field)?;
        Ok(bounds)
    }

    /// Degenerate range that always yields `value`
    pub const fn fixed(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::InvalidBounds {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn sample(&self, rng: &mut impl Randomness) -> f32 {
        rng.range(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }
}

/// Randomized spawn interval
#[derive(Debug, Clone)]
pub struct SpawnTimer {
    interval: Bounds,
    first_ms: f32,
    elapsed: f32,
    next: f32,
}

impl SpawnTimer {
    /// `first_ms` is the wait before the very first spawn
    pub fn new(interval: Bounds, first_ms: f32) -> Self {
        Self {
            interval,
            first_ms,
            elapsed: 0.0,
            next: first_ms,
        }
    }

    /// Accumulate `dt`; returns true when a spawn is due. The next interval is
    /// drawn from the bounds scaled by `rate_scale` (difficulty ramps shrink it).
    pub fn advance(&mut self, dt: f32, rate_scale: f32, rng: &mut impl Randomness) -> bool {
        self.elapsed += dt.max(0.0);
        if self.elapsed < self.next {
            return false;
        }
        self.elapsed = 0.0;
        self.next = self.interval.sample(rng) * rate_scale.max(0.0);
        true
    }

    /// Back to the initial wait, used when a session (re)starts
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.next = self.first_ms;
    }

    /// Current interval being waited on (ms)
    pub fn next_interval(&self) -> f32 {
        self.next
    }
}

/// Shuffled bag: every item of the template is drawn exactly once per refill
#[derive(Debug, Clone)]
pub struct SpawnBag<T> {
    template: Vec<T>,
    pending: Vec<T>,
    refills: u32,
}

impl<T: Clone> SpawnBag<T> {
    pub fn new(template: Vec<T>) -> Result<Self, ConfigError> {
        if template.is_empty() {
            return Err(ConfigError::EmptyBag);
        }
        Ok(Self {
            template,
            pending: Vec::new(),
            refills: 0,
        })
    }

    /// Draw the next item, refilling and reshuffling when the bag runs dry
    pub fn draw(&mut self, rng: &mut impl Randomness) -> T {
        loop {
            if let Some(item) = self.pending.pop() {
                return item;
            }
            self.refill(rng);
        }
    }

    fn refill(&mut self, rng: &mut impl Randomness) {
        self.pending.clear();
        self.pending.extend(self.template.iter().cloned());
        // Fisher-Yates
        for i in (1..self.pending.len()).rev() {
            let j = rng.index(i + 1);
            self.pending.swap(i, j);
        }
        self.refills += 1;
    }

    /// Items left before the next reshuffle
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn refills(&self) -> u32 {
        self.refills
    }

    pub fn capacity(&self) -> usize {
        self.template.len()
    }

    /// Empty the bag so the next draw reshuffles
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::rng::{ScriptedRandom, SimRng};

    #[test]
    fn test_bounds_reject_inverted() {
        assert!(Bounds::new("spawn", 800.0, 300.0).is_err());
        assert!(Bounds::new("spawn", f32::NAN, 300.0).is_err());
        assert!(Bounds::new("spawn", 300.0, 300.0).is_ok());
    }

    #[test]
    fn test_bounds_sample_in_range() {
        let bounds = Bounds::new("speed", 300.0, 600.0).unwrap();
        let mut rng = SimRng::new(3);
        for _ in 0..500 {
            assert!(bounds.contains(bounds.sample(&mut rng)));
        }
    }

    #[test]
    fn test_spawn_timer_first_wait_then_interval() {
        let mut rng = ScriptedRandom::constant(0.5);
        let mut timer = SpawnTimer::new(Bounds { min: 300.0, max: 800.0 }, 1000.0);
        assert!(!timer.advance(999.0, 1.0, &mut rng));
        assert!(timer.advance(1.0, 1.0, &mut rng));
        assert!((timer.next_interval() - 550.0).abs() < 1e-3);
        assert!(!timer.advance(549.0, 1.0, &mut rng));
        assert!(timer.advance(1.0, 1.0, &mut rng));
    }

    #[test]
    fn test_spawn_timer_zero_first_fires_immediately() {
        let mut rng = ScriptedRandom::constant(0.0);
        let mut timer = SpawnTimer::new(Bounds { min: 1050.0, max: 1950.0 }, 0.0);
        assert!(timer.advance(0.0, 1.0, &mut rng));
    }

    #[test]
    fn test_spawn_timer_rate_scale() {
        let mut rng = ScriptedRandom::constant(0.0);
        let mut timer = SpawnTimer::new(Bounds { min: 1000.0, max: 1000.0 }, 0.0);
        timer.advance(0.0, 0.5, &mut rng);
        assert!((timer.next_interval() - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_bag_rejects_empty() {
        assert!(SpawnBag::<char>::new(Vec::new()).is_err());
    }

    #[test]
    fn test_bag_each_key_twice_per_refill() {
        let mut rng = SimRng::new(2024);
        let mut bag = SpawnBag::new(vec!['w', 'a', 's', 'd', 'w', 'a', 's', 'd']).unwrap();

        for round in 1..=5 {
            let drawn: Vec<char> = (0..8).map(|_| bag.draw(&mut rng)).collect();
            for key in ['w', 'a', 's', 'd'] {
                assert_eq!(drawn.iter().filter(|&&k| k == key).count(), 2);
            }
            assert_eq!(bag.remaining(), 0);
            assert_eq!(bag.refills(), round);
        }
    }
}
