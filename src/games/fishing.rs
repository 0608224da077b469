//! Fishing: charge a cast, lure a bite, then wrestle the fish in.
//!
//! One session is one fish. Inside the Active phase the game moves through
//! three stages: Casting -> Waiting -> Struggle.

use std::f32::consts::TAU;

use crate::config::{ConfigError, FishingConfig};
use crate::sim::{
    Clock, Countdown, EndReason, GameEvent, GaugeZone, HeldKeys, InputEvent, Key, MissKind,
    Outcome, Phase, Randomness, ScoreRule, Session, SimRng, StepError, Summary, Tick, Tier,
};

use super::Minigame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FishingStage {
    /// Holding the pointer charges the power bar
    Casting,
    /// Line in the water, tapping to lure
    Waiting,
    /// Keep the needle inside the zone
    Struggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FishingTimer {
    Bite,
}

/// Power bar oscillation: up, a short rest at the top, then down
#[derive(Debug, Clone, Copy, PartialEq)]
enum PowerSwing {
    Rising,
    Resting(f32),
    Falling,
}

pub struct Fishing<R = SimRng> {
    config: FishingConfig,
    clock: Clock,
    rng: R,
    session: Session<FishingTimer>,
    held: HeldKeys,
    stage: FishingStage,
    power: f32,
    swing: PowerSwing,
    cast: Option<Tier>,
    taps: u32,
    required_taps: u32,
    hooked: bool,
    zone: GaugeZone,
    progress: f32,
    noise_phase: f32,
}

impl Fishing<SimRng> {
    pub fn new(config: FishingConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, SimRng::new(seed))
    }
}

impl<R: Randomness> Fishing<R> {
    pub fn with_rng(config: FishingConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(
            ScoreRule::Multiplicative { rate: 0.0 },
            config.values,
            Countdown::NONE,
        );
        Ok(Self {
            clock: Clock::default(),
            rng,
            session,
            held: HeldKeys::new(),
            stage: FishingStage::Casting,
            power: 0.0,
            swing: PowerSwing::Rising,
            cast: None,
            taps: 0,
            required_taps: 0,
            hooked: false,
            zone: GaugeZone::new(90.0, 40.0),
            progress: config.start_progress,
            noise_phase: 0.0,
            config,
        })
    }

    pub fn start(&mut self) {
        self.clock.reset();
        self.held.clear();
        self.stage = FishingStage::Casting;
        self.power = 0.0;
        self.swing = PowerSwing::Rising;
        self.cast = None;
        self.taps = 0;
        self.required_taps = 0;
        self.hooked = false;
        self.progress = self.config.start_progress;
        self.session.begin();
        log::info!("Fishing started");
    }

    fn release_cast(&mut self) {
        let power = self.power;
        self.power = 0.0;
        self.swing = PowerSwing::Rising;
        if power <= self.config.min_cast_power {
            return;
        }

        let tier = self.config.grade_cast(power);
        self.cast = tier;
        self.session.emit(GameEvent::CastGraded { power, tier });

        let span = self.config.taps_max - self.config.taps_min + 1;
        self.required_taps = self.config.taps_min + self.rng.index(span as usize) as u32;
        self.taps = 0;
        self.hooked = false;
        self.stage = FishingStage::Waiting;
        log::debug!(
            "Cast at {:.1} ({:?}), {} taps to a bite",
            power,
            tier,
            self.required_taps
        );
    }

    fn tap(&mut self) {
        if self.stage != FishingStage::Waiting || self.hooked {
            return;
        }
        self.taps += 1;
        self.session.emit(GameEvent::Tap {
            count: self.taps,
            required: self.required_taps,
        });
        if self.taps >= self.required_taps {
            self.hooked = true;
            self.session.emit(GameEvent::FishOn);
            self.session
                .timers_mut()
                .schedule(FishingTimer::Bite, self.config.bite_delay_ms);
        }
    }

    fn begin_struggle(&mut self) {
        let center = self.config.zone_center.sample(&mut self.rng);
        let width = self.config.zone_width.sample(&mut self.rng);
        self.zone = GaugeZone::new(center, width);
        self.noise_phase = self.rng.range(0.0, TAU);
        self.progress = self.config.start_progress;
        self.stage = FishingStage::Struggle;
        self.session.emit(GameEvent::StruggleStarted);
        log::debug!("Struggle: zone {:.0}° ± {:.0}°", center, width / 2.0);
    }

    fn charge_power(&mut self, dt: f32) {
        if !self.held.pointer_down() {
            self.power = 0.0;
            self.swing = PowerSwing::Rising;
            return;
        }

        let rate = self.config.power_rate;
        match self.swing {
            PowerSwing::Rising => {
                self.power += rate * dt;
                if self.power >= 100.0 {
                    self.power = 100.0;
                    self.swing = PowerSwing::Resting(self.config.power_pause_ms);
                }
            }
            PowerSwing::Resting(left) => {
                let left = left - dt;
                self.swing = if left <= 0.0 {
                    PowerSwing::Falling
                } else {
                    PowerSwing::Resting(left)
                };
            }
            PowerSwing::Falling => {
                self.power -= rate * dt;
                if self.power <= 0.0 {
                    self.power = 0.0;
                    self.swing = PowerSwing::Rising;
                }
            }
        }
    }

    /// Needle angle in degrees: pointer position plus the fish's pull
    pub fn needle_angle(&self) -> f32 {
        let pointer = (self.held.pointer().x / self.config.width).clamp(0.0, 1.0) * 180.0;
        let t = (self.session.active_ms() / 1000.0) as f32;
        let c = &self.config;
        let noise = (c.noise_fast_freq * t + self.noise_phase).sin() * c.noise_fast_amp
            + (c.noise_slow_freq * t + self.noise_phase).cos() * c.noise_slow_amp;
        pointer + noise
    }

    fn wrestle(&mut self, dt: f32) -> Result<(), StepError> {
        let angle = self.needle_angle();
        if self.zone.contains(angle) {
            self.progress += self.config.gain_rate * dt;
        } else {
            self.progress -= self.config.loss_rate * dt;
        }

        if !self.progress.is_finite() {
            self.progress = self.config.start_progress;
            return Err(StepError::NonFiniteResource {
                resource: "fishing progress",
            });
        }
        self.progress = self.progress.clamp(0.0, 100.0);

        if self.progress >= 100.0 {
            // Weak casts still land the fish, just for the smallest reward
            let outcome = Outcome::Hit(self.cast.unwrap_or(Tier::Good));
            self.session.record(outcome);
            self.session.emit(GameEvent::Judged {
                entity: None,
                outcome,
                at: self.held.pointer(),
            });
            self.session.end(EndReason::Completed);
        } else if self.progress <= 0.0 {
            let outcome = Outcome::Miss(MissKind::Expired);
            self.session.record(outcome);
            self.session.emit(GameEvent::Judged {
                entity: None,
                outcome,
                at: self.held.pointer(),
            });
            self.session.end(EndReason::Exhausted);
        }
        Ok(())
    }

    pub fn stage(&self) -> FishingStage {
        self.stage
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn zone(&self) -> GaugeZone {
        self.zone
    }

    /// Taps so far and taps needed
    pub fn taps(&self) -> (u32, u32) {
        (self.taps, self.required_taps)
    }

    pub fn session(&self) -> &Session<FishingTimer> {
        &self.session
    }

    pub fn config(&self) -> &FishingConfig {
        &self.config
    }
}

impl<R: Randomness> Minigame for Fishing<R> {
    fn id(&self) -> &str {
        "fishing"
    }

    fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn handle_input(&mut self, event: InputEvent) {
        self.held.apply(&event);
        match event {
            InputEvent::KeyDown {
                key: Key::Escape,
                repeat: false,
            } => {
                self.session.toggle_pause();
            }
            _ if !self.session.is_active() => {}
            InputEvent::PointerUp { .. } if self.stage == FishingStage::Casting => {
                self.release_cast();
            }
            InputEvent::PointerDown { .. }
            | InputEvent::KeyDown {
                key: Key::Space,
                repeat: false,
            } => self.tap(),
            _ => {}
        }
    }

    fn step(&mut self, tick: Tick) -> Result<(), StepError> {
        if self.session.phase() != Phase::Active {
            return Ok(());
        }

        let fired = self.session.advance(tick.raw_ms);
        if fired.contains(&FishingTimer::Bite) {
            self.begin_struggle();
            return Ok(());
        }

        match self.stage {
            FishingStage::Casting => self.charge_power(tick.scaled_ms),
            FishingStage::Waiting => {}
            FishingStage::Struggle => self.wrestle(tick.scaled_ms)?,
        }
        Ok(())
    }

    fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        self.session.drain_events()
    }

    fn summary(&self) -> Option<Summary> {
        self.session.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedRandom;
    use glam::Vec2;

    fn quiet_config() -> FishingConfig {
        FishingConfig {
            noise_fast_amp: 0.0,
            noise_slow_amp: 0.0,
            ..FishingConfig::default()
        }
    }

    fn game() -> Fishing<ScriptedRandom> {
        let mut game = Fishing::with_rng(quiet_config(), ScriptedRandom::constant(0.5)).unwrap();
        game.start();
        game
    }

    fn run(game: &mut Fishing<ScriptedRandom>, ms: f32) {
        let mut left = ms;
        while left > 0.0 {
            let dt = left.min(100.0);
            game.step(Tick::unscaled(dt)).unwrap();
            left -= dt;
        }
    }

    fn press(game: &mut Fishing<ScriptedRandom>, x: f32) {
        game.handle_input(InputEvent::PointerDown {
            pos: Vec2::new(x, 300.0),
        });
    }

    fn release(game: &mut Fishing<ScriptedRandom>, x: f32) {
        game.handle_input(InputEvent::PointerUp {
            pos: Vec2::new(x, 300.0),
        });
    }

    /// Cast at full power and lure until the struggle starts
    fn hook(game: &mut Fishing<ScriptedRandom>) {
        press(game, 640.0);
        run(game, 1700.0);
        release(game, 640.0);
        for _ in 0..4 {
            press(game, 640.0);
            release(game, 640.0);
        }
        run(game, 1000.0);
        assert_eq!(game.stage(), FishingStage::Struggle);
    }

    #[test]
    fn test_power_swings_while_held() {
        let mut game = game();
        press(&mut game, 640.0);
        run(&mut game, 1000.0);
        assert!((game.power() - 60.0).abs() < 1e-3);

        run(&mut game, 700.0);
        assert_eq!(game.power(), 100.0);
        // Rests at the top, then falls
        run(&mut game, 100.0);
        assert_eq!(game.power(), 100.0);
        run(&mut game, 200.0);
        assert!(game.power() < 100.0);
    }

    #[test]
    fn test_weak_release_does_not_cast() {
        let mut game = game();
        press(&mut game, 640.0);
        run(&mut game, 50.0);
        release(&mut game, 640.0);
        assert_eq!(game.stage(), FishingStage::Casting);
        assert_eq!(game.power(), 0.0);
    }

    #[test]
    fn test_space_does_not_cast() {
        let mut game = game();
        game.handle_input(InputEvent::KeyDown {
            key: Key::Space,
            repeat: false,
        });
        run(&mut game, 1000.0);
        assert_eq!(game.power(), 0.0);
    }

    #[test]
    fn test_cast_grade_and_taps() {
        let mut game = game();
        press(&mut game, 640.0);
        run(&mut game, 1600.0);
        release(&mut game, 640.0);
        assert_eq!(game.stage(), FishingStage::Waiting);
        assert!(game.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::CastGraded {
                tier: Some(Tier::Perfect),
                ..
            }
        )));

        // 1 + floor(0.5 * 6)
        assert_eq!(game.taps(), (0, 4));
        for _ in 0..3 {
            game.handle_input(InputEvent::KeyDown {
                key: Key::Space,
                repeat: false,
            });
        }
        run(&mut game, 2000.0);
        assert_eq!(game.stage(), FishingStage::Waiting);

        game.handle_input(InputEvent::KeyDown {
            key: Key::Space,
            repeat: false,
        });
        assert!(game.drain_events().contains(&GameEvent::FishOn));
        run(&mut game, 999.0);
        assert_eq!(game.stage(), FishingStage::Waiting);
        run(&mut game, 1.0);
        assert_eq!(game.stage(), FishingStage::Struggle);
    }

    #[test]
    fn test_needle_in_zone_lands_the_fish() {
        let mut game = game();
        hook(&mut game);
        // Zone centre 90°, width 40°; pointer in the middle is 90°
        assert_eq!(game.zone(), GaugeZone::new(90.0, 40.0));
        game.handle_input(InputEvent::PointerMove {
            pos: Vec2::new(640.0, 300.0),
        });

        run(&mut game, 100.0);
        assert!((game.progress() - 32.4).abs() < 1e-3);
        for _ in 0..100 {
            if game.phase() == Phase::Ended {
                break;
            }
            run(&mut game, 100.0);
        }

        let summary = game.summary().unwrap();
        assert_eq!(summary.end_reason, EndReason::Completed);
        assert_eq!(summary.stats.hits(), 1);
        assert!(summary.final_score > 0);
    }

    #[test]
    fn test_needle_outside_zone_loses_the_fish() {
        let mut game = game();
        hook(&mut game);
        game.handle_input(InputEvent::PointerMove {
            pos: Vec2::new(0.0, 300.0),
        });

        run(&mut game, 100.0);
        assert!((game.progress() - 28.2).abs() < 1e-3);
        for _ in 0..100 {
            if game.phase() == Phase::Ended {
                break;
            }
            run(&mut game, 100.0);
        }

        let summary = game.summary().unwrap();
        assert_eq!(summary.end_reason, EndReason::Exhausted);
        assert_eq!(summary.stats.miss, 1);
        assert_eq!(summary.final_score, 0);
    }

    #[test]
    fn test_pause_freezes_bite_timer() {
        let mut game = game();
        press(&mut game, 640.0);
        run(&mut game, 1600.0);
        release(&mut game, 640.0);
        for _ in 0..4 {
            press(&mut game, 640.0);
        }

        game.handle_input(InputEvent::KeyDown {
            key: Key::Escape,
            repeat: false,
        });
        run(&mut game, 5000.0);
        assert_eq!(game.stage(), FishingStage::Waiting);
        game.handle_input(InputEvent::KeyDown {
            key: Key::Escape,
            repeat: false,
        });
        run(&mut game, 1000.0);
        assert_eq!(game.stage(), FishingStage::Struggle);
    }
}
