//! Archery: birds fly across the screen, click to shoot them before time runs out.
//!
//! The "Focus" ability slows everything down for a while; the session clock and
//! the ability itself keep running in real time.

use glam::Vec2;

use crate::config::{ArcheryConfig, ConfigError};
use crate::sim::collision::point_in_circle;
use crate::sim::{
    classify, Ability, AbilityTransition, Bird, Candidate, Clock, Countdown, EndReason,
    EntityKind, EntitySet, GameEvent, InputEvent, Key, MissKind, Oscillation, Outcome, Particle,
    Phase, Randomness, ScoreRule, Session, SimRng, SpawnTimer, StepError, Summary, Tick, Verdict,
};

use super::Minigame;

/// Splash drops per hit
const SPLASH_DROPS: u32 = 5;
/// Splash drop lifetime (ms)
const SPLASH_LIFE_MS: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcheryTimer {
    Deadline,
}

pub struct Archery<R = SimRng> {
    config: ArcheryConfig,
    clock: Clock,
    rng: R,
    session: Session<ArcheryTimer>,
    entities: EntitySet,
    spawner: SpawnTimer,
    focus: Ability,
}

impl Archery<SimRng> {
    pub fn new(config: ArcheryConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, SimRng::new(seed))
    }
}

impl<R: Randomness> Archery<R> {
    pub fn with_rng(config: ArcheryConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(
            ScoreRule::Multiplicative {
                rate: config.combo_rate,
            },
            config.values,
            Countdown::NONE,
        );
        Ok(Self {
            spawner: SpawnTimer::new(config.spawn_interval, config.first_spawn_ms),
            focus: Ability::new(
                config.focus_duration_ms,
                config.focus_cooldown_ms,
                config.focus_scale,
            ),
            clock: Clock::default(),
            entities: EntitySet::new(),
            rng,
            session,
            config,
        })
    }

    /// Start (or restart) a round; play begins immediately
    pub fn start(&mut self) {
        self.entities.clear();
        self.spawner.reset();
        self.focus.reset();
        self.clock.reset();
        self.clock.set_time_scale(1.0);
        self.session.begin();
        self.session
            .timers_mut()
            .schedule(ArcheryTimer::Deadline, self.config.duration_ms);
        log::info!("Archery started ({} ms)", self.config.duration_ms);
    }

    /// Shoot at `pos`. Only live birds whose hitbox contains the point compete.
    pub fn shoot(&mut self, pos: Vec2) -> Verdict {
        if !self.session.is_active() {
            return Verdict::NoMatch;
        }

        let radius = self.config.hitbox_radius;
        let candidates: Vec<Candidate> = self
            .entities
            .live()
            .filter(|e| e.bird().is_some())
            .filter(|e| point_in_circle(pos, e.render_pos(), radius))
            .map(|e| Candidate {
                entity: e.id,
                offset: pos.distance(e.render_pos()),
            })
            .collect();

        let verdict = classify(candidates, &self.config.window, self.config.search_range);
        match verdict {
            Verdict::Judged(judgment) => {
                self.entities.consume(judgment.entity);
                let outcome = Outcome::Hit(judgment.tier);
                let points = self.session.record(outcome).unwrap_or(0.0);
                self.session.emit(GameEvent::Judged {
                    entity: Some(judgment.entity),
                    outcome,
                    at: pos,
                });
                self.splash(pos);
                log::debug!("Bird {} down (+{})", judgment.entity, points);
            }
            Verdict::OutOfWindow { entity, offset } => {
                if self.config.out_of_window.is_late_miss(offset) {
                    self.entities.consume(entity);
                    let outcome = Outcome::Miss(MissKind::OutOfWindow);
                    self.session.record(outcome);
                    self.session.emit(GameEvent::Judged {
                        entity: Some(entity),
                        outcome,
                        at: pos,
                    });
                }
            }
            Verdict::NoMatch => {}
        }
        verdict
    }

    /// Try to activate Focus
    pub fn activate_focus(&mut self) -> bool {
        if !self.session.is_active() || !self.focus.activate() {
            return false;
        }
        self.clock.set_time_scale(self.focus.time_scale());
        self.session.emit(GameEvent::AbilityActivated);
        log::debug!("Focus active");
        true
    }

    fn splash(&mut self, at: Vec2) {
        for _ in 0..SPLASH_DROPS {
            let size = self.rng.range(5.0, 15.0);
            let dx = (self.rng.unit() - 0.5) * 80.0;
            let dy = (self.rng.unit() - 0.5) * 80.0;
            self.entities.spawn(
                EntityKind::Particle(Particle {
                    life: 1.0,
                    decay: 1.0 / SPLASH_LIFE_MS,
                    gravity: 0.0,
                    size,
                }),
                at,
                Vec2::new(dx, dy) / SPLASH_LIFE_MS,
                self.session.active_ms(),
            );
        }
    }

    fn spawn_bird(&mut self) {
        let c = &self.config;
        let base_y = self.rng.range(50.0, c.height * 0.5 + 50.0);
        let direction = self.rng.sign();
        let size_scale = c.size_scale.sample(&mut self.rng);
        let speed = c.speed.sample(&mut self.rng);
        let vy = (self.rng.unit() - 0.5) * speed * c.vertical_factor;
        let oscillation = Oscillation {
            freq: c.osc_freq.sample(&mut self.rng),
            amp: c.osc_amp.sample(&mut self.rng),
            phase: c.osc_phase.sample(&mut self.rng),
        };

        let x = if direction > 0.0 {
            -c.edge_margin
        } else {
            c.width + c.edge_margin
        };
        // px/s -> px/ms
        let vel = Vec2::new(speed * direction, vy) / 1000.0;

        let id = self.entities.spawn(
            EntityKind::Bird(Bird {
                direction,
                size_scale,
                oscillation,
            }),
            Vec2::new(x, base_y),
            vel,
            self.session.active_ms(),
        );
        log::debug!("Bird {} spawned at y {:.0}", id, base_y);
    }

    fn advance_focus(&mut self, raw_dt: f32) {
        match self.focus.advance(raw_dt) {
            Some(AbilityTransition::Expired) => {
                self.clock.set_time_scale(self.focus.time_scale());
                self.session.emit(GameEvent::AbilityExpired);
            }
            Some(AbilityTransition::Ready) => self.session.emit(GameEvent::AbilityReady),
            None => {}
        }
    }

    pub fn session(&self) -> &Session<ArcheryTimer> {
        &self.session
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    pub fn focus(&self) -> &Ability {
        &self.focus
    }

    pub fn config(&self) -> &ArcheryConfig {
        &self.config
    }

    /// Seconds left for the HUD
    pub fn time_remaining_ms(&self) -> f32 {
        self.session
            .timers()
            .remaining(ArcheryTimer::Deadline)
            .unwrap_or(0.0)
    }
}

impl<R: Randomness> Minigame for Archery<R> {
    fn id(&self) -> &str {
        "archery"
    }

    fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { pos } => {
                self.shoot(pos);
            }
            InputEvent::KeyDown {
                key: Key::Char(c),
                repeat: false,
            } if c == self.config.focus_key => {
                self.activate_focus();
            }
            _ => {}
        }
    }

    fn step(&mut self, tick: Tick) -> Result<(), StepError> {
        if self.session.phase() != Phase::Active {
            return Ok(());
        }

        self.advance_focus(tick.raw_ms);

        let fired = self.session.advance(tick.raw_ms);
        if fired.contains(&ArcheryTimer::Deadline) {
            self.session.end(EndReason::Deadline);
            return Ok(());
        }

        // Existing birds move first so a new bird starts exactly at the edge
        self.entities.update(tick.scaled_ms);
        if self.spawner.advance(tick.raw_ms, 1.0, &mut self.rng) {
            self.spawn_bird();
        }

        let (width, height) = (self.config.width, self.config.height);
        let (edge, vertical) = (self.config.edge_margin, self.config.vertical_margin);
        // Escaping birds are simply gone, not missed
        self.entities.prune(|e| match e.bird() {
            Some(bird) => {
                let off_x = if bird.direction > 0.0 {
                    e.pos.x > width + edge
                } else {
                    e.pos.x < -edge
                };
                off_x || e.pos.y < -vertical || e.pos.y > height + vertical
            }
            None => false,
        });

        let ids = self.entities.quarantine_non_finite();
        if !ids.is_empty() {
            return Err(StepError::NonFinite { ids });
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
