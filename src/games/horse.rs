//! Horse taming: directional prompts fly out of the centre towards a ring.
//!
//! Press the matching key as a prompt crosses the ring. Hits build taming
//! progress and restore stamina; misses drain stamina. The horse is tamed at
//! 100 progress and the rider thrown at 0 stamina.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, HorseConfig};
use crate::per_frame_to_per_ms;
use crate::sim::{
    classify, Candidate, Clock, Countdown, EndReason, Entity, EntityId, EntityKind, EntitySet,
    GameEvent, InputEvent, Key, MissKind, Outcome, Particle, Phase, Prompt, Randomness,
    ScoreRule, Session, SimRng, SpawnBag, SpawnTimer, StepError, Summary, Tick, Tier, Verdict,
};

use super::Minigame;

/// End-of-session title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TamingRank {
    Grandmaster,
    Master,
    Disciple,
    Novice,
    /// Thrown before the horse was tamed
    Unworthy,
}

impl TamingRank {
    pub fn assess(tamed: bool, max_combo: u32, stamina: f32) -> Self {
        if !tamed {
            TamingRank::Unworthy
        } else if max_combo >= 20 && stamina >= 80.0 {
            TamingRank::Grandmaster
        } else if max_combo >= 15 && stamina >= 50.0 {
            TamingRank::Master
        } else if max_combo >= 10 {
            TamingRank::Disciple
        } else {
            TamingRank::Novice
        }
    }
}

/// Travel direction for a prompt key; screen y grows downward
fn heading(key: char) -> Vec2 {
    match key {
        'w' => Vec2::NEG_Y,
        's' => Vec2::Y,
        'a' => Vec2::NEG_X,
        'd' => Vec2::X,
        _ => Vec2::ZERO,
    }
}

pub struct HorseTaming<R = SimRng> {
    config: HorseConfig,
    clock: Clock,
    rng: R,
    session: Session<()>,
    entities: EntitySet,
    spawner: SpawnTimer,
    bag: SpawnBag<char>,
    progress: f32,
    stamina: f32,
}

impl HorseTaming<SimRng> {
    pub fn new(config: HorseConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, SimRng::new(seed))
    }
}

impl<R: Randomness> HorseTaming<R> {
    pub fn with_rng(config: HorseConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(
            ScoreRule::Additive {
                per_combo: config.combo_bonus,
            },
            config.progress_gain,
            Countdown::NONE,
        );
        Ok(Self {
            clock: Clock::default(),
            rng,
            session,
            entities: EntitySet::new(),
            spawner: SpawnTimer::new(config.spawn_jitter.scaled(config.base_spawn_ms), 0.0),
            bag: SpawnBag::new(config.bag.clone())?,
            progress: 0.0,
            stamina: config.start_stamina,
            config,
        })
    }

    pub fn start(&mut self) {
        self.entities.clear();
        self.spawner.reset();
        self.bag.reset();
        self.clock.reset();
        self.progress = 0.0;
        self.stamina = self.config.start_stamina;
        self.session.begin();
        log::info!("Horse taming started");
    }

    /// Signed distance of a prompt past the ring
    fn ring_offset(&self, entity: &Entity) -> f32 {
        entity.pos.distance(self.config.center()) - self.config.ring_radius
    }

    /// Judge a direction key against the prompt closest to the ring
    pub fn press(&mut self, key: char) -> Verdict {
        if !self.session.is_active() {
            return Verdict::NoMatch;
        }

        let candidates: Vec<Candidate> = self
            .entities
            .live()
            .filter(|e| e.prompt().is_some())
            .map(|e| Candidate {
                entity: e.id,
                offset: self.ring_offset(e),
            })
            .collect();

        let verdict = classify(candidates, &self.config.window, self.config.expire_margin);
        match verdict {
            Verdict::Judged(judgment) => {
                let expected = self
                    .entities
                    .get(judgment.entity)
                    .and_then(|e| e.prompt())
                    .map(|p| p.key);
                if expected == Some(key) {
                    self.hit(judgment.entity, judgment.tier);
                } else {
                    self.miss(judgment.entity, MissKind::WrongInput);
                }
            }
            Verdict::OutOfWindow { entity, offset } => {
                if self.config.out_of_window.is_late_miss(offset) {
                    self.miss(entity, MissKind::OutOfWindow);
                }
            }
            Verdict::NoMatch => {}
        }
        verdict
    }

    fn hit(&mut self, id: EntityId, tier: Tier) {
        let at = self.entities.get(id).map_or(self.config.center(), |e| e.pos);
        self.entities.consume(id);

        let outcome = Outcome::Hit(tier);
        let gain = self.session.record(outcome).unwrap_or(0.0) as f32;
        self.progress = (self.progress + gain).min(100.0);
        self.stamina = (self.stamina + self.config.stamina_gain.value(tier) as f32).min(100.0);
        self.session.emit(GameEvent::Judged {
            entity: Some(id),
            outcome,
            at,
        });
        self.burst(at, self.config.particles_for(tier));
        log::debug!(
            "Prompt {} {}: progress {:.1}, stamina {:.0}",
            id,
            tier.label(),
            self.progress,
            self.stamina
        );
    }

    fn miss(&mut self, id: EntityId, kind: MissKind) {
        let at = self.entities.get(id).map_or(self.config.center(), |e| e.pos);
        self.entities.expire(id);

        let outcome = Outcome::Miss(kind);
        self.session.record(outcome);
        self.stamina = (self.stamina - self.config.miss_penalty).max(0.0);
        self.session.emit(GameEvent::Judged {
            entity: Some(id),
            outcome,
            at,
        });
        log::debug!("Prompt {} missed ({:?}), stamina {:.0}", id, kind, self.stamina);
    }

    fn burst(&mut self, at: Vec2, count: u32) {
        let now = self.session.active_ms();
        for _ in 0..count {
            let angle = self.rng.range(0.0, std::f32::consts::TAU);
            let speed = per_frame_to_per_ms(self.rng.range(0.0, 8.0));
            self.entities.spawn(
                EntityKind::Particle(Particle {
                    life: 1.0,
                    decay: per_frame_to_per_ms(0.03),
                    gravity: 0.0,
                    size: 4.0,
                }),
                at,
                crate::direction(angle) * speed,
                now,
            );
        }
    }

    fn spawn_prompt(&mut self) {
        let key = self.bag.draw(&mut self.rng);
        let vel = heading(key) * self.config.prompt_speed;
        let id = self.entities.spawn(
            EntityKind::Prompt(Prompt { key }),
            self.config.center(),
            vel,
            self.session.active_ms(),
        );
        log::debug!("Prompt {} '{}' spawned", id, key);
    }

    fn expire_overdue(&mut self) {
        let margin = self.config.expire_margin;
        let overdue: Vec<EntityId> = self
            .entities
            .live()
            .filter(|e| e.prompt().is_some() && self.ring_offset(e) > margin)
            .map(|e| e.id)
            .collect();
        for id in overdue {
            self.miss(id, MissKind::Expired);
        }
    }

    fn check_resources(&mut self) -> Result<(), StepError> {
        if !self.progress.is_finite() {
            self.progress = 0.0;
            return Err(StepError::NonFiniteResource {
                resource: "taming progress",
            });
        }
        if !self.stamina.is_finite() {
            self.stamina = self.config.start_stamina;
            return Err(StepError::NonFiniteResource {
                resource: "stamina",
            });
        }

        if self.stamina <= 0.0 {
            self.session.end(EndReason::Exhausted);
        } else if self.progress >= 100.0 {
            self.session.end(EndReason::Completed);
        }
        Ok(())
    }

    /// Title earned, once the session has ended
    pub fn rank(&self) -> Option<TamingRank> {
        let summary = self.session.summary()?;
        Some(TamingRank::assess(
            summary.end_reason == EndReason::Completed,
            summary.max_combo,
            self.stamina,
        ))
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    pub fn session(&self) -> &Session<()> {
        &self.session
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    pub fn config(&self) -> &HorseConfig {
        &self.config
    }
}

impl<R: Randomness> Minigame for HorseTaming<R> {
    fn id(&self) -> &str {
        "horse"
    }

    fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn handle_input(&mut self, event: InputEvent) {
        let InputEvent::KeyDown { key, repeat: false } = event else {
            return;
        };
        match key {
            Key::Escape => {
                self.session.toggle_pause();
            }
            Key::Char(c) if self.config.bag.contains(&c) => {
                self.press(c);
            }
            _ => {}
        }
    }

    fn step(&mut self, tick: Tick) -> Result<(), StepError> {
        if self.session.phase() != Phase::Active {
            return Ok(());
        }

        self.session.advance(tick.raw_ms);
        self.entities.update(tick.scaled_ms);
        self.expire_overdue();

        // Spawns speed up as the horse calms down
        let rate_scale = 1.0 - self.progress / 200.0;
        if self.spawner.advance(tick.raw_ms, rate_scale, &mut self.rng) {
            self.spawn_prompt();
        }
        self.entities.prune(|_| false);

        let ids = self.entities.quarantine_non_finite();
        self.check_resources()?;
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
