//! Pitch-pot: charge drifting pots with the cursors, then commit.
//!
//! A run is a number of stages. Each stage counts down, then the pots start
//! moving and a stage clock runs. Keeping a cursor over a pot charges it;
//! committing succeeds only when every pot of the stage is full.

use glam::Vec2;

use crate::config::{ConfigError, PitchPotConfig, StageKind, StageVariety};
use crate::sim::{
    commit, confine_to_rect, resolve_circle_pair, Clock, CommitOutcome, EndReason, EntityId,
    EntityKind, EntitySet, GameEvent, HeldKeys, InputEvent, Key, MissKind, Outcome, Phase, Pot,
    PotMode, Randomness, ScoreRule, Session, SimRng, StepError, Summary, Tick, Tier, TierValues,
};

use super::Minigame;

/// Charge needed for a pot to count on commit
const FULL_CHARGE: f32 = 100.0;
/// Stage clock period (ms)
const CLOCK_TICK_MS: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchPotTimer {
    /// Load the next stage after a successful commit
    Advance,
    /// One second of stage time elapsed
    StageClock,
}

pub struct PitchPot<R = SimRng> {
    config: PitchPotConfig,
    clock: Clock,
    rng: R,
    session: Session<PitchPotTimer>,
    held: HeldKeys,
    entities: EntitySet,
    rounds: u32,
    variety: Option<StageVariety>,
    seconds_left: u32,
    mouse_cursor: Vec2,
    keys_cursor: Vec2,
}

impl PitchPot<SimRng> {
    pub fn new(config: PitchPotConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, SimRng::new(seed))
    }
}

impl<R: Randomness> PitchPot<R> {
    pub fn with_rng(config: PitchPotConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(
            ScoreRule::Additive {
                per_combo: config.combo_bonus,
            },
            TierValues {
                perfect: config.base_points,
                great: config.base_points,
                good: config.base_points,
            },
            config.countdown,
        );
        let center = Vec2::new(config.width / 2.0, config.height / 2.0);
        Ok(Self {
            clock: Clock::default(),
            rng,
            session,
            held: HeldKeys::new(),
            entities: EntitySet::new(),
            rounds: config.rounds,
            variety: None,
            seconds_left: 0,
            mouse_cursor: center,
            keys_cursor: center,
            config,
        })
    }

    /// Start a run of `rounds` stages (at least one)
    pub fn start(&mut self, rounds: u32) {
        self.rounds = rounds.max(1);
        self.held.clear();
        self.clock.reset();
        self.keys_cursor = Vec2::new(self.config.width / 2.0, self.config.height / 2.0);
        self.session.begin();
        self.load_stage();
        log::info!("Pitch-pot started: {} rounds", self.rounds);
    }

    fn load_stage(&mut self) {
        let index = self.rng.index(self.config.varieties.len());
        let Some(variety) = self.config.varieties.get(index).copied() else {
            return;
        };
        let round = self.session.round_index();
        let speed = variety.speed_for_round(round) / 1000.0;

        let modes: &[PotMode] = match variety.kind {
            StageKind::Mouse => &[PotMode::Mouse],
            StageKind::Keys => &[PotMode::Keys],
            StageKind::Hybrid => &[PotMode::Hybrid],
            StageKind::Dual => &[PotMode::Mouse, PotMode::Keys],
        };

        self.entities.clear();
        let now = self.session.active_ms();
        for &mode in modes {
            let pos = Vec2::new(
                self.config.spawn_x.sample(&mut self.rng),
                self.config.spawn_y.sample(&mut self.rng),
            );
            let heading = crate::direction(self.rng.range(0.0, std::f32::consts::TAU));
            self.entities.spawn(
                EntityKind::Pot(Pot {
                    mode,
                    charge: 0.0,
                    completed: false,
                }),
                pos,
                heading * speed,
                now,
            );
        }

        self.variety = Some(variety);
        self.seconds_left = variety.seconds;
        self.session.emit(GameEvent::StageLoaded {
            round,
            seconds: variety.seconds,
        });
        log::info!(
            "Stage {} loaded: {:?} at {:.0} px/s, {} s",
            round + 1,
            variety.kind,
            speed * 1000.0,
            variety.seconds
        );
    }

    fn advance_stage(&mut self) {
        if self.session.round_index() + 1 >= self.rounds {
            self.session.end(EndReason::Completed);
            return;
        }
        if self.session.next_round() {
            self.load_stage();
        }
    }

    /// Commit the current stage. Ignored outside Active or while the next
    /// stage is already on its way.
    pub fn commit(&mut self) -> Option<CommitOutcome> {
        if !self.session.is_active() || self.session.timers().is_pending(PitchPotTimer::Advance) {
            return None;
        }

        let pots: Vec<EntityId> = self
            .entities
            .live()
            .filter(|e| e.pot().is_some())
            .map(|e| e.id)
            .collect();
        let mut charges: Vec<f32> = pots
            .iter()
            .filter_map(|id| self.entities.get(*id).and_then(|e| e.pot()))
            .map(|p| p.charge)
            .collect();

        let result = commit(&mut charges, FULL_CHARGE);
        let at = self.mouse_cursor;
        match result {
            CommitOutcome::Committed => {
                for id in &pots {
                    if let Some(pot) = self.entities.get_mut(*id).and_then(|e| e.pot_mut()) {
                        pot.completed = true;
                    }
                }
                let outcome = Outcome::Hit(Tier::Perfect);
                let base = self.config.base_points * pots.len() as f64;
                let points = self.session.record_with_base(outcome, base).unwrap_or(0.0);
                self.session.emit(GameEvent::Judged {
                    entity: None,
                    outcome,
                    at,
                });

                let timers = self.session.timers_mut();
                timers.cancel(PitchPotTimer::StageClock);
                timers.schedule(PitchPotTimer::Advance, self.config.advance_delay_ms);
                log::info!("Stage cleared (+{})", points);
            }
            CommitOutcome::Failed => {
                for (id, charge) in pots.iter().zip(&charges) {
                    if let Some(pot) = self.entities.get_mut(*id).and_then(|e| e.pot_mut()) {
                        pot.charge = *charge;
                    }
                }
                let outcome = Outcome::Miss(MissKind::FailedCommit);
                self.session.record(outcome);
                self.session.emit(GameEvent::Judged {
                    entity: None,
                    outcome,
                    at,
                });
                log::debug!("Commit failed, charges reset");
            }
        }
        Some(result)
    }

    fn move_cursors(&mut self, dt: f32) {
        self.mouse_cursor = self.held.pointer();

        let mut dir = Vec2::ZERO;
        if self.held.is_char_held('w') {
            dir.y -= 1.0;
        }
        if self.held.is_char_held('s') {
            dir.y += 1.0;
        }
        if self.held.is_char_held('a') {
            dir.x -= 1.0;
        }
        if self.held.is_char_held('d') {
            dir.x += 1.0;
        }
        let max = Vec2::new(self.config.width, self.config.height);
        self.keys_cursor =
            (self.keys_cursor + dir * self.config.keys_cursor_speed * dt).clamp(Vec2::ZERO, max);
    }

    fn move_pots(&mut self, dt: f32) {
        self.entities.update(dt);

        let ids: Vec<EntityId> = self
            .entities
            .live()
            .filter(|e| e.pot().is_some_and(|p| !p.completed))
            .map(|e| e.id)
            .collect();

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (Some(ea), Some(eb)) = (self.entities.get(a), self.entities.get(b)) else {
                    continue;
                };
                let (mut pa, mut va, mut pb, mut vb) = (ea.pos, ea.vel, eb.pos, eb.vel);
                let contact = resolve_circle_pair(
                    &mut pa,
                    &mut va,
                    &mut pb,
                    &mut vb,
                    self.config.pot_separation,
                );
                if contact.is_none() {
                    continue;
                }
                if let Some(e) = self.entities.get_mut(a) {
                    e.pos = pa;
                    e.vel = va;
                }
                if let Some(e) = self.entities.get_mut(b) {
                    e.pos = pb;
                    e.vel = vb;
                }
            }
        }

        let (min, max) = (self.config.arena_min, self.config.arena_max);
        for entity in self.entities.iter_mut().filter(|e| e.pot().is_some()) {
            confine_to_rect(&mut entity.pos, &mut entity.vel, min, max);
        }
    }

    fn charge_pots(&mut self, dt: f32) {
        let radius = self.config.charge_radius;
        let (mouse, keys) = (self.mouse_cursor, self.keys_cursor);
        let (rate, drain) = (self.config.charge_rate, self.config.drain_rate);

        for entity in self.entities.iter_mut() {
            let pos = entity.pos;
            let Some(pot) = entity.pot_mut() else {
                continue;
            };
            if pot.completed {
                continue;
            }
            let mouse_in = mouse.distance(pos) < radius;
            let keys_in = keys.distance(pos) < radius;
            let charging = match pot.mode {
                PotMode::Mouse => mouse_in,
                PotMode::Keys => keys_in,
                PotMode::Hybrid => mouse_in && keys_in,
            };
            pot.charge = if charging {
                (pot.charge + rate * dt).min(FULL_CHARGE)
            } else {
                (pot.charge - drain * dt).max(0.0)
            };
        }
    }

    fn tick_stage_clock(&mut self) {
        self.seconds_left = self.seconds_left.saturating_sub(1);
        self.session.emit(GameEvent::StageClock(self.seconds_left));
        if self.seconds_left == 0 {
            log::info!("Time's up on stage {}", self.session.round_index() + 1);
            self.session.end(EndReason::Deadline);
        }
    }

    pub fn variety(&self) -> Option<StageVariety> {
        self.variety
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn mouse_cursor(&self) -> Vec2 {
        self.mouse_cursor
    }

    pub fn keys_cursor(&self) -> Vec2 {
        self.keys_cursor
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn session(&self) -> &Session<PitchPotTimer> {
        &self.session
    }

    pub fn config(&self) -> &PitchPotConfig {
        &self.config
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }
}

impl<R: Randomness> Minigame for PitchPot<R> {
    fn id(&self) -> &str {
        "pitch-pot"
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
            InputEvent::KeyDown {
                key: Key::Space,
                repeat: false,
            }
            | InputEvent::PointerDown { .. } => {
                self.commit();
            }
            _ => {}
        }
    }

    fn step(&mut self, tick: Tick) -> Result<(), StepError> {
        let before = self.session.phase();
        if !matches!(before, Phase::Countdown | Phase::Active) {
            return Ok(());
        }

        self.move_cursors(tick.scaled_ms);

        let fired = self.session.advance(tick.raw_ms);
        if before == Phase::Countdown {
            // Pots start moving on the tick after the countdown ends
            if self.session.is_active() {
                self.session
                    .timers_mut()
                    .schedule_repeating(PitchPotTimer::StageClock, CLOCK_TICK_MS);
            }
            return Ok(());
        }
        for key in fired {
            match key {
                PitchPotTimer::StageClock => self.tick_stage_clock(),
                PitchPotTimer::Advance => self.advance_stage(),
            }
            if !self.session.is_active() {
                return Ok(());
            }
        }
        if !self.session.is_active() {
            return Ok(());
        }

        self.move_pots(tick.scaled_ms);
        self.charge_pots(tick.scaled_ms);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedRandom;

    fn config_with(kind: StageKind, base_speed: f32, seconds: u32) -> PitchPotConfig {
        PitchPotConfig {
            varieties: vec![StageVariety {
                kind,
                base_speed,
                speed_step: 0.0,
                seconds,
            }],
            ..PitchPotConfig::default()
        }
    }

    fn game_with(config: PitchPotConfig, rounds: u32) -> PitchPot<ScriptedRandom> {
        let mut game = PitchPot::with_rng(config, ScriptedRandom::constant(0.5)).unwrap();
        game.start(rounds);
        game
    }

    fn run(game: &mut PitchPot<ScriptedRandom>, ms: f32) {
        let mut left = ms;
        while left > 0.0 {
            let dt = left.min(100.0);
            game.step(Tick::unscaled(dt)).unwrap();
            left -= dt;
        }
    }

    fn pots(game: &PitchPot<ScriptedRandom>) -> Vec<(Vec2, Pot)> {
        game.entities()
            .live()
            .filter_map(|e| e.pot().map(|p| (e.pos, *p)))
            .collect()
    }

    fn point_at(game: &mut PitchPot<ScriptedRandom>, pos: Vec2) {
        game.handle_input(InputEvent::PointerMove { pos });
    }

    /// Dual stage with the mouse pot at (160, 300) and the keys pot at (640, 300)
    fn dual_apart() -> PitchPot<ScriptedRandom> {
        let rng = ScriptedRandom::new([0.0, 0.1, 0.5, 0.5, 0.9, 0.5, 0.5]);
        let mut game =
            PitchPot::with_rng(config_with(StageKind::Dual, 1.0, 45), rng).unwrap();
        game.start(3);
        game
    }

    #[test]
    fn test_stage_loads_with_countdown() {
        let mut game = game_with(PitchPotConfig::default(), 3);
        assert_eq!(game.phase(), Phase::Countdown);
        // index(4) at 0.5 picks the third variety
        assert_eq!(game.variety().unwrap().kind, StageKind::Hybrid);
        assert_eq!(game.seconds_left(), 40);
        assert!(game.drain_events().contains(&GameEvent::StageLoaded {
            round: 0,
            seconds: 40
        }));

        let start = pots(&game)[0].0;
        assert_eq!(start, Vec2::new(400.0, 300.0));
        run(&mut game, 3900.0);
        assert_eq!(game.phase(), Phase::Countdown);
        assert_eq!(pots(&game)[0].0, start);
        run(&mut game, 100.0);
        assert_eq!(game.phase(), Phase::Active);
    }

    #[test]
    fn test_keys_cursor_moves_during_countdown() {
        let mut game = game_with(PitchPotConfig::default(), 3);
        game.handle_input(InputEvent::KeyDown {
            key: Key::Char('d'),
            repeat: false,
        });
        run(&mut game, 500.0);
        assert!((game.keys_cursor().x - 600.0).abs() < 1e-3);
        run(&mut game, 1000.0);
        assert_eq!(game.keys_cursor().x, 800.0);
    }

    #[test]
    fn test_charge_and_drain() {
        let mut game = game_with(config_with(StageKind::Mouse, 1.0, 30), 3);
        let pot_pos = pots(&game)[0].0;
        point_at(&mut game, pot_pos);
        run(&mut game, 4000.0);

        run(&mut game, 400.0);
        assert!((pots(&game)[0].1.charge - 60.0).abs() < 0.1);
        run(&mut game, 400.0);
        assert_eq!(pots(&game)[0].1.charge, 100.0);

        point_at(&mut game, Vec2::ZERO);
        run(&mut game, 100.0);
        assert!((pots(&game)[0].1.charge - 70.0).abs() < 0.1);
    }

    #[test]
    fn test_commit_success_scores_and_advances() {
        let mut game = game_with(config_with(StageKind::Mouse, 1.0, 30), 3);
        let pot_pos = pots(&game)[0].0;
        point_at(&mut game, pot_pos);
        run(&mut game, 4000.0 + 700.0);

        assert_eq!(game.commit(), Some(CommitOutcome::Committed));
        assert!(pots(&game)[0].1.completed);
        // 100 * 1 pot + combo 1 * 10
        assert_eq!(game.session().score(), 110.0);
        assert_eq!(game.session().combo(), 1);
        // A second commit while the next stage is pending is ignored
        assert_eq!(game.commit(), None);

        run(&mut game, 1000.0);
        assert_eq!(game.phase(), Phase::Countdown);
        assert_eq!(game.session().round_index(), 1);
        assert!(!pots(&game)[0].1.completed);
    }

    #[test]
    fn test_failed_dual_commit_resets_both() {
        let mut game = dual_apart();
        let mouse_pot = pots(&game)
            .into_iter()
            .find(|(_, p)| p.mode == PotMode::Mouse)
            .unwrap()
            .0;
        point_at(&mut game, mouse_pot);
        run(&mut game, 4000.0 + 700.0);

        let charges: Vec<f32> = pots(&game).iter().map(|(_, p)| p.charge).collect();
        assert!(charges.contains(&100.0));

        assert_eq!(game.commit(), Some(CommitOutcome::Failed));
        assert!(pots(&game).iter().all(|(_, p)| p.charge == 0.0));
        assert_eq!(game.session().combo(), 0);
        assert_eq!(game.session().stats().miss, 1);
    }

    #[test]
    fn test_coincident_pots_are_separated() {
        let mut game = game_with(config_with(StageKind::Dual, 1.0, 45), 3);
        // Constant draws put both pots on the same spot
        let before = pots(&game);
        assert_eq!(before[0].0, before[1].0);

        run(&mut game, 4000.0 + 100.0);
        let after = pots(&game);
        assert!((after[0].0.distance(after[1].0) - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_pots_stay_in_arena() {
        let mut game = game_with(config_with(StageKind::Dual, 400.0, 45), 3);
        run(&mut game, 4000.0);
        for _ in 0..200 {
            run(&mut game, 100.0);
            for (pos, _) in pots(&game) {
                assert!(pos.x >= 40.0 && pos.x <= 760.0);
                assert!(pos.y >= 40.0 && pos.y <= 560.0);
            }
        }
    }

    #[test]
    fn test_stage_clock_runs_out() {
        let mut game = game_with(config_with(StageKind::Mouse, 1.0, 2), 3);
        run(&mut game, 4000.0);
        game.drain_events();

        run(&mut game, 1000.0);
        assert_eq!(game.seconds_left(), 1);
        run(&mut game, 1000.0);
        assert_eq!(game.phase(), Phase::Ended);

        let events = game.drain_events();
        assert!(events.contains(&GameEvent::StageClock(0)));
        assert!(events.contains(&GameEvent::Ended(EndReason::Deadline)));
    }

    #[test]
    fn test_victory_after_last_round() {
        let mut game = game_with(config_with(StageKind::Mouse, 1.0, 30), 1);
        let pot_pos = pots(&game)[0].0;
        point_at(&mut game, pot_pos);
        run(&mut game, 4000.0 + 700.0);
        assert_eq!(game.commit(), Some(CommitOutcome::Committed));

        // The stage clock stops once the stage is cleared
        run(&mut game, 1000.0);
        let summary = game.summary().unwrap();
        assert_eq!(summary.end_reason, EndReason::Completed);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.final_score, 110);
    }

    #[test]
    fn test_commit_ignored_during_countdown() {
        let mut game = game_with(PitchPotConfig::default(), 3);
        game.handle_input(InputEvent::KeyDown {
            key: Key::Space,
            repeat: false,
        });
        assert_eq!(game.session().stats().total(), 0);
    }
}
