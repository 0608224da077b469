//! Graceful Melody: six-lane falling-note rhythm game
//!
//! Notes fall towards a hit line; pressing the lane key as the head crosses it
//! scores by distance. Hold notes keep scoring while the key stays down and
//! break if released before their tail reaches the line.

use glam::Vec2;

use crate::config::{ConfigError, MelodyConfig};
use crate::consts::REFERENCE_FRAME_MS;
use crate::content::{BackingCue, NoteEvent, NoteType, Song};
use crate::per_frame_to_per_ms;
use crate::sim::{
    classify, judge_release, Candidate, Clock, EndReason, EntityId, EntityKind, EntitySet,
    GameEvent, HeldKeys, InputEvent, Key, MissKind, Note, NoteKind, Outcome, Particle, Phase,
    Randomness, ReleaseVerdict, ScoreRule, Session, SimRng, StepError, Summary, Tick, Verdict,
};

use super::Minigame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodyTimer {
    /// Song length reached; the session ends once the field is clear
    SongEnd,
}

pub struct Melody<R = SimRng> {
    config: MelodyConfig,
    clock: Clock,
    rng: R,
    session: Session<MelodyTimer>,
    held: HeldKeys,
    entities: EntitySet,
    song: Option<Song>,
    notes: Vec<NoteEvent>,
    backing: Vec<BackingCue>,
    next_note: usize,
    next_cue: usize,
    /// Fall speed in px per reference frame
    speed: f32,
    song_over: bool,
}

impl Melody<SimRng> {
    pub fn new(config: MelodyConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, SimRng::new(seed))
    }
}

impl<R: Randomness> Melody<R> {
    pub fn with_rng(config: MelodyConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(
            ScoreRule::Multiplicative {
                rate: config.combo_rate,
            },
            config.values,
            config.countdown,
        );
        Ok(Self {
            clock: Clock::default(),
            rng,
            session,
            held: HeldKeys::new(),
            entities: EntitySet::new(),
            song: None,
            notes: Vec::new(),
            backing: Vec::new(),
            next_note: 0,
            next_cue: 0,
            speed: config.base_speed,
            song_over: false,
            config,
        })
    }

    /// Load a song and start its countdown
    pub fn select_song(&mut self, song: &Song) -> Result<(), ConfigError> {
        song.validate(self.config.lane_count())?;
        self.song = Some(song.clone());
        self.restart();
        Ok(())
    }

    /// Replay the loaded song from the top. No-op without a song.
    pub fn restart(&mut self) {
        let Some(song) = &self.song else {
            return;
        };

        let tiled = song.tile(self.config.target_duration_ms, self.config.loop_gap_ms);
        self.speed = song.fall_speed(self.config.base_speed);
        let duration_ms = song.duration_ms() as f32;
        log::info!(
            "Song '{}' selected: {} notes, speed {:.2}",
            song.id,
            tiled.notes.len(),
            self.speed
        );

        self.notes = tiled.notes;
        self.backing = tiled.backing;
        self.next_note = 0;
        self.next_cue = 0;
        self.song_over = false;
        self.entities.clear();
        self.held.clear();
        self.clock.reset();
        self.session.begin();
        self.session
            .timers_mut()
            .schedule(MelodyTimer::SongEnd, duration_ms);
    }

    pub fn quit(&mut self) {
        self.entities.clear();
        self.held.clear();
        self.session.quit();
    }

    /// Time for a note to fall from spawn to the line (ms)
    fn travel_ms(&self) -> f64 {
        (self.config.travel_distance / self.speed * REFERENCE_FRAME_MS) as f64
    }

    fn fall_velocity(&self) -> f32 {
        per_frame_to_per_ms(self.speed)
    }

    /// Signed distance of a point from the hit line; positive = below it
    fn line_offset(&self, y: f32) -> f32 {
        y - self.config.hit_line_y
    }

    fn spawn_due_notes(&mut self, now: f64) {
        let horizon = now + self.travel_ms();
        while let Some(event) = self.notes.get(self.next_note).copied() {
            if event.t > horizon {
                break;
            }
            self.next_note += 1;

            let until_hit = (event.t - now) as f32;
            let y = self.config.hit_line_y - until_hit / REFERENCE_FRAME_MS * self.speed;
            let kind = match event.kind {
                NoteType::Tap => NoteKind::Tap,
                NoteType::Hold => NoteKind::Hold {
                    length: event.len as f32 / REFERENCE_FRAME_MS * self.speed,
                },
            };
            let id = self.entities.spawn(
                EntityKind::Note(Note {
                    lane: event.lane,
                    kind,
                    holding: false,
                    hit_time_ms: event.t,
                }),
                Vec2::new(self.config.lane_center_x(event.lane), y),
                Vec2::new(0.0, self.fall_velocity()),
                now,
            );
            log::trace!("Note {} spawned in lane {} at y {:.1}", id, event.lane, y);
        }
    }

    fn emit_due_cues(&mut self, now: f64) {
        while let Some(cue) = self.backing.get(self.next_cue) {
            if cue.t > now {
                break;
            }
            let chord = cue.chord.clone();
            self.next_cue += 1;
            self.session.emit(GameEvent::Cue { chord });
        }
    }

    /// Judge a lane press against the closest live, non-holding note
    pub fn press(&mut self, lane: usize) -> Verdict {
        if !self.session.is_active() {
            return Verdict::NoMatch;
        }

        let hit_line = self.config.hit_line_y;
        let candidates: Vec<Candidate> = self
            .entities
            .live()
            .filter_map(|e| e.note().map(|n| (e, n)))
            .filter(|(_, n)| n.lane == lane && !n.holding)
            .map(|(e, _)| Candidate {
                entity: e.id,
                offset: e.pos.y - hit_line,
            })
            .collect();

        let verdict = classify(candidates, &self.config.window, self.config.search_range);
        match verdict {
            Verdict::Judged(judgment) => {
                let outcome = Outcome::Hit(judgment.tier);
                self.session.record(outcome);
                self.hit_feedback(judgment.entity, lane, outcome);

                let is_hold = self
                    .entities
                    .get(judgment.entity)
                    .and_then(|e| e.note())
                    .is_some_and(Note::is_hold);
                if is_hold {
                    if let Some(note) = self
                        .entities
                        .get_mut(judgment.entity)
                        .and_then(|e| e.note_mut())
                    {
                        note.holding = true;
                    }
                } else {
                    self.entities.consume(judgment.entity);
                }
                log::debug!(
                    "Lane {} {} ({:.1} px)",
                    lane,
                    judgment.tier.label(),
                    judgment.deviation
                );
            }
            Verdict::OutOfWindow { entity, offset } => {
                if self.config.out_of_window.is_late_miss(offset) {
                    let outcome = Outcome::Miss(MissKind::OutOfWindow);
                    self.session.record(outcome);
                    self.entities.expire(entity);
                    self.hit_feedback(entity, lane, outcome);
                }
            }
            Verdict::NoMatch => {}
        }
        verdict
    }

    /// Lane key released: finish or break any hold in progress
    pub fn release(&mut self, lane: usize) {
        if !self.session.is_active() {
            return;
        }

        let holding: Vec<(EntityId, f32)> = self
            .entities
            .live()
            .filter_map(|e| e.note().map(|n| (e, n)))
            .filter(|(_, n)| n.lane == lane && n.holding)
            .map(|(e, n)| (e.id, self.line_offset(e.pos.y - n.length())))
            .collect();

        for (id, tail_offset) in holding {
            match judge_release(tail_offset, self.config.release_tolerance) {
                ReleaseVerdict::Completed => {
                    self.entities.consume(id);
                }
                ReleaseVerdict::Broken => {
                    self.session.record(Outcome::BrokenHold);
                    self.entities.expire(id);
                    self.session.emit(GameEvent::Judged {
                        entity: Some(id),
                        outcome: Outcome::BrokenHold,
                        at: Vec2::new(self.config.lane_center_x(lane), self.config.hit_line_y),
                    });
                    log::debug!("Hold {} broken {:.1} px early", id, -tail_offset);
                }
            }
        }
    }

    fn hit_feedback(&mut self, entity: EntityId, lane: usize, outcome: Outcome) {
        let at = Vec2::new(self.config.lane_center_x(lane), self.config.hit_line_y);
        self.session.emit(GameEvent::Judged {
            entity: Some(entity),
            outcome,
            at,
        });
        if !outcome.is_success() {
            return;
        }

        let now = self.session.active_ms();
        for _ in 0..self.config.particles_per_hit {
            let vel = Vec2::new(self.rng.unit() - 0.5, self.rng.unit() - 0.5) * 10.0;
            let size = self.rng.range(1.0, 5.0);
            self.entities.spawn(
                EntityKind::Particle(Particle {
                    life: 1.0,
                    decay: per_frame_to_per_ms(0.03),
                    gravity: per_frame_to_per_ms(per_frame_to_per_ms(0.2)),
                    size,
                }),
                at,
                vel / REFERENCE_FRAME_MS,
                now,
            );
        }
    }

    /// Score held notes and complete those whose tail crossed the line
    fn sustain_holds(&mut self, dt: f32) {
        let hit_line = self.config.hit_line_y;
        let per_ms = self.config.hold_points_per_ms;
        let mut points = 0.0;
        let mut completed = Vec::new();

        for entity in self.entities.live() {
            let Some(note) = entity.note() else {
                continue;
            };
            if !note.holding {
                continue;
            }
            let key_down = self
                .config
                .lane_keys
                .get(note.lane)
                .is_some_and(|key| self.held.is_char_held(*key));
            if key_down {
                points += per_ms * dt as f64;
            }
            if entity.pos.y - note.length() >= hit_line {
                completed.push(entity.id);
            }
        }

        self.session.add_score(points);
        for id in completed {
            self.entities.consume(id);
        }
    }

    /// Non-holding notes that fell past the window are implicit misses
    fn expire_missed(&mut self) {
        let limit = self.config.hit_line_y + self.config.window.miss_cutoff();
        let missed: Vec<(EntityId, usize)> = self
            .entities
            .live()
            .filter_map(|e| e.note().map(|n| (e, n)))
            .filter(|(e, n)| !n.holding && e.pos.y > limit)
            .map(|(e, n)| (e.id, n.lane))
            .collect();

        for (id, lane) in missed {
            let outcome = Outcome::Miss(MissKind::Expired);
            self.session.record(outcome);
            self.entities.expire(id);
            self.session.emit(GameEvent::Judged {
                entity: Some(id),
                outcome,
                at: Vec2::new(self.config.lane_center_x(lane), self.config.hit_line_y),
            });
        }
    }

    fn field_is_clear(&self) -> bool {
        self.next_note >= self.notes.len() && self.entities.targets().next().is_none()
    }

    pub fn song_id(&self) -> Option<&str> {
        self.song.as_ref().map(|s| s.id.as_str())
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn session(&self) -> &Session<MelodyTimer> {
        &self.session
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    pub fn config(&self) -> &MelodyConfig {
        &self.config
    }
}

impl<R: Randomness> Minigame for Melody<R> {
    fn id(&self) -> &str {
        self.song_id().unwrap_or("melody")
    }

    fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn handle_input(&mut self, event: InputEvent) {
        self.held.apply(&event);
        match event {
            InputEvent::KeyDown { repeat: true, .. } => {}
            InputEvent::KeyDown { key, .. } => {
                if let Some(lane) = key.char().and_then(|c| self.config.lane_for_key(c)) {
                    self.press(lane);
                    return;
                }
                match key {
                    Key::Space | Key::Escape => {
                        self.session.toggle_pause();
                    }
                    Key::Char('r')
                        if matches!(
                            self.session.phase(),
                            Phase::Active | Phase::Paused | Phase::Ended
                        ) =>
                    {
                        self.restart();
                    }
                    Key::Char('q') => self.quit(),
                    _ => {}
                }
            }
            InputEvent::KeyUp { key } => {
                if let Some(lane) = key.char().and_then(|c| self.config.lane_for_key(c)) {
                    self.release(lane);
                }
            }
            _ => {}
        }
    }

    fn step(&mut self, tick: Tick) -> Result<(), StepError> {
        if !matches!(self.session.phase(), Phase::Countdown | Phase::Active) {
            return Ok(());
        }

        let fired = self.session.advance(tick.raw_ms);
        if fired.contains(&MelodyTimer::SongEnd) {
            self.song_over = true;
        }
        if !self.session.is_active() {
            return Ok(());
        }

        let now = self.session.active_ms();
        self.emit_due_cues(now);
        self.entities.update(tick.scaled_ms);
        self.spawn_due_notes(now);
        self.sustain_holds(tick.scaled_ms);
        self.expire_missed();
        self.entities.prune(|_| false);

        let ids = self.entities.quarantine_non_finite();

        if self.song_over && self.field_is_clear() {
            self.session.end(EndReason::Completed);
        }

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
    use crate::sim::{ScriptedRandom, Tier};

    fn note(t: f64, lane: usize) -> NoteEvent {
        NoteEvent {
            t,
            lane,
            kind: NoteType::Tap,
            len: 0.0,
        }
    }

    fn hold(t: f64, lane: usize, len: f64) -> NoteEvent {
        NoteEvent {
            t,
            lane,
            kind: NoteType::Hold,
            len,
        }
    }

    fn song(duration: f64, notes: Vec<NoteEvent>) -> Song {
        Song {
            id: "plum-blossom".into(),
            title: "Plum Blossom".into(),
            subtitle: String::new(),
            description: String::new(),
            duration,
            difficulty_multiplier: 1.0,
            difficulty: None,
            speed: Some(6.0),
            backing: vec![
                BackingCue {
                    t: 0.0,
                    chord: vec![0, 4],
                },
                BackingCue {
                    t: 1500.0,
                    chord: vec![2],
                },
            ],
            notes,
        }
    }

    /// Game past its countdown with the given notes loaded
    fn game_with(notes: Vec<NoteEvent>) -> Melody<ScriptedRandom> {
        let config = MelodyConfig {
            target_duration_ms: 10_000.0,
            ..MelodyConfig::default()
        };
        let mut game = Melody::with_rng(config, ScriptedRandom::constant(0.5)).unwrap();
        game.select_song(&song(10.0, notes)).unwrap();
        assert_eq!(game.phase(), Phase::Countdown);
        run(&mut game, 3200.0);
        assert_eq!(game.phase(), Phase::Active);
        game
    }

    fn run(game: &mut Melody<ScriptedRandom>, ms: f32) {
        let mut left = ms;
        while left > 0.0 {
            let dt = left.min(50.0);
            game.step(Tick::unscaled(dt)).unwrap();
            left -= dt;
        }
    }

    fn key_down(game: &mut Melody<ScriptedRandom>, c: char) {
        game.handle_input(InputEvent::KeyDown {
            key: Key::Char(c),
            repeat: false,
        });
    }

    fn key_up(game: &mut Melody<ScriptedRandom>, c: char) {
        game.handle_input(InputEvent::KeyUp { key: Key::Char(c) });
    }

    fn live_notes(game: &Melody<ScriptedRandom>) -> usize {
        game.entities().targets().count()
    }

    #[test]
    fn test_notes_wait_for_countdown() {
        let config = MelodyConfig::default();
        let mut game = Melody::with_rng(config, ScriptedRandom::constant(0.5)).unwrap();
        game.select_song(&song(10.0, vec![note(1000.0, 0)])).unwrap();
        run(&mut game, 3000.0);
        assert_eq!(game.phase(), Phase::Countdown);
        assert_eq!(live_notes(&game), 0);
    }

    fn tier(verdict: Verdict) -> Option<Tier> {
        match verdict {
            Verdict::Judged(judgment) => Some(judgment.tier),
            _ => None,
        }
    }

    #[test]
    fn test_note_spawns_on_travel_path() {
        let game = game_with(vec![note(1000.0, 2)]);
        // 1000 ms out at 6 px per reference frame
        let note = game.entities().targets().next().unwrap();
        assert!((note.pos.x - 800.0 / 6.0 * 2.5).abs() < 1e-3);
        assert!((note.pos.y - (650.0 - 1000.0 / 16.66 * 6.0)).abs() < 1e-2);
        assert!((note.vel.y - 6.0 / 16.66).abs() < 1e-6);
    }

    #[test]
    fn test_on_time_press_is_perfect() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        run(&mut game, 1000.0);

        let head = game.entities().targets().next().unwrap().pos.y;
        assert!((head - 650.0).abs() < 0.1);
        assert_eq!(tier(game.press(0)), Some(Tier::Perfect));
        // 100 * (1 + 1 * 0.01)
        assert!((game.session().score() - 101.0).abs() < 1e-6);
        run(&mut game, 50.0);
        assert_eq!(live_notes(&game), 0);
    }

    #[test]
    fn test_wrong_lane_is_ignored() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        run(&mut game, 1000.0);
        key_down(&mut game, 'd');
        assert_eq!(game.session().score(), 0.0);
        assert_eq!(live_notes(&game), 1);
    }

    #[test]
    fn test_late_band_grades_good() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        // 200 ms early: ~72 px above the line, between good and cutoff
        run(&mut game, 800.0);
        assert_eq!(tier(game.press(0)), Some(Tier::Good));
        assert!((game.session().score() - 50.5).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_window_press_leaves_note_then_expires() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        // 250 ms early: ~90.04 px above the line, past the cutoff
        run(&mut game, 750.0);
        assert!(matches!(game.press(0), Verdict::OutOfWindow { .. }));
        assert_eq!(live_notes(&game), 1);
        assert_eq!(game.session().stats().miss, 0);

        run(&mut game, 600.0);
        assert_eq!(live_notes(&game), 0);
        assert_eq!(game.session().stats().miss, 1);
        assert_eq!(game.session().combo(), 0);
    }

    #[test]
    fn test_hold_broken_on_early_release() {
        let mut game = game_with(vec![note(500.0, 1), hold(1000.0, 0, 1000.0)]);
        run(&mut game, 500.0);
        key_down(&mut game, 'd');
        assert_eq!(game.session().combo(), 1);

        run(&mut game, 500.0);
        key_down(&mut game, 's');
        assert_eq!(game.session().combo(), 2);
        run(&mut game, 500.0);
        key_up(&mut game, 's');

        let stats = game.session().stats();
        assert_eq!(stats.broken, 1);
        assert_eq!(stats.miss, 0);
        assert_eq!(game.session().combo(), 0);
        assert_eq!(game.session().max_combo(), 2);
        run(&mut game, 50.0);
        assert_eq!(live_notes(&game), 0);
    }

    #[test]
    fn test_hold_scores_while_held_and_completes() {
        let mut game = game_with(vec![hold(1000.0, 0, 1000.0)]);
        run(&mut game, 1000.0);
        key_down(&mut game, 's');
        let after_press = game.session().score();
        let held_note = game
            .entities()
            .targets()
            .find(|e| e.note().is_some_and(|n| n.holding))
            .map(|e| e.id)
            .expect("hold note should be held");

        run(&mut game, 1100.0);
        // Tail crossed the line at 2000 ms; the next loop's copy may already be falling
        assert!(game.entities().get(held_note).is_none_or(|e| !e.is_live()));
        let held = game.session().score() - after_press;
        assert!(held > 29.0 && held < 34.0, "held points {held}");

        key_up(&mut game, 's');
        assert_eq!(game.session().stats().broken, 0);
    }

    #[test]
    fn test_release_within_tolerance_completes() {
        let mut game = game_with(vec![hold(1000.0, 0, 1000.0)]);
        run(&mut game, 1000.0);
        key_down(&mut game, 's');
        // Tail ~36 px above the line
        run(&mut game, 900.0);
        key_up(&mut game, 's');
        assert_eq!(game.session().stats().broken, 0);
        run(&mut game, 50.0);
        assert_eq!(live_notes(&game), 0);
    }

    #[test]
    fn test_backing_cues_in_order() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        run(&mut game, 2000.0);
        let cues: Vec<Vec<usize>> = game
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::Cue { chord } => Some(chord),
                _ => None,
            })
            .collect();
        assert_eq!(cues, vec![vec![0, 4], vec![2]]);
    }

    #[test]
    fn test_song_end_waits_for_clear_field() {
        let config = MelodyConfig {
            target_duration_ms: 3000.0,
            ..MelodyConfig::default()
        };
        let mut game = Melody::with_rng(config, ScriptedRandom::constant(0.5)).unwrap();
        game.select_song(&song(3.0, vec![note(1000.0, 0)])).unwrap();
        run(&mut game, 3200.0);

        run(&mut game, 2950.0);
        assert_eq!(game.phase(), Phase::Active);
        run(&mut game, 50.0);
        assert_eq!(game.phase(), Phase::Ended);

        let summary = game.summary().unwrap();
        assert_eq!(summary.end_reason, EndReason::Completed);
        assert_eq!(summary.stats.miss, 1);
        assert_eq!(game.id(), "plum-blossom");
    }

    #[test]
    fn test_pause_restart_and_quit() {
        let mut game = game_with(vec![note(1000.0, 0)]);
        run(&mut game, 200.0);
        game.handle_input(InputEvent::KeyDown {
            key: Key::Escape,
            repeat: false,
        });
        assert_eq!(game.phase(), Phase::Paused);
        let y = game.entities().targets().next().unwrap().pos.y;
        run(&mut game, 500.0);
        assert_eq!(game.entities().targets().next().unwrap().pos.y, y);

        key_down(&mut game, 'r');
        assert_eq!(game.phase(), Phase::Countdown);
        assert_eq!(live_notes(&game), 0);

        key_down(&mut game, 'q');
        assert_eq!(game.phase(), Phase::Menu);
    }

    #[test]
    fn test_invalid_song_rejected() {
        let mut game = Melody::with_rng(MelodyConfig::default(), ScriptedRandom::constant(0.5))
            .unwrap();
        let result = game.select_song(&song(10.0, vec![note(1000.0, 9)]));
        assert!(matches!(result, Err(ConfigError::LaneOutOfRange { .. })));
        assert_eq!(game.phase(), Phase::Menu);
    }
}
