//! Session state machine
//!
//! Phases: Menu -> Countdown -> Active <-> Paused -> Ended, with restart
//! (any -> Countdown), quit (any -> Menu) and next round (Active -> Countdown).
//! Owns score, combo, per-tier stats and the session timer registry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::EntityId;
use super::events::GameEvent;
use super::judge::{Outcome, Tier, TierStats};
use super::timers::{Timer, TimerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Menu,
    Countdown,
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A resource ran out (stamina, fishing progress)
    Exhausted,
    /// Goal reached (song finished, horse tamed, all rounds cleared)
    Completed,
    /// Session time ran out
    Deadline,
}

/// How a success turns into points. `combo` is the value after incrementing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoreRule {
    /// `base * (1 + combo * rate)`
    Multiplicative { rate: f64 },
    /// `base + combo * per_combo`
    Additive { per_combo: f64 },
}

impl ScoreRule {
    pub fn apply(&self, base: f64, combo: u32) -> f64 {
        match *self {
            ScoreRule::Multiplicative { rate } => base * (1.0 + combo as f64 * rate),
            ScoreRule::Additive { per_combo } => base + combo as f64 * per_combo,
        }
    }
}

/// Base points per tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierValues {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

impl TierValues {
    pub fn value(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Perfect => self.perfect,
            Tier::Great => self.great,
            Tier::Good => self.good,
        }
    }
}

/// Countdown shape: announces `steps, steps-1, .., 1, 0` every `step_ms`,
/// then goes Active one more step later
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    pub steps: u32,
    pub step_ms: f32,
}

impl Countdown {
    pub const NONE: Countdown = Countdown {
        steps: 0,
        step_ms: 0.0,
    };

    /// Time from entering the countdown to going Active
    pub fn total_ms(&self) -> f32 {
        if self.steps == 0 {
            0.0
        } else {
            (self.steps + 1) as f32 * self.step_ms
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CountdownState {
    /// Next value to announce, `None` once "Start" was shown
    next: Option<u32>,
    timer: Timer,
}

/// Terminal values of an ended session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub final_score: u64,
    pub max_combo: u32,
    pub stats: TierStats,
    pub end_reason: EndReason,
    pub rounds: u32,
}

/// Faults contained inside a single tick
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("quarantined entities with non-finite state: {ids:?}")]
    NonFinite { ids: Vec<EntityId> },

    #[error("{resource} became non-finite and was reset")]
    NonFiniteResource { resource: &'static str },
}

#[derive(Debug, Clone)]
pub struct Session<K> {
    phase: Phase,
    score: f64,
    combo: u32,
    max_combo: u32,
    stats: TierStats,
    round_index: u32,
    active_ms: f64,
    countdown: Countdown,
    countdown_state: Option<CountdownState>,
    timers: TimerRegistry<K>,
    end_reason: Option<EndReason>,
    rule: ScoreRule,
    values: TierValues,
    events: Vec<GameEvent>,
}

impl<K: Copy + PartialEq + std::fmt::Debug> Session<K> {
    pub fn new(rule: ScoreRule, values: TierValues, countdown: Countdown) -> Self {
        Self {
            phase: Phase::Menu,
            score: 0.0,
            combo: 0,
            max_combo: 0,
            stats: TierStats::default(),
            round_index: 0,
            active_ms: 0.0,
            countdown,
            countdown_state: None,
            timers: TimerRegistry::new(),
            end_reason: None,
            rule,
            values,
            events: Vec::new(),
        }
    }

    /// Start a fresh session (also used for restart)
    pub fn begin(&mut self) {
        self.score = 0.0;
        self.combo = 0;
        self.max_combo = 0;
        self.stats = TierStats::default();
        self.round_index = 0;
        self.active_ms = 0.0;
        self.timers.clear();
        self.end_reason = None;
        self.enter_countdown();
    }

    /// Active -> Countdown for the next round, score and combo kept
    pub fn next_round(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        self.round_index += 1;
        self.timers.clear();
        self.enter_countdown();
        true
    }

    fn enter_countdown(&mut self) {
        if self.countdown.steps == 0 || self.countdown.step_ms <= 0.0 {
            self.enter_active();
            return;
        }
        self.phase = Phase::Countdown;
        self.events.push(GameEvent::CountdownStep(self.countdown.steps));
        self.countdown_state = Some(CountdownState {
            next: Some(self.countdown.steps - 1),
            timer: Timer::new(self.countdown.step_ms),
        });
        log::debug!("Countdown started for round {}", self.round_index);
    }

    fn enter_active(&mut self) {
        self.phase = Phase::Active;
        self.countdown_state = None;
        self.events.push(GameEvent::Started {
            round: self.round_index,
        });
        log::info!("Round {} active", self.round_index);
    }

    /// Advance by an unscaled delta. Returns timer keys that fired.
    ///
    /// Countdown steps are consumed here; timers and the active-time accumulator
    /// only run while Active.
    pub fn advance(&mut self, raw_dt: f32) -> Vec<K> {
        match self.phase {
            Phase::Countdown => {
                self.advance_countdown(raw_dt);
                Vec::new()
            }
            Phase::Active => {
                self.active_ms += raw_dt as f64;
                self.timers.advance(raw_dt)
            }
            Phase::Menu | Phase::Paused | Phase::Ended => Vec::new(),
        }
    }

    fn advance_countdown(&mut self, dt: f32) {
        let Some(state) = self.countdown_state.as_mut() else {
            return;
        };
        if !state.timer.advance(dt) {
            return;
        }

        let mut carry = state.timer.overshoot();
        loop {
            let Some(state) = self.countdown_state.as_mut() else {
                return;
            };
            match state.next {
                Some(step) => {
                    state.next = step.checked_sub(1);
                    state.timer = Timer::new(self.countdown.step_ms);
                    self.events.push(GameEvent::CountdownStep(step));
                }
                None => {
                    self.enter_active();
                    return;
                }
            }

            let Some(state) = self.countdown_state.as_mut() else {
                return;
            };
            if !state.timer.advance(carry) {
                return;
            }
            carry = state.timer.overshoot();
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        self.phase = Phase::Paused;
        self.events.push(GameEvent::Paused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        self.phase = Phase::Active;
        self.events.push(GameEvent::Resumed);
        true
    }

    /// Toggle between Active and Paused
    pub fn toggle_pause(&mut self) -> bool {
        match self.phase {
            Phase::Active => self.pause(),
            Phase::Paused => self.resume(),
            _ => false,
        }
    }

    /// Enter Ended. No-op outside Countdown/Active/Paused.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if !matches!(self.phase, Phase::Countdown | Phase::Active | Phase::Paused) {
            return false;
        }
        self.phase = Phase::Ended;
        self.end_reason = Some(reason);
        self.countdown_state = None;
        self.timers.clear();
        self.events.push(GameEvent::Ended(reason));
        log::info!(
            "Session ended ({:?}): score {}, max combo {}",
            reason,
            self.score.floor(),
            self.max_combo
        );
        true
    }

    /// Back to the menu, dropping all pending timers
    pub fn quit(&mut self) {
        self.phase = Phase::Menu;
        self.countdown_state = None;
        self.timers.clear();
        self.events.push(GameEvent::Quit);
    }

    /// Apply a judged outcome. Returns points awarded, `None` when not Active.
    pub fn record(&mut self, outcome: Outcome) -> Option<f64> {
        let base = outcome.tier().map(|tier| self.values.value(tier));
        self.record_with_base(outcome, base.unwrap_or(0.0))
    }

    /// Like `record` but with an explicit base value for a success
    pub fn record_with_base(&mut self, outcome: Outcome, base: f64) -> Option<f64> {
        if self.phase != Phase::Active {
            return None;
        }
        self.stats.record(outcome);

        if !outcome.is_success() {
            self.combo = 0;
            return Some(0.0);
        }

        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        let points = self.rule.apply(base, self.combo);
        self.score += points;
        if self.combo % 10 == 0 {
            self.events.push(GameEvent::ComboMilestone(self.combo));
        }
        Some(points)
    }

    /// Continuous points (hold ticks). Ignored when not Active.
    pub fn add_score(&mut self, points: f64) {
        if self.phase == Phase::Active && points.is_finite() {
            self.score += points;
        }
    }

    pub fn summary(&self) -> Option<Summary> {
        if self.phase != Phase::Ended {
            return None;
        }
        Some(Summary {
            final_score: self.score.max(0.0).floor() as u64,
            max_combo: self.max_combo,
            stats: self.stats,
            end_reason: self.end_reason?,
            rounds: self.round_index + 1,
        })
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn timers_mut(&mut self) -> &mut TimerRegistry<K> {
        &mut self.timers
    }

    pub fn timers(&self) -> &TimerRegistry<K> {
        &self.timers
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Score rounded down for display
    pub fn display_score(&self) -> u64 {
        self.score.max(0.0).floor() as u64
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn stats(&self) -> &TierStats {
        &self.stats
    }

    pub fn round_index(&self) -> u32 {
        self.round_index
    }

    /// Unscaled time spent Active (ms)
    pub fn active_ms(&self) -> f64 {
        self.active_ms
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn rule(&self) -> ScoreRule {
        self.rule
    }

    pub fn set_countdown(&mut self, countdown: Countdown) {
        self.countdown = countdown;
    }

    /// Next countdown announcement still pending, if counting down
    pub fn countdown_remaining_ms(&self) -> Option<f32> {
        self.countdown_state.map(|s| s.timer.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::judge::MissKind;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestTimer {
        Stage,
    }

    fn melody_session() -> Session<TestTimer> {
        Session::new(
            ScoreRule::Multiplicative { rate: 0.01 },
            TierValues {
                perfect: 100.0,
                great: 50.0,
                good: 50.0,
            },
            Countdown {
                steps: 3,
                step_ms: 800.0,
            },
        )
    }

    fn countdown_steps(events: &[GameEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::CountdownStep(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_countdown_sequence() {
        let mut s = melody_session();
        s.begin();
        assert_eq!(s.phase(), Phase::Countdown);

        s.advance(800.0);
        s.advance(800.0);
        s.advance(800.0);
        assert_eq!(s.phase(), Phase::Countdown);
        s.advance(799.0);
        assert_eq!(s.phase(), Phase::Countdown);
        s.advance(1.0);
        assert_eq!(s.phase(), Phase::Active);

        let events = s.drain_events();
        assert_eq!(countdown_steps(&events), vec![3, 2, 1, 0]);
        assert!(events.contains(&GameEvent::Started { round: 0 }));
    }

    #[test]
    fn test_countdown_large_delta_catches_up() {
        let mut s = melody_session();
        s.begin();
        s.advance(5000.0);
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(countdown_steps(&s.drain_events()), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_zero_step_countdown_is_immediate() {
        let mut s: Session<TestTimer> = Session::new(
            ScoreRule::Multiplicative { rate: 0.0 },
            TierValues {
                perfect: 50.0,
                great: 50.0,
                good: 50.0,
            },
            Countdown::NONE,
        );
        s.begin();
        assert_eq!(s.phase(), Phase::Active);
    }

    #[test]
    fn test_judgment_blocked_outside_active() {
        let mut s = melody_session();
        assert_eq!(s.record(Outcome::Hit(Tier::Perfect)), None);
        s.begin();
        assert_eq!(s.record(Outcome::Hit(Tier::Perfect)), None);
        assert_eq!(s.score(), 0.0);
    }

    #[test]
    fn test_multiplicative_scoring_and_combo_law() {
        let mut s = melody_session();
        s.begin();
        s.advance(3200.0);

        // combo becomes 1 before scoring: 100 * 1.01
        let first = s.record(Outcome::Hit(Tier::Perfect)).unwrap();
        assert!((first - 101.0).abs() < 1e-9);
        let second = s.record(Outcome::Hit(Tier::Good)).unwrap();
        assert!((second - 51.0).abs() < 1e-9);
        assert_eq!(s.combo(), 2);

        s.record(Outcome::BrokenHold);
        assert_eq!(s.combo(), 0);
        s.record(Outcome::Hit(Tier::Good));
        s.record(Outcome::Miss(MissKind::Expired));
        assert_eq!(s.combo(), 0);
        assert_eq!(s.max_combo(), 2);
        assert!((s.score() - (101.0 + 51.0 + 50.5)).abs() < 1e-9);
    }

    #[test]
    fn test_additive_rule() {
        let rule = ScoreRule::Additive { per_combo: 10.0 };
        assert_eq!(rule.apply(200.0, 3), 230.0);
    }

    #[test]
    fn test_pause_freezes_time_and_timers() {
        let mut s = melody_session();
        s.set_countdown(Countdown::NONE);
        s.begin();
        s.timers_mut().schedule(TestTimer::Stage, 1000.0);

        s.advance(500.0);
        assert!(s.pause());
        assert!(s.advance(5000.0).is_empty());
        assert_eq!(s.active_ms(), 500.0);
        assert!(s.resume());
        assert_eq!(s.advance(500.0), vec![TestTimer::Stage]);
        assert_eq!(s.active_ms(), 1000.0);
    }

    #[test]
    fn test_restart_clears_timers_and_score() {
        let mut s = melody_session();
        s.set_countdown(Countdown::NONE);
        s.begin();
        s.record(Outcome::Hit(Tier::Perfect));
        s.timers_mut().schedule(TestTimer::Stage, 1000.0);
        s.end(EndReason::Completed);

        s.begin();
        assert_eq!(s.score(), 0.0);
        assert_eq!(s.combo(), 0);
        assert!(s.timers().is_empty());
        assert!(s.advance(2000.0).is_empty());
    }

    #[test]
    fn test_next_round_keeps_score() {
        let mut s = melody_session();
        s.begin();
        s.advance(3200.0);
        s.record(Outcome::Hit(Tier::Perfect));
        assert!(s.next_round());
        assert_eq!(s.phase(), Phase::Countdown);
        assert_eq!(s.round_index(), 1);
        assert_eq!(s.combo(), 1);
        assert!(s.score() > 0.0);
        assert!(!s.next_round());
    }

    #[test]
    fn test_summary_only_when_ended() {
        let mut s = melody_session();
        s.set_countdown(Countdown::NONE);
        s.begin();
        s.record(Outcome::Hit(Tier::Perfect));
        s.add_score(0.9);
        assert!(s.summary().is_none());

        assert!(s.end(EndReason::Completed));
        assert!(!s.end(EndReason::Deadline));
        let summary = s.summary().unwrap();
        assert_eq!(summary.final_score, 101);
        assert_eq!(summary.end_reason, EndReason::Completed);
        assert_eq!(summary.stats.perfect, 1);
        assert_eq!(summary.rounds, 1);
    }

    #[test]
    fn test_quit_returns_to_menu() {
        let mut s = melody_session();
        s.begin();
        s.timers_mut().schedule(TestTimer::Stage, 10.0);
        s.quit();
        assert_eq!(s.phase(), Phase::Menu);
        assert!(s.timers().is_empty());
    }

    #[test]
    fn test_combo_milestone_event() {
        let mut s = melody_session();
        s.set_countdown(Countdown::NONE);
        s.begin();
        for _ in 0..10 {
            s.record(Outcome::Hit(Tier::Good));
        }
        assert!(s.drain_events().contains(&GameEvent::ComboMilestone(10)));
    }
}
