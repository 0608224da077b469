//! Deterministic simulation building blocks
//!
//! Everything every minigame shares lives here. This module must stay pure:
//! - Time only enters through `Clock` deltas
//! - Randomness only enters through `Randomness`
//! - Stable iteration order (entities keep spawn order)
//! - No rendering or platform dependencies

pub mod ability;
pub mod clock;
pub mod collision;
pub mod entity;
pub mod events;
pub mod gauge;
pub mod input;
pub mod judge;
pub mod rng;
pub mod session;
pub mod spawner;
pub mod timers;

pub use ability::{Ability, AbilityTransition};
pub use clock::{Clock, Tick};
pub use collision::{confine_to_rect, resolve_circle_pair, CircleContact};
pub use entity::{
    Bird, Entity, EntityId, EntityKind, EntitySet, Note, NoteKind, Oscillation, Particle, Pot,
    PotMode, Prompt, Status,
};
pub use events::GameEvent;
pub use gauge::GaugeZone;
pub use input::{HeldKeys, InputEvent, Key};
pub use judge::{
    classify, commit, judge_release, Candidate, CommitOutcome, Judgment, JudgmentWindow,
    MissKind, Outcome, OutOfWindowPolicy, ReleaseVerdict, Tier, TierStats, Verdict,
};
pub use rng::{Randomness, ScriptedRandom, SimRng};
pub use session::{
    Countdown, EndReason, Phase, ScoreRule, Session, StepError, Summary, TierValues,
};
pub use spawner::{Bounds, SpawnBag, SpawnTimer};
pub use timers::{Timer, TimerRegistry};
