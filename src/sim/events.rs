//! Events emitted by a tick for the host to render and play
//!
//! Games push into a local buffer; the host drains it once per frame.

use glam::Vec2;

use super::entity::EntityId;
use super::judge::{Outcome, Tier};
use super::session::EndReason;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A countdown announcement; 0 is "Start"
    CountdownStep(u32),
    /// Active phase entered for `round`
    Started { round: u32 },
    Paused,
    Resumed,
    Ended(EndReason),
    /// Returned to the menu
    Quit,

    /// Result of a press, release, expiry or commit
    Judged {
        entity: Option<EntityId>,
        outcome: Outcome,
        /// Where feedback text should appear
        at: Vec2,
    },
    /// Combo milestone reached (every 10 successes)
    ComboMilestone(u32),

    AbilityActivated,
    AbilityExpired,
    AbilityReady,

    /// Backing chord to play now
    Cue { chord: Vec<usize> },

    /// Pitch-pot stage loaded; `seconds` is the stage clock
    StageLoaded { round: u32, seconds: u32 },
    /// Pitch-pot stage clock tick
    StageClock(u32),

    /// Fishing cast released
    CastGraded { power: f32, tier: Option<Tier> },
    /// Fishing tap registered while waiting
    Tap { count: u32, required: u32 },
    FishOn,
    StruggleStarted,
}
