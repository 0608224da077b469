//! The five minigame loops
//!
//! Each game owns its clock, randomness, session and entities, and is driven
//! by the host through the `Minigame` trait: feed input events as they arrive
//! and call `frame` once per display refresh.

pub mod archery;
pub mod fishing;
pub mod horse;
pub mod melody;
pub mod pitch_pot;

pub use archery::Archery;
pub use fishing::Fishing;
pub use horse::HorseTaming;
pub use melody::Melody;
pub use pitch_pot::PitchPot;

use crate::sim::{Clock, GameEvent, InputEvent, Phase, StepError, Summary, Tick};

pub trait Minigame {
    /// Stable identifier, also the high score key where a game has a single table
    fn id(&self) -> &str;

    fn clock_mut(&mut self) -> &mut Clock;

    /// React to one input event immediately
    fn handle_input(&mut self, event: InputEvent);

    /// Advance the simulation by one tick
    fn step(&mut self, tick: Tick) -> Result<(), StepError>;

    fn phase(&self) -> Phase;

    /// Events produced since the last drain, in order
    fn drain_events(&mut self) -> Vec<GameEvent>;

    /// Terminal values once the session has ended
    fn summary(&self) -> Option<Summary>;

    /// Run one display frame. Per-tick faults are logged and the loop carries on.
    fn frame(&mut self, timestamp: f64) {
        let tick = self.clock_mut().advance(timestamp);
        if let Err(err) = self.step(tick) {
            log::error!("{}: {}", self.id(), err);
        }
    }
}
