//! Jianghu Minigames - timing and judgment core
//!
//! Core modules:
//! - `sim`: Deterministic building blocks (clock, entities, spawning, judgment, session)
//! - `games`: The five minigame loops built on top of `sim`
//! - `config`: Data-driven tuning for every game
//! - `content`: Song catalog and sequence tiling for the rhythm game
//! - `records`: High score tables keyed by stage/song id

pub mod config;
pub mod content;
pub mod games;
pub mod records;
pub mod sim;

pub use config::{ConfigError, GameConfigs};
pub use games::Minigame;
pub use records::HighScores;

use glam::Vec2;

/// Shared timing constants
pub mod consts {
    /// Ceiling for a single frame delta (ms). Anything longer is a stall
    /// (tab switch, debugger) and must not be integrated.
    pub const MAX_FRAME_DELTA_MS: f32 = 100.0;

    /// Nominal frame length (ms) the per-frame tuning values were authored against
    pub const REFERENCE_FRAME_MS: f32 = 16.66;

    /// Display refresh used by the headless demo driver
    pub const DEMO_FRAME_MS: f64 = 1000.0 / 60.0;
}

/// Convert a per-reference-frame rate into a per-millisecond rate
#[inline]
pub fn per_frame_to_per_ms(per_frame: f32) -> f32 {
    per_frame / consts::REFERENCE_FRAME_MS
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Unit direction for an angle in radians
#[inline]
pub fn direction(theta: f32) -> Vec2 {
    polar_to_cartesian(1.0, theta)
}
