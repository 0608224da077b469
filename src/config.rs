//! Per-game tuning
//!
//! Every constant a game reads lives here so a host can override it from JSON.
//! Missing fields fall back to the defaults, and everything is validated before
//! a session is built. Rates are per millisecond, distances in playfield pixels.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::{Bounds, Countdown, JudgmentWindow, OutOfWindowPolicy, Tier, TierValues};

/// Configuration and content validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: invalid range [{min}, {max}]")]
    InvalidBounds {
        field: &'static str,
        min: f32,
        max: f32,
    },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("judgment thresholds must be strictly increasing: {0:?}")]
    UnorderedThresholds(Vec<f32>),

    #[error("miss cutoff {cutoff} is tighter than the loosest threshold {loosest}")]
    CutoffTooTight { cutoff: f32, loosest: f32 },

    #[error("search range {range} must exceed the miss cutoff {cutoff}")]
    SearchRangeTooSmall { range: f32, cutoff: f32 },

    #[error("judgment window has no thresholds")]
    EmptyWindow,

    #[error("spawn bag is empty")]
    EmptyBag,

    #[error("song '{song}' note {index}: lane {lane} out of range (0..{lanes})")]
    LaneOutOfRange {
        song: String,
        index: usize,
        lane: usize,
        lanes: usize,
    },

    #[error("song '{song}' note {index}: hold with zero length")]
    ZeroLengthHold { song: String, index: usize },

    #[error("duplicate song id '{0}'")]
    DuplicateSong(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive {
            field,
            value: value as f64,
        })
    }
}

fn in_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        })
    }
}

fn countdown_ok(field: &'static str, countdown: &Countdown) -> Result<(), ConfigError> {
    if countdown.steps > 0 {
        positive(field, countdown.step_ms)?;
    }
    Ok(())
}

fn values_ok(field: &'static str, values: &TierValues) -> Result<(), ConfigError> {
    for v in [values.perfect, values.great, values.good] {
        if !v.is_finite() || v < 0.0 {
            return Err(ConfigError::OutOfRange {
                field,
                value: v,
                min: 0.0,
                max: f64::MAX,
            });
        }
    }
    Ok(())
}

/// Archery: shoot birds crossing the screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcheryConfig {
    pub width: f32,
    pub height: f32,
    /// Session length in unscaled time
    pub duration_ms: f32,
    pub first_spawn_ms: f32,
    pub spawn_interval: Bounds,
    /// Horizontal speed (px/s)
    pub speed: Bounds,
    /// Vertical velocity as a fraction of speed, centred on zero
    pub vertical_factor: f32,
    pub size_scale: Bounds,
    pub osc_freq: Bounds,
    pub osc_amp: Bounds,
    pub osc_phase: Bounds,
    /// How far off-screen birds enter and leave
    pub edge_margin: f32,
    pub vertical_margin: f32,
    pub hitbox_radius: f32,
    pub window: JudgmentWindow,
    pub search_range: f32,
    pub out_of_window: OutOfWindowPolicy,
    pub values: TierValues,
    pub combo_rate: f64,
    pub focus_key: char,
    pub focus_duration_ms: f32,
    pub focus_cooldown_ms: f32,
    pub focus_scale: f32,
}

impl Default for ArcheryConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            duration_ms: 60_000.0,
            first_spawn_ms: 1000.0,
            spawn_interval: Bounds {
                min: 300.0,
                max: 800.0,
            },
            speed: Bounds {
                min: 300.0,
                max: 600.0,
            },
            vertical_factor: 0.6,
            size_scale: Bounds { min: 0.5, max: 1.5 },
            osc_freq: Bounds {
                min: 0.002,
                max: 0.007,
            },
            osc_amp: Bounds {
                min: 10.0,
                max: 50.0,
            },
            osc_phase: Bounds {
                min: 0.0,
                max: 1000.0,
            },
            edge_margin: 150.0,
            vertical_margin: 200.0,
            hitbox_radius: 100.0,
            window: JudgmentWindow::new_unchecked(
                vec![(Tier::Perfect, 30.0), (Tier::Good, 100.0)],
                100.0,
            ),
            search_range: 120.0,
            out_of_window: OutOfWindowPolicy::Ignore,
            values: TierValues {
                perfect: 50.0,
                great: 50.0,
                good: 50.0,
            },
            combo_rate: 0.0,
            focus_key: '1',
            focus_duration_ms: 6000.0,
            focus_cooldown_ms: 6000.0,
            focus_scale: 0.3,
        }
    }
}

impl ArcheryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("archery.width", self.width)?;
        positive("archery.height", self.height)?;
        positive("archery.duration_ms", self.duration_ms)?;
        in_range("archery.first_spawn_ms", self.first_spawn_ms, 0.0, f32::MAX)?;
        self.spawn_interval.validate("archery.spawn_interval")?;
        positive("archery.spawn_interval.min", self.spawn_interval.min)?;
        self.speed.validate("archery.speed")?;
        positive("archery.speed.min", self.speed.min)?;
        self.size_scale.validate("archery.size_scale")?;
        self.osc_freq.validate("archery.osc_freq")?;
        self.osc_amp.validate("archery.osc_amp")?;
        self.osc_phase.validate("archery.osc_phase")?;
        positive("archery.hitbox_radius", self.hitbox_radius)?;
        self.window.validate()?;
        self.window.validate_search_range(self.search_range)?;
        values_ok("archery.values", &self.values)?;
        positive("archery.focus_duration_ms", self.focus_duration_ms)?;
        in_range("archery.focus_cooldown_ms", self.focus_cooldown_ms, 0.0, f32::MAX)?;
        in_range("archery.focus_scale", self.focus_scale, 0.0, 1.0)?;
        Ok(())
    }
}

/// Fishing: charge a cast, lure a bite, then keep the needle in the zone
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FishingConfig {
    /// Pointer x range mapped onto the 0..180° dial
    pub width: f32,
    pub power_rate: f32,
    /// Hold at full power before falling back
    pub power_pause_ms: f32,
    /// Releases at or below this power do not cast
    pub min_cast_power: f32,
    pub cast_perfect: f32,
    pub cast_great: f32,
    pub cast_good: f32,
    pub taps_min: u32,
    pub taps_max: u32,
    pub bite_delay_ms: f32,
    pub zone_center: Bounds,
    pub zone_width: Bounds,
    pub start_progress: f32,
    pub gain_rate: f32,
    pub loss_rate: f32,
    /// Wrestling noise: `sin(fast_freq * t + φ) * fast_amp + cos(slow_freq * t + φ) * slow_amp`
    pub noise_fast_freq: f32,
    pub noise_fast_amp: f32,
    pub noise_slow_freq: f32,
    pub noise_slow_amp: f32,
    pub values: TierValues,
}

impl Default for FishingConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            power_rate: 0.06,
            power_pause_ms: 200.0,
            min_cast_power: 5.0,
            cast_perfect: 95.0,
            cast_great: 80.0,
            cast_good: 50.0,
            taps_min: 1,
            taps_max: 6,
            bite_delay_ms: 1000.0,
            zone_center: Bounds {
                min: 40.0,
                max: 140.0,
            },
            zone_width: Bounds {
                min: 20.0,
                max: 60.0,
            },
            start_progress: 30.0,
            gain_rate: 0.024,
            loss_rate: 0.018,
            noise_fast_freq: 5.0,
            noise_fast_amp: 15.0,
            noise_slow_freq: 2.3,
            noise_slow_amp: 10.0,
            values: TierValues {
                perfect: 300.0,
                great: 200.0,
                good: 100.0,
            },
        }
    }
}

impl FishingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("fishing.width", self.width)?;
        positive("fishing.power_rate", self.power_rate)?;
        in_range("fishing.power_pause_ms", self.power_pause_ms, 0.0, f32::MAX)?;
        in_range("fishing.min_cast_power", self.min_cast_power, 0.0, 100.0)?;
        in_range("fishing.cast_good", self.cast_good, 0.0, 100.0)?;
        in_range("fishing.cast_great", self.cast_great, self.cast_good, 100.0)?;
        in_range("fishing.cast_perfect", self.cast_perfect, self.cast_great, 100.0)?;
        if self.taps_min == 0 || self.taps_min > self.taps_max {
            return Err(ConfigError::InvalidBounds {
                field: "fishing.taps",
                min: self.taps_min as f32,
                max: self.taps_max as f32,
            });
        }
        in_range("fishing.bite_delay_ms", self.bite_delay_ms, 0.0, f32::MAX)?;
        self.zone_center.validate("fishing.zone_center")?;
        self.zone_width.validate("fishing.zone_width")?;
        positive("fishing.zone_width.min", self.zone_width.min)?;
        in_range("fishing.start_progress", self.start_progress, 0.0, 100.0)?;
        positive("fishing.gain_rate", self.gain_rate)?;
        positive("fishing.loss_rate", self.loss_rate)?;
        values_ok("fishing.values", &self.values)?;
        Ok(())
    }

    /// Grade a released cast. `None` means weak.
    pub fn grade_cast(&self, power: f32) -> Option<Tier> {
        if power >= self.cast_perfect {
            Some(Tier::Perfect)
        } else if power >= self.cast_great {
            Some(Tier::Great)
        } else if power >= self.cast_good {
            Some(Tier::Good)
        } else {
            None
        }
    }
}

/// Graceful Melody: six-lane falling-note rhythm game
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MelodyConfig {
    pub lane_keys: Vec<char>,
    pub width: f32,
    pub height: f32,
    pub hit_line_y: f32,
    pub window: JudgmentWindow,
    pub search_range: f32,
    /// A hold release counts once the tail is within this distance of the line
    pub release_tolerance: f32,
    pub out_of_window: OutOfWindowPolicy,
    pub countdown: Countdown,
    /// Songs are looped until this length
    pub target_duration_ms: f64,
    /// Silence appended after the last note before looping
    pub loop_gap_ms: f64,
    /// Distance a note travels from spawn to the line
    pub travel_distance: f32,
    /// Fall speed (px per reference frame) for songs that do not set one
    pub base_speed: f32,
    pub values: TierValues,
    pub combo_rate: f64,
    pub hold_points_per_ms: f64,
    pub particles_per_hit: u32,
}

impl Default for MelodyConfig {
    fn default() -> Self {
        Self {
            lane_keys: vec!['s', 'd', 'f', 'j', 'k', 'l'],
            width: 800.0,
            height: 800.0,
            hit_line_y: 650.0,
            window: JudgmentWindow::new_unchecked(
                vec![(Tier::Perfect, 30.0), (Tier::Good, 60.0)],
                90.0,
            ),
            search_range: 100.0,
            release_tolerance: 60.0,
            out_of_window: OutOfWindowPolicy::Ignore,
            countdown: Countdown {
                steps: 3,
                step_ms: 800.0,
            },
            target_duration_ms: 90_000.0,
            loop_gap_ms: 2000.0,
            travel_distance: 700.0,
            base_speed: 6.0,
            values: TierValues {
                perfect: 100.0,
                great: 50.0,
                good: 50.0,
            },
            combo_rate: 0.01,
            hold_points_per_ms: 0.03,
            particles_per_hit: 10,
        }
    }
}

impl MelodyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lane_keys.is_empty() {
            return Err(ConfigError::NotPositive {
                field: "melody.lane_keys",
                value: 0.0,
            });
        }
        positive("melody.width", self.width)?;
        positive("melody.height", self.height)?;
        in_range("melody.hit_line_y", self.hit_line_y, 0.0, self.height)?;
        self.window.validate()?;
        self.window.validate_search_range(self.search_range)?;
        positive("melody.release_tolerance", self.release_tolerance)?;
        countdown_ok("melody.countdown.step_ms", &self.countdown)?;
        positive("melody.target_duration_ms", self.target_duration_ms as f32)?;
        in_range("melody.loop_gap_ms", self.loop_gap_ms as f32, 1.0, f32::MAX)?;
        positive("melody.travel_distance", self.travel_distance)?;
        positive("melody.base_speed", self.base_speed)?;
        values_ok("melody.values", &self.values)?;
        Ok(())
    }

    pub fn lane_count(&self) -> usize {
        self.lane_keys.len()
    }

    pub fn lane_for_key(&self, key: char) -> Option<usize> {
        self.lane_keys.iter().position(|k| *k == key)
    }

    pub fn lane_center_x(&self, lane: usize) -> f32 {
        let lane_width = self.width / self.lane_count().max(1) as f32;
        lane_width * lane as f32 + lane_width / 2.0
    }
}

/// Horse taming: hit directional prompts as they cross the ring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HorseConfig {
    pub width: f32,
    pub height: f32,
    pub ring_radius: f32,
    pub window: JudgmentWindow,
    /// Prompts are searched, and expire, this far past the ring
    pub expire_margin: f32,
    pub out_of_window: OutOfWindowPolicy,
    pub prompt_speed: f32,
    pub bag: Vec<char>,
    pub base_spawn_ms: f32,
    pub spawn_jitter: Bounds,
    pub progress_gain: TierValues,
    pub combo_bonus: f64,
    pub stamina_gain: TierValues,
    pub start_stamina: f32,
    pub miss_penalty: f32,
    /// Particle burst per tier: perfect, great, good
    pub particle_burst: [u32; 3],
}

impl Default for HorseConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            ring_radius: 200.0,
            // Target radius 30 plus 25 px of slack
            window: JudgmentWindow::new_unchecked(
                vec![(Tier::Perfect, 10.0), (Tier::Great, 30.0), (Tier::Good, 55.0)],
                55.0,
            ),
            expire_margin: 60.0,
            out_of_window: OutOfWindowPolicy::MissWhenLate,
            prompt_speed: 0.25,
            bag: vec!['w', 'a', 's', 'd', 'w', 'a', 's', 'd'],
            base_spawn_ms: 1500.0,
            spawn_jitter: Bounds { min: 0.7, max: 1.3 },
            progress_gain: TierValues {
                perfect: 3.0,
                great: 2.0,
                good: 1.0,
            },
            combo_bonus: 0.1,
            stamina_gain: TierValues {
                perfect: 3.0,
                great: 2.0,
                good: 1.0,
            },
            start_stamina: 100.0,
            miss_penalty: 10.0,
            particle_burst: [15, 10, 5],
        }
    }
}

impl HorseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("horse.width", self.width)?;
        positive("horse.height", self.height)?;
        positive("horse.ring_radius", self.ring_radius)?;
        self.window.validate()?;
        self.window.validate_search_range(self.expire_margin)?;
        positive("horse.prompt_speed", self.prompt_speed)?;
        if self.bag.is_empty() {
            return Err(ConfigError::EmptyBag);
        }
        positive("horse.base_spawn_ms", self.base_spawn_ms)?;
        self.spawn_jitter.validate("horse.spawn_jitter")?;
        positive("horse.spawn_jitter.min", self.spawn_jitter.min)?;
        values_ok("horse.progress_gain", &self.progress_gain)?;
        values_ok("horse.stamina_gain", &self.stamina_gain)?;
        in_range("horse.start_stamina", self.start_stamina, 1.0, 100.0)?;
        in_range("horse.miss_penalty", self.miss_penalty, 0.0, 100.0)?;
        Ok(())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn particles_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Perfect => self.particle_burst[0],
            Tier::Great => self.particle_burst[1],
            Tier::Good => self.particle_burst[2],
        }
    }
}

/// Which pots a pitch-pot stage spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    /// One pot charged by the mouse cursor
    Mouse,
    /// One pot charged by the keyboard cursor
    Keys,
    /// One pot needing both cursors at once
    Hybrid,
    /// A mouse pot and a keys pot
    Dual,
}

/// One pitch-pot stage variety
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageVariety {
    pub kind: StageKind,
    /// Pot speed (px/s) on the first round
    pub base_speed: f32,
    /// Added per round index
    pub speed_step: f32,
    /// Stage clock
    pub seconds: u32,
}

impl StageVariety {
    pub fn speed_for_round(&self, round: u32) -> f32 {
        self.base_speed + self.speed_step * round as f32
    }
}

/// Pitch-pot: charge moving pots with cursors, then commit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchPotConfig {
    pub rounds: u32,
    pub width: f32,
    pub height: f32,
    pub spawn_x: Bounds,
    pub spawn_y: Bounds,
    pub arena_min: Vec2,
    pub arena_max: Vec2,
    pub pot_separation: f32,
    pub charge_radius: f32,
    pub charge_rate: f32,
    pub drain_rate: f32,
    pub keys_cursor_speed: f32,
    pub countdown: Countdown,
    /// Delay between a successful commit and the next stage
    pub advance_delay_ms: f32,
    pub base_points: f64,
    pub combo_bonus: f64,
    pub varieties: Vec<StageVariety>,
}

impl Default for PitchPotConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            width: 800.0,
            height: 600.0,
            spawn_x: Bounds {
                min: 100.0,
                max: 700.0,
            },
            spawn_y: Bounds {
                min: 100.0,
                max: 500.0,
            },
            arena_min: Vec2::new(40.0, 40.0),
            arena_max: Vec2::new(760.0, 560.0),
            pot_separation: 100.0,
            charge_radius: 35.0,
            charge_rate: 0.15,
            drain_rate: 0.3,
            keys_cursor_speed: 0.4,
            countdown: Countdown {
                steps: 3,
                step_ms: 1000.0,
            },
            advance_delay_ms: 1000.0,
            base_points: 100.0,
            combo_bonus: 10.0,
            varieties: vec![
                StageVariety {
                    kind: StageKind::Mouse,
                    base_speed: 80.0,
                    speed_step: 8.0,
                    seconds: 30,
                },
                StageVariety {
                    kind: StageKind::Keys,
                    base_speed: 60.0,
                    speed_step: 8.0,
                    seconds: 30,
                },
                StageVariety {
                    kind: StageKind::Hybrid,
                    base_speed: 70.0,
                    speed_step: 8.0,
                    seconds: 40,
                },
                StageVariety {
                    kind: StageKind::Dual,
                    base_speed: 50.0,
                    speed_step: 5.0,
                    seconds: 45,
                },
            ],
        }
    }
}

impl PitchPotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::NotPositive {
                field: "pitch_pot.rounds",
                value: 0.0,
            });
        }
        positive("pitch_pot.width", self.width)?;
        positive("pitch_pot.height", self.height)?;
        self.spawn_x.validate("pitch_pot.spawn_x")?;
        self.spawn_y.validate("pitch_pot.spawn_y")?;
        Bounds {
            min: self.arena_min.x,
            max: self.arena_max.x,
        }
        .validate("pitch_pot.arena.x")?;
        Bounds {
            min: self.arena_min.y,
            max: self.arena_max.y,
        }
        .validate("pitch_pot.arena.y")?;
        positive("pitch_pot.pot_separation", self.pot_separation)?;
        positive("pitch_pot.charge_radius", self.charge_radius)?;
        positive("pitch_pot.charge_rate", self.charge_rate)?;
        positive("pitch_pot.drain_rate", self.drain_rate)?;
        positive("pitch_pot.keys_cursor_speed", self.keys_cursor_speed)?;
        countdown_ok("pitch_pot.countdown.step_ms", &self.countdown)?;
        in_range("pitch_pot.advance_delay_ms", self.advance_delay_ms, 0.0, f32::MAX)?;
        if self.varieties.is_empty() {
            return Err(ConfigError::EmptyBag);
        }
        for variety in &self.varieties {
            positive("pitch_pot.varieties.base_speed", variety.base_speed)?;
            if variety.seconds == 0 {
                return Err(ConfigError::NotPositive {
                    field: "pitch_pot.varieties.seconds",
                    value: 0.0,
                });
            }
        }
        Ok(())
    }
}

/// All five games' tuning in one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfigs {
    pub archery: ArcheryConfig,
    pub fishing: FishingConfig,
    pub melody: MelodyConfig,
    pub horse: HorseConfig,
    pub pitch_pot: PitchPotConfig,
}

impl GameConfigs {
    /// Parse and validate. Absent sections and fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let configs: GameConfigs = serde_json::from_str(json)?;
        configs.validate()?;
        log::info!("Loaded game configuration");
        Ok(configs)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archery.validate()?;
        self.fishing.validate()?;
        self.melody.validate()?;
        self.horse.validate()?;
        self.pitch_pot.validate()?;
        Ok(())
    }
}
