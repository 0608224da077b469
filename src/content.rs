//! Song catalog for the rhythm game
//!
//! Songs are authored as JSON: note records `{ "t", "l", "type", "len" }` in
//! milliseconds plus backing chord cues. A short authored sequence is looped
//! (tiled) to fill a whole session.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::sim::Randomness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Tap,
    Hold,
}

/// One authored note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Time the head reaches the hit line (ms from song start)
    pub t: f64,
    #[serde(rename = "l", alias = "lane")]
    pub lane: usize,
    #[serde(rename = "type", default)]
    pub kind: NoteType,
    /// Hold length (ms)
    #[serde(default)]
    pub len: f64,
}

/// Backing chord, as indices into the host's pitch table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackingCue {
    pub t: f64,
    pub chord: Vec<usize>,
}

/// Menu grouping, easiest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Novice,
    Disciple,
    Master,
    Grandmaster,
}

fn default_multiplier() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    /// Session length (seconds)
    pub duration: f64,
    #[serde(default = "default_multiplier")]
    pub difficulty_multiplier: f32,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Fall speed (px per reference frame); derived from the multiplier when absent
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub backing: Vec<BackingCue>,
    pub notes: Vec<NoteEvent>,
}

/// A song expanded to session length, both lists sorted by time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiledSong {
    pub notes: Vec<NoteEvent>,
    pub backing: Vec<BackingCue>,
}

impl Song {
    pub fn duration_ms(&self) -> f64 {
        self.duration * 1000.0
    }

    pub fn fall_speed(&self, base_speed: f32) -> f32 {
        self.speed
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(base_speed * self.difficulty_multiplier.max(0.1))
    }

    /// Loop the authored sequence until `target_ms`. The loop length is the last
    /// note time plus `gap_ms`; records past the target are dropped.
    pub fn tile(&self, target_ms: f64, gap_ms: f64) -> TiledSong {
        let Some(last) = self.notes.iter().map(|n| n.t).reduce(f64::max) else {
            return TiledSong::default();
        };
        let loop_len = last + gap_ms;
        if !loop_len.is_finite() || loop_len <= 0.0 {
            return TiledSong::default();
        }

        let mut tiled = TiledSong::default();
        let mut offset = 0.0;
        while offset < target_ms {
            tiled.notes.extend(
                self.notes
                    .iter()
                    .filter(|n| n.t + offset <= target_ms)
                    .map(|n| NoteEvent {
                        t: n.t + offset,
                        ..*n
                    }),
            );
            tiled.backing.extend(
                self.backing
                    .iter()
                    .filter(|b| b.t + offset <= target_ms)
                    .map(|b| BackingCue {
                        t: b.t + offset,
                        chord: b.chord.clone(),
                    }),
            );
            offset += loop_len;
        }

        tiled.notes.sort_by(|a, b| a.t.total_cmp(&b.t));
        tiled.backing.sort_by(|a, b| a.t.total_cmp(&b.t));
        tiled
    }

    pub fn validate(&self, lanes: usize) -> Result<(), ConfigError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "song.duration",
                value: self.duration,
            });
        }
        for (index, note) in self.notes.iter().enumerate() {
            if note.lane >= lanes {
                return Err(ConfigError::LaneOutOfRange {
                    song: self.id.clone(),
                    index,
                    lane: note.lane,
                    lanes,
                });
            }
            if note.kind == NoteType::Hold && (note.len.is_nan() || note.len <= 0.0) {
                return Err(ConfigError::ZeroLengthHold {
                    song: self.id.clone(),
                    index,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub songs: Vec<Song>,
}

impl Catalog {
    /// Parse, validate against the lane count and sort by difficulty
    pub fn from_json(json: &str, lanes: usize) -> Result<Self, ConfigError> {
        let mut catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate(lanes)?;
        catalog.sort_by_difficulty();
        log::info!("Loaded {} songs", catalog.songs.len());
        Ok(catalog)
    }

    pub fn validate(&self, lanes: usize) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for song in &self.songs {
            if !seen.insert(song.id.as_str()) {
                return Err(ConfigError::DuplicateSong(song.id.clone()));
            }
            song.validate(lanes)?;
        }
        Ok(())
    }

    /// Unrated songs go last; ties keep authored order
    pub fn sort_by_difficulty(&mut self) {
        self.songs.sort_by_key(|s| s.difficulty.map_or(u8::MAX, |d| d as u8));
    }

    pub fn get(&self, id: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == id)
    }

    pub fn pick_random(&self, rng: &mut impl Randomness) -> Option<&Song> {
        if self.songs.is_empty() {
            return None;
        }
        self.songs.get(rng.index(self.songs.len()))
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
