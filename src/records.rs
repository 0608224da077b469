//! High score tables
//!
//! One top-10 leaderboard per stage or song id. The table only round-trips
//! through JSON; where it is stored is up to the host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::sim::{EndReason, Summary};

/// Maximum number of high scores to keep per key
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub score: u64,
    pub max_combo: u32,
    /// Rounds played (pitch-pot stages, always 1 elsewhere)
    pub rounds: u32,
    pub end_reason: EndReason,
    /// Unix timestamp (ms) supplied by the host
    pub timestamp: f64,
}

/// Sorted descending by score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<HighScoreEntry>,
}

impl Leaderboard {
    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        // Must beat the lowest entry
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Rank a score would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert an entry if it qualifies and return its rank
    pub fn add(&mut self, entry: HighScoreEntry) -> Option<usize> {
        if !self.qualifies(entry.score) {
            return None;
        }

        let rank = match self.entries.iter().position(|e| entry.score > e.score) {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Leaderboards keyed by stage/song id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighScores {
    boards: BTreeMap<String, Leaderboard>,
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qualifies(&self, key: &str, score: u64) -> bool {
        self.boards
            .get(key)
            .map_or(score > 0, |board| board.qualifies(score))
    }

    pub fn potential_rank(&self, key: &str, score: u64) -> Option<usize> {
        match self.boards.get(key) {
            Some(board) => board.potential_rank(score),
            None => Leaderboard::default().potential_rank(score),
        }
    }

    /// Add a score under `key`; returns the rank achieved
    pub fn add_score(
        &mut self,
        key: &str,
        score: u64,
        max_combo: u32,
        timestamp: f64,
    ) -> Option<usize> {
        self.add_entry(
            key,
            HighScoreEntry {
                score,
                max_combo,
                rounds: 1,
                end_reason: EndReason::Completed,
                timestamp,
            },
        )
    }

    /// Record a finished session
    pub fn submit(&mut self, key: &str, summary: &Summary, timestamp: f64) -> Option<usize> {
        self.add_entry(
            key,
            HighScoreEntry {
                score: summary.final_score,
                max_combo: summary.max_combo,
                rounds: summary.rounds,
                end_reason: summary.end_reason,
                timestamp,
            },
        )
    }

    fn add_entry(&mut self, key: &str, entry: HighScoreEntry) -> Option<usize> {
        let score = entry.score;
        let rank = self.boards.entry(key.to_string()).or_default().add(entry);
        if let Some(rank) = rank {
            log::info!("New high score for {}: {} (rank {})", key, score, rank);
        }
        rank
    }

    /// Best score recorded under `key`
    pub fn best(&self, key: &str) -> Option<u64> {
        self.boards.get(key).and_then(Leaderboard::top_score)
    }

    pub fn board(&self, key: &str) -> Option<&Leaderboard> {
        self.boards.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.boards.values().all(Leaderboard::is_empty)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut scores: HighScores = serde_json::from_str(json)?;
        // Stored tables may come from older builds with different limits
        for board in scores.boards.values_mut() {
            board.entries.sort_by(|a, b| b.score.cmp(&a.score));
            board.entries.truncate(MAX_HIGH_SCORES);
        }
        Ok(scores)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::TierStats;

    #[test]
    fn test_zero_never_qualifies() {
        let scores = HighScores::new();
        assert!(!scores.qualifies("molihua", 0));
        assert!(scores.qualifies("molihua", 1));
    }

    #[test]
    fn test_ranks_and_truncation() {
        let mut scores = HighScores::new();
        for s in 1..=10u64 {
            scores.add_score("archery", s * 100, 0, 0.0);
        }
        assert_eq!(scores.best("archery"), Some(1000));
        assert!(!scores.qualifies("archery", 100));
        assert_eq!(scores.potential_rank("archery", 550), Some(6));

        assert_eq!(scores.add_score("archery", 550, 3, 0.0), Some(6));
        let board = scores.board("archery").unwrap();
        assert_eq!(board.entries.len(), MAX_HIGH_SCORES);
        assert_eq!(board.entries.last().unwrap().score, 200);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut scores = HighScores::new();
        scores.add_score("a", 500, 0, 0.0);
        assert_eq!(scores.best("b"), None);
        assert_eq!(scores.potential_rank("b", 10), Some(1));
    }

    #[test]
    fn test_submit_summary() {
        let mut scores = HighScores::new();
        let summary = Summary {
            final_score: 1234,
            max_combo: 17,
            stats: TierStats::default(),
            end_reason: EndReason::Completed,
            rounds: 3,
        };
        assert_eq!(scores.submit("pitch-pot", &summary, 1.0), Some(1));
        let entry = &scores.board("pitch-pot").unwrap().entries[0];
        assert_eq!(entry.max_combo, 17);
        assert_eq!(entry.rounds, 3);
    }

    #[test]
    fn test_json_round_trip() {
        let mut scores = HighScores::new();
        scores.add_score("horse", 42, 5, 99.0);
        let json = scores.to_json().unwrap();
        let back = HighScores::from_json(&json).unwrap();
        assert_eq!(back, scores);
        assert!(HighScores::from_json("[]").is_err());
    }
}
