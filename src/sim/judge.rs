//! Input classification
//!
//! Grades an action against the closest candidate target. A deviation is graded
//! by the tightest threshold it is strictly below; anything at or past the miss
//! cutoff is not resolvable by input at all. Explicit misses only come from the
//! game update noticing that an entity left its window.

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use crate::config::ConfigError;

/// Judgment quality, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Perfect,
    Great,
    Good,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Perfect => "PERFECT",
            Tier::Great => "GREAT",
            Tier::Good => "GOOD",
        }
    }
}

/// Why a failure was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissKind {
    /// Entity passed its window without being hit
    Expired,
    /// Right timing, wrong key
    WrongInput,
    /// Pressed too late under `OutOfWindowPolicy::MissWhenLate`
    OutOfWindow,
    /// All-or-nothing commit with an uncharged target
    FailedCommit,
}

/// Result of one judged action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit(Tier),
    Miss(MissKind),
    /// Hold released before its tail reached the line
    BrokenHold,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Hit(_))
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            Outcome::Hit(tier) => Some(*tier),
            _ => None,
        }
    }
}

/// Graded thresholds plus the cutoff past which input is ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentWindow {
    thresholds: Vec<(Tier, f32)>,
    miss_cutoff: f32,
}

impl JudgmentWindow {
    pub fn new(thresholds: Vec<(Tier, f32)>, miss_cutoff: f32) -> Result<Self, ConfigError> {
        let window = Self {
            thresholds,
            miss_cutoff,
        };
        window.validate()?;
        Ok(window)
    }

    /// Built-in tuning; checked by the config tests rather than at runtime
    pub(crate) fn new_unchecked(thresholds: Vec<(Tier, f32)>, miss_cutoff: f32) -> Self {
        Self {
            thresholds,
            miss_cutoff,
        }
    }

    /// Thresholds and tiers strictly increasing, cutoff no tighter than the loosest
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(&(_, loosest)) = self.thresholds.last() else {
            return Err(ConfigError::EmptyWindow);
        };

        let ordered = self.thresholds.iter().all(|(_, t)| t.is_finite() && *t > 0.0)
            && self
                .thresholds
                .windows(2)
                .all(|pair| pair[0].0 < pair[1].0 && pair[0].1 < pair[1].1);
        if !ordered {
            return Err(ConfigError::UnorderedThresholds(
                self.thresholds.iter().map(|(_, t)| *t).collect(),
            ));
        }

        if !self.miss_cutoff.is_finite() || self.miss_cutoff < loosest {
            return Err(ConfigError::CutoffTooTight {
                cutoff: self.miss_cutoff,
                loosest,
            });
        }
        Ok(())
    }

    /// The search range must reach strictly past the cutoff
    pub fn validate_search_range(&self, range: f32) -> Result<(), ConfigError> {
        if !range.is_finite() || range <= self.miss_cutoff {
            return Err(ConfigError::SearchRangeTooSmall {
                range,
                cutoff: self.miss_cutoff,
            });
        }
        Ok(())
    }

    /// Tier for an absolute deviation, `None` at or past the cutoff
    pub fn grade(&self, deviation: f32) -> Option<Tier> {
        let deviation = deviation.abs();
        if !deviation.is_finite() || deviation >= self.miss_cutoff {
            return None;
        }
        self.thresholds
            .iter()
            .find(|(_, max)| deviation < *max)
            .or(self.thresholds.last())
            .map(|(tier, _)| *tier)
    }

    pub fn miss_cutoff(&self) -> f32 {
        self.miss_cutoff
    }

    pub fn threshold(&self, tier: Tier) -> Option<f32> {
        self.thresholds
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, max)| *max)
    }

    /// Widest graded threshold
    pub fn loosest(&self) -> f32 {
        self.thresholds.last().map(|(_, max)| *max).unwrap_or(0.0)
    }
}

/// A target the action could apply to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub entity: EntityId,
    /// Signed distance from the target; positive = already past it
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub entity: EntityId,
    pub tier: Tier,
    pub deviation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Judged(Judgment),
    /// Closest candidate is within reach but not resolvable
    OutOfWindow { entity: EntityId, offset: f32 },
    NoMatch,
}

/// What an out-of-window press does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutOfWindowPolicy {
    /// Nothing happens, the entity stays live
    #[default]
    Ignore,
    /// A press on an entity already past its target consumes it as a miss
    MissWhenLate,
}

impl OutOfWindowPolicy {
    pub fn is_late_miss(&self, offset: f32) -> bool {
        matches!(self, OutOfWindowPolicy::MissWhenLate) && offset > 0.0
    }
}

/// Pick the closest candidate within `search_range` and grade it
pub fn classify(
    candidates: impl IntoIterator<Item = Candidate>,
    window: &JudgmentWindow,
    search_range: f32,
) -> Verdict {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        let deviation = candidate.offset.abs();
        if !deviation.is_finite() || deviation > search_range {
            continue;
        }
        // Ties keep the earliest candidate (spawn order)
        if best.is_none_or(|b| deviation < b.offset.abs()) {
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        return Verdict::NoMatch;
    };

    match window.grade(best.offset) {
        Some(tier) => Verdict::Judged(Judgment {
            entity: best.entity,
            tier,
            deviation: best.offset.abs(),
        }),
        None => Verdict::OutOfWindow {
            entity: best.entity,
            offset: best.offset,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseVerdict {
    Broken,
    Completed,
}

/// Judge a hold release. `tail_offset` is the signed distance of the tail from
/// the line (negative = tail has not reached it yet).
pub fn judge_release(tail_offset: f32, tolerance: f32) -> ReleaseVerdict {
    if tail_offset.is_finite() && tail_offset >= -tolerance {
        ReleaseVerdict::Completed
    } else {
        ReleaseVerdict::Broken
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// At least one target was short; every charge was reset
    Failed,
}

/// All-or-nothing commit over linked charges
pub fn commit(charges: &mut [f32], threshold: f32) -> CommitOutcome {
    if !charges.is_empty() && charges.iter().all(|c| *c >= threshold) {
        return CommitOutcome::Committed;
    }
    charges.iter_mut().for_each(|c| *c = 0.0);
    CommitOutcome::Failed
}

/// Per-tier counters for the summary screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
    pub broken: u32,
}

impl TierStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hit(Tier::Perfect) => self.perfect += 1,
            Outcome::Hit(Tier::Great) => self.great += 1,
            Outcome::Hit(Tier::Good) => self.good += 1,
            Outcome::Miss(_) => self.miss += 1,
            Outcome::BrokenHold => self.broken += 1,
        }
    }

    pub fn hits(&self) -> u32 {
        self.perfect + self.great + self.good
    }

    pub fn total(&self) -> u32 {
        self.hits() + self.miss + self.broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn melody_window() -> JudgmentWindow {
        JudgmentWindow::new(vec![(Tier::Perfect, 30.0), (Tier::Good, 60.0)], 90.0).unwrap()
    }

    fn at(id: u32, offset: f32) -> Candidate {
        Candidate {
            entity: EntityId(id),
            offset,
        }
    }

    #[test]
    fn test_window_validation() {
        assert!(matches!(
            JudgmentWindow::new(vec![], 90.0),
            Err(ConfigError::EmptyWindow)
        ));
        assert!(matches!(
            JudgmentWindow::new(vec![(Tier::Perfect, 60.0), (Tier::Good, 30.0)], 90.0),
            Err(ConfigError::UnorderedThresholds(_))
        ));
        assert!(matches!(
            JudgmentWindow::new(vec![(Tier::Good, 30.0), (Tier::Perfect, 60.0)], 90.0),
            Err(ConfigError::UnorderedThresholds(_))
        ));
        assert!(matches!(
            JudgmentWindow::new(vec![(Tier::Perfect, 30.0)], 20.0),
            Err(ConfigError::CutoffTooTight { .. })
        ));
        assert!(melody_window().validate_search_range(90.0).is_err());
        assert!(melody_window().validate_search_range(100.0).is_ok());
    }

    #[test]
    fn test_scenario_a_small_deviation_is_perfect() {
        let verdict = classify([at(1, 5.0)], &melody_window(), 100.0);
        assert_eq!(
            verdict,
            Verdict::Judged(Judgment {
                entity: EntityId(1),
                tier: Tier::Perfect,
                deviation: 5.0,
            })
        );
    }

    #[test]
    fn test_scenario_b_between_loosest_and_cutoff_is_good() {
        let verdict = classify([at(1, -75.0)], &melody_window(), 100.0);
        assert!(matches!(
            verdict,
            Verdict::Judged(Judgment {
                tier: Tier::Good,
                ..
            })
        ));
    }

    #[test]
    fn test_scenario_c_past_cutoff_is_not_a_miss() {
        let verdict = classify([at(1, 95.0)], &melody_window(), 100.0);
        assert_eq!(
            verdict,
            Verdict::OutOfWindow {
                entity: EntityId(1),
                offset: 95.0,
            }
        );
        assert!(!OutOfWindowPolicy::Ignore.is_late_miss(95.0));
        assert!(OutOfWindowPolicy::MissWhenLate.is_late_miss(95.0));
        assert!(!OutOfWindowPolicy::MissWhenLate.is_late_miss(-95.0));
    }

    #[test]
    fn test_outside_search_range_is_no_match() {
        assert_eq!(classify([at(1, 120.0)], &melody_window(), 100.0), Verdict::NoMatch);
        assert_eq!(classify([], &melody_window(), 100.0), Verdict::NoMatch);
        assert_eq!(
            classify([at(1, f32::NAN)], &melody_window(), 100.0),
            Verdict::NoMatch
        );
    }

    #[test]
    fn test_closest_candidate_wins() {
        let verdict = classify([at(1, -50.0), at(2, 10.0), at(3, 40.0)], &melody_window(), 100.0);
        match verdict {
            Verdict::Judged(j) => assert_eq!(j.entity, EntityId(2)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_three_tier_window() {
        let window = JudgmentWindow::new(
            vec![(Tier::Perfect, 10.0), (Tier::Great, 30.0), (Tier::Good, 55.0)],
            55.0,
        )
        .unwrap();
        assert_eq!(window.grade(9.9), Some(Tier::Perfect));
        assert_eq!(window.grade(10.0), Some(Tier::Great));
        assert_eq!(window.grade(30.0), Some(Tier::Good));
        assert_eq!(window.grade(55.0), None);
    }

    #[test]
    fn test_release() {
        assert_eq!(judge_release(-100.0, 60.0), ReleaseVerdict::Broken);
        assert_eq!(judge_release(-60.0, 60.0), ReleaseVerdict::Completed);
        assert_eq!(judge_release(10.0, 60.0), ReleaseVerdict::Completed);
    }

    #[test]
    fn test_scenario_e_partial_commit_resets_all() {
        let mut charges = [100.0, 40.0];
        assert_eq!(commit(&mut charges, 100.0), CommitOutcome::Failed);
        assert_eq!(charges, [0.0, 0.0]);

        let mut charges = [100.0, 100.0];
        assert_eq!(commit(&mut charges, 100.0), CommitOutcome::Committed);
        assert_eq!(charges, [100.0, 100.0]);

        assert_eq!(commit(&mut [], 100.0), CommitOutcome::Failed);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = TierStats::default();
        stats.record(Outcome::Hit(Tier::Perfect));
        stats.record(Outcome::Hit(Tier::Good));
        stats.record(Outcome::Miss(MissKind::Expired));
        stats.record(Outcome::BrokenHold);
        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.broken, 1);
    }

    proptest! {
        #[test]
        fn prop_smaller_deviation_never_worse(a in 0.0f32..120.0, b in 0.0f32..120.0) {
            let window = melody_window();
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            if let Some(worse) = window.grade(large) {
                let better = window.grade(small);
                prop_assert!(better.is_some());
                prop_assert!(better.unwrap() <= worse);
            }
        }
    }
}
