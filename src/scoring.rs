//! Involvement scoring for proximity matches.
//!
//! Combines closest-approach distance, speed, deceleration and crash
//! severity into a 0-100 involvement score, then bands the score into
//! confidence tiers. Weights and thresholds live in [`ScoreConfig`] so a
//! deployment can retune them without touching the formula.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::CrashStore;
use crate::error::{OptionExt, Result};
use crate::{ConfidenceTier, ProximityMatch, ScoredMatch, Severity};

// ===== Configuration =====

/// Weights and thresholds for the involvement score.
///
/// The three kinematic components are independent linear ramps and the
/// severity bonus is a flat addend, so the defaults sum to at most 100.
/// The final score is clamped to `[0, 100]` regardless of tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreConfig {
    /// Maximum contribution of closest-approach distance.
    pub distance_weight: f64,
    /// Maximum contribution of speed at closest approach.
    pub speed_weight: f64,
    /// Maximum contribution of deceleration at closest approach.
    pub deceleration_weight: f64,
    /// Distance at which the distance contribution falls to zero.
    pub max_distance: f64,
    /// Speed at or above which the speed contribution is zero.
    pub high_speed_threshold: f64,
    /// Deceleration magnitude at which its contribution saturates.
    pub deceleration_saturation: f64,
    /// Bonus for a fatal crash.
    pub fatal_bonus: f64,
    /// Bonus for a serious-injury crash.
    pub serious_bonus: f64,
    /// Bonus for a minor-injury crash.
    pub minor_bonus: f64,
    /// Bonus for a non-injury crash.
    pub non_injury_bonus: f64,
    /// Minimum score for the candidate tier.
    pub candidate_score: f64,
    /// Minimum score for the probable tier.
    pub probable_score: f64,
    /// Minimum score for the high tier.
    pub high_score: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            distance_weight: 30.0,
            speed_weight: 40.0,
            deceleration_weight: 20.0,
            max_distance: 100.0,          // meters
            high_speed_threshold: 60.0,   // km/h
            deceleration_saturation: 5.0, // m/s^2
            fatal_bonus: 10.0,
            serious_bonus: 7.0,
            minor_bonus: 3.0,
            non_injury_bonus: 0.0,
            candidate_score: 50.0,
            probable_score: 70.0,
            high_score: 80.0,
        }
    }
}

impl ScoreConfig {
    /// Flat severity addend for the crash a match is paired with.
    pub fn severity_bonus(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Fatal => self.fatal_bonus,
            Severity::Serious => self.serious_bonus,
            Severity::Minor => self.minor_bonus,
            Severity::NonInjury => self.non_injury_bonus,
        }
    }

    /// Band a score into its confidence tier.
    pub fn tier(&self, score: f64) -> ConfidenceTier {
        if score >= self.high_score {
            ConfidenceTier::High
        } else if score >= self.probable_score {
            ConfidenceTier::Probable
        } else if score >= self.candidate_score {
            ConfidenceTier::Candidate
        } else {
            ConfidenceTier::Low
        }
    }
}

// ===== Scoring =====

/// Score a single proximity match against the severity of its crash.
///
/// Distance and speed contribute linearly down from their weights; the
/// deceleration component only rewards braking (negative acceleration)
/// and saturates at `deceleration_saturation`.
pub fn score_match(m: &ProximityMatch, severity: Severity, config: &ScoreConfig) -> ScoredMatch {
    let distance_part = if config.max_distance > 0.0 {
        config.distance_weight * (1.0 - m.distance / config.max_distance).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let speed_part = if config.high_speed_threshold > 0.0 {
        config.speed_weight * (1.0 - m.speed / config.high_speed_threshold).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let deceleration_part = if m.acceleration < 0.0 && config.deceleration_saturation > 0.0 {
        let fraction = (-m.acceleration / config.deceleration_saturation).min(1.0);
        config.deceleration_weight * fraction
    } else {
        0.0
    };

    let score = (distance_part + speed_part + deceleration_part + config.severity_bonus(severity))
        .clamp(0.0, 100.0);

    ScoredMatch {
        proximity: m.clone(),
        involvement_score: score,
        tier: config.tier(score),
    }
}

/// Score a batch of matches, resolving each crash's severity from the store.
///
/// Fails with [`crate::LinkError::UnknownCrash`] if a match references a
/// crash id the store has never seen; matching and scoring share one
/// store, so that indicates caller misuse rather than bad input data.
pub fn score_matches(
    matches: &[ProximityMatch],
    store: &CrashStore,
    config: &ScoreConfig,
) -> Result<Vec<ScoredMatch>> {
    matches
        .iter()
        .map(|m| {
            let severity = store
                .severity_of(&m.crash_id)
                .ok_or_unknown_crash(&m.crash_id)?;
            Ok(score_match(m, severity, config))
        })
        .collect()
}

/// Keep only matches at or above the candidate threshold.
pub fn filter_candidates(scored: Vec<ScoredMatch>, config: &ScoreConfig) -> Vec<ScoredMatch> {
    scored
        .into_iter()
        .filter(|s| s.involvement_score >= config.candidate_score)
        .collect()
}

/// Retain the `limit` highest-scoring matches for each crash.
///
/// Ties on score fall back to smaller distance, then vehicle id, so
/// repeated runs over the same input produce the same ranking. Output is
/// ordered by crash id.
pub fn top_matches_per_crash(scored: &[ScoredMatch], limit: usize) -> Vec<ScoredMatch> {
    let mut by_crash: HashMap<&str, Vec<&ScoredMatch>> = HashMap::new();
    for m in scored {
        by_crash
            .entry(m.proximity.crash_id.as_str())
            .or_default()
            .push(m);
    }

    let mut crash_ids: Vec<&str> = by_crash.keys().copied().collect();
    crash_ids.sort_unstable();

    let mut out = Vec::with_capacity(scored.len().min(crash_ids.len() * limit));
    for crash_id in crash_ids {
        if let Some(mut group) = by_crash.remove(crash_id) {
            group.sort_by(|a, b| {
                b.involvement_score
                    .partial_cmp(&a.involvement_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| {
                        a.proximity
                            .distance
                            .partial_cmp(&b.proximity.distance)
                            .unwrap_or(Ordering::Equal)
                    })
                    .then_with(|| a.proximity.vehicle_id.cmp(&b.proximity.vehicle_id))
            });
            out.extend(group.into_iter().take(limit).cloned());
        }
    }
    out
}
