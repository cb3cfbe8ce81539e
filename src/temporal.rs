//! Temporal validation of scored matches.
//!
//! A proximity match only proves a vehicle passed the crash site at some
//! point; this stage checks it passed *around the crash time*. Windows
//! are tried in configured order (ascending by default) and the first
//! satisfied window is kept, so each validated match carries the
//! tightest window it fits.
//!
//! Crashes without a recorded datetime cannot be validated and are
//! skipped here without failing the run; their matches still exist in
//! the scored output.

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::CrashStore;
use crate::{ScoredMatch, TemporalMatch};

// ===== Configuration =====

/// Windows and weights for temporal validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemporalConfig {
    /// Candidate windows, tried in order. The first window containing
    /// the match-to-crash time delta wins.
    pub windows_minutes: Vec<u32>,
    /// Distance at which the spatial half of the confidence reaches zero.
    pub spatial_radius: f64,
    /// Weight of the spatial half of the combined confidence.
    pub spatial_weight: f64,
    /// Weight of the temporal half of the combined confidence.
    pub temporal_weight: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        TemporalConfig {
            windows_minutes: vec![5, 10, 15, 20],
            spatial_radius: 25.0, // meters
            spatial_weight: 0.6,
            temporal_weight: 0.4,
        }
    }
}

impl TemporalConfig {
    /// Blend spatial and temporal closeness into one percentage.
    ///
    /// Both halves are linear ramps from 100 (exactly at the crash, at
    /// the crash instant) down to 0 (at `spatial_radius`, at the window
    /// edge), combined with the configured weights.
    pub fn confidence(&self, distance: f64, delta_seconds: i64, window_minutes: u32) -> f64 {
        let spatial = if self.spatial_radius > 0.0 {
            ((self.spatial_radius - distance) / self.spatial_radius).max(0.0) * 100.0
        } else {
            0.0
        };

        let window_seconds = f64::from(window_minutes) * 60.0;
        let temporal = if window_seconds > 0.0 {
            ((window_seconds - delta_seconds as f64) / window_seconds).max(0.0) * 100.0
        } else {
            0.0
        };

        self.spatial_weight * spatial + self.temporal_weight * temporal
    }
}

// ===== Validation =====

/// Validate one scored match against its crash's datetime.
///
/// Returns `None` when the time delta falls outside every configured
/// window; the match is then spatial-only and drops out of the
/// validated set.
pub fn validate_match(
    scored: &ScoredMatch,
    crash_datetime: NaiveDateTime,
    config: &TemporalConfig,
) -> Option<TemporalMatch> {
    let delta = scored
        .proximity
        .timestamp
        .signed_duration_since(crash_datetime)
        .num_seconds()
        .abs();

    for &window in &config.windows_minutes {
        if delta <= i64::from(window) * 60 {
            let confidence = config.confidence(scored.proximity.distance, delta, window);
            return Some(TemporalMatch {
                scored: scored.clone(),
                window_minutes: window,
                time_delta_seconds: delta,
                combined_confidence: confidence,
            });
        }
    }
    None
}

/// Validate a batch of scored matches, resolving crash datetimes from
/// the store. Matches against undated crashes are skipped, not failed.
pub fn validate_matches(
    scored: &[ScoredMatch],
    store: &CrashStore,
    config: &TemporalConfig,
) -> Vec<TemporalMatch> {
    let mut undated = 0usize;
    let mut out = Vec::new();

    for m in scored {
        let crash = match store.get_by_id(&m.proximity.crash_id) {
            Some(crash) => crash,
            None => continue,
        };
        let datetime = match crash.datetime {
            Some(datetime) => datetime,
            None => {
                undated += 1;
                continue;
            }
        };
        if let Some(validated) = validate_match(m, datetime, config) {
            out.push(validated);
        }
    }

    if undated > 0 {
        debug!(
            "{} match(es) reference undated crashes, skipped temporal validation",
            undated
        );
    }
    out
}
