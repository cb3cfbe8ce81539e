//! Summary statistics over pipeline output.
//!
//! Collapses a batch run (or previously written output tables) into a
//! compact report: stage counts, distance and score distributions,
//! severity/tier/window/tag breakdowns, and the strongest matches.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::engine::{CrashStore, PipelineResult};
use crate::tables::{ClassificationRow, TemporalRow};

/// Rows shown in the strongest-matches listing.
const TOP_LIMIT: usize = 5;

/// Min/max/mean/median of one numeric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl DistributionStats {
    /// Compute stats over a sample. An empty sample yields all zeros.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        DistributionStats {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median,
        }
    }
}

/// One row of the strongest-matches listing.
#[derive(Debug, Clone, Serialize)]
pub struct TopMatch {
    pub vehicle_id: String,
    pub crash_id: String,
    pub involvement_score: f64,
}

/// Aggregated view of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub trips_processed: usize,
    pub trips_skipped: usize,
    pub matches: usize,
    pub scored: usize,
    pub validated: usize,
    pub classified: usize,
    pub unique_vehicles: usize,
    pub unique_crashes: usize,
    /// Vehicles matched against more than one crash.
    pub multi_crash_vehicles: usize,
    pub distance: DistributionStats,
    pub involvement_score: DistributionStats,
    /// Matches per crash severity.
    pub severity_counts: BTreeMap<String, usize>,
    /// Matches per vehicle type.
    pub vehicle_type_counts: BTreeMap<String, usize>,
    /// Scored matches per confidence tier.
    pub tier_counts: BTreeMap<String, usize>,
    /// Validated matches per window width (minutes).
    pub window_counts: BTreeMap<u32, usize>,
    /// Classifications per participant tag.
    pub tag_counts: BTreeMap<String, usize>,
    /// Strongest matches by involvement score.
    pub top_matches: Vec<TopMatch>,
}

/// Distinct vehicles, distinct crashes, and vehicles seen at more than
/// one crash, over (vehicle, crash) pairs.
fn vehicle_crash_counts<'a, I>(pairs: I) -> (usize, usize, usize)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut crashes_by_vehicle: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut crashes: HashSet<&str> = HashSet::new();
    for (vehicle, crash) in pairs {
        crashes_by_vehicle.entry(vehicle).or_default().insert(crash);
        crashes.insert(crash);
    }
    let multi = crashes_by_vehicle
        .values()
        .filter(|set| set.len() > 1)
        .count();
    (crashes_by_vehicle.len(), crashes.len(), multi)
}

/// Sort (vehicle, crash, score) rows by score descending and keep the top.
fn strongest<'a, I>(rows: I) -> Vec<TopMatch>
where
    I: IntoIterator<Item = (&'a str, &'a str, f64)>,
{
    let mut all: Vec<TopMatch> = rows
        .into_iter()
        .map(|(vehicle_id, crash_id, involvement_score)| TopMatch {
            vehicle_id: vehicle_id.to_string(),
            crash_id: crash_id.to_string(),
            involvement_score,
        })
        .collect();
    all.sort_by(|a, b| {
        b.involvement_score
            .partial_cmp(&a.involvement_score)
            .unwrap_or(Ordering::Equal)
    });
    all.truncate(TOP_LIMIT);
    all
}

impl SummaryReport {
    /// Summarize an in-memory pipeline result. The store supplies crash
    /// severities for the breakdown.
    pub fn from_result(result: &PipelineResult, store: &CrashStore) -> Self {
        let distances: Vec<f64> = result.matches.iter().map(|m| m.distance).collect();
        let scores: Vec<f64> = result.scored.iter().map(|m| m.involvement_score).collect();

        let (unique_vehicles, unique_crashes, multi_crash_vehicles) = vehicle_crash_counts(
            result
                .matches
                .iter()
                .map(|m| (m.vehicle_id.as_str(), m.crash_id.as_str())),
        );

        let mut severity_counts = BTreeMap::new();
        let mut vehicle_type_counts = BTreeMap::new();
        for m in &result.matches {
            if let Some(severity) = store.severity_of(&m.crash_id) {
                *severity_counts.entry(severity.to_string()).or_insert(0) += 1;
            }
            *vehicle_type_counts
                .entry(m.vehicle_type.to_string())
                .or_insert(0) += 1;
        }

        let mut tier_counts = BTreeMap::new();
        for m in &result.scored {
            *tier_counts.entry(m.tier.to_string()).or_insert(0) += 1;
        }
        let mut window_counts = BTreeMap::new();
        for m in &result.temporal {
            *window_counts.entry(m.window_minutes).or_insert(0) += 1;
        }
        let mut tag_counts = BTreeMap::new();
        for c in &result.classifications {
            *tag_counts.entry(c.tag.to_string()).or_insert(0) += 1;
        }

        let top_matches = strongest(result.scored.iter().map(|m| {
            (
                m.proximity.vehicle_id.as_str(),
                m.proximity.crash_id.as_str(),
                m.involvement_score,
            )
        }));

        SummaryReport {
            trips_processed: result.trips_processed,
            trips_skipped: result.trips_skipped,
            matches: result.matches.len(),
            scored: result.scored.len(),
            validated: result.temporal.len(),
            classified: result.classifications.len(),
            unique_vehicles,
            unique_crashes,
            multi_crash_vehicles,
            distance: DistributionStats::from_values(&distances),
            involvement_score: DistributionStats::from_values(&scores),
            severity_counts,
            vehicle_type_counts,
            tier_counts,
            window_counts,
            tag_counts,
            top_matches,
        }
    }

    /// Summarize previously written output tables.
    ///
    /// Only the validated rows carry distances and scores, so the
    /// distributions and breakdowns here describe the validated set,
    /// and the trip counters stay zero (the rows do not record them).
    pub fn from_tables(temporal: &[TemporalRow], classifications: &[ClassificationRow]) -> Self {
        let distances: Vec<f64> = temporal.iter().map(|r| r.distance).collect();
        let scores: Vec<f64> = temporal.iter().map(|r| r.involvement_score).collect();

        let (unique_vehicles, unique_crashes, multi_crash_vehicles) = vehicle_crash_counts(
            temporal
                .iter()
                .map(|r| (r.vehicle_id.as_str(), r.crash_id.as_str())),
        );

        let mut severity_counts = BTreeMap::new();
        let mut vehicle_type_counts = BTreeMap::new();
        let mut tier_counts = BTreeMap::new();
        let mut window_counts = BTreeMap::new();
        for r in temporal {
            if !r.severity.is_empty() {
                *severity_counts.entry(r.severity.clone()).or_insert(0) += 1;
            }
            if !r.vehicle_type.is_empty() {
                *vehicle_type_counts
                    .entry(r.vehicle_type.clone())
                    .or_insert(0) += 1;
            }
            *tier_counts.entry(r.tier.clone()).or_insert(0) += 1;
            *window_counts.entry(r.window_minutes).or_insert(0) += 1;
        }
        let mut tag_counts = BTreeMap::new();
        for c in classifications {
            *tag_counts.entry(c.classification.clone()).or_insert(0) += 1;
        }

        let top_matches = strongest(
            temporal
                .iter()
                .map(|r| (r.vehicle_id.as_str(), r.crash_id.as_str(), r.involvement_score)),
        );

        SummaryReport {
            trips_processed: 0,
            trips_skipped: 0,
            matches: temporal.len(),
            scored: temporal.len(),
            validated: temporal.len(),
            classified: classifications.len(),
            unique_vehicles,
            unique_crashes,
            multi_crash_vehicles,
            distance: DistributionStats::from_values(&distances),
            involvement_score: DistributionStats::from_values(&scores),
            severity_counts,
            vehicle_type_counts,
            tier_counts,
            window_counts,
            tag_counts,
            top_matches,
        }
    }
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "LINKAGE SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(
            f,
            "trips processed:   {} ({} skipped)",
            self.trips_processed, self.trips_skipped
        )?;
        writeln!(f, "proximity matches: {}", self.matches)?;
        writeln!(f, "scored matches:    {}", self.scored)?;
        writeln!(f, "validated matches: {}", self.validated)?;
        writeln!(f, "classifications:   {}", self.classified)?;
        writeln!(
            f,
            "unique vehicles:   {} ({} at several crashes)",
            self.unique_vehicles, self.multi_crash_vehicles
        )?;
        writeln!(f, "unique crashes:    {}", self.unique_crashes)?;
        writeln!(
            f,
            "distance (m):      min {:.1}  median {:.1}  mean {:.1}  max {:.1}",
            self.distance.min, self.distance.median, self.distance.mean, self.distance.max
        )?;
        writeln!(
            f,
            "involvement score: min {:.1}  median {:.1}  mean {:.1}  max {:.1}",
            self.involvement_score.min,
            self.involvement_score.median,
            self.involvement_score.mean,
            self.involvement_score.max
        )?;

        if !self.severity_counts.is_empty() {
            writeln!(f, "severities:")?;
            for (severity, count) in &self.severity_counts {
                writeln!(f, "  {:<12} {}", severity, count)?;
            }
        }
        if !self.vehicle_type_counts.is_empty() {
            writeln!(f, "vehicle types:")?;
            for (vehicle_type, count) in &self.vehicle_type_counts {
                writeln!(f, "  {:<12} {}", vehicle_type, count)?;
            }
        }
        if !self.tier_counts.is_empty() {
            writeln!(f, "tiers:")?;
            for (tier, count) in &self.tier_counts {
                writeln!(f, "  {:<12} {}", tier, count)?;
            }
        }
        if !self.window_counts.is_empty() {
            writeln!(f, "windows:")?;
            for (window, count) in &self.window_counts {
                writeln!(f, "  {:>2} min       {}", window, count)?;
            }
        }
        if !self.tag_counts.is_empty() {
            writeln!(f, "tags:")?;
            for (tag, count) in &self.tag_counts {
                writeln!(f, "  {:<20} {}", tag, count)?;
            }
        }
        if !self.top_matches.is_empty() {
            writeln!(f, "top matches:")?;
            for m in &self.top_matches {
                writeln!(
                    f,
                    "  {:<14} {:<12} {:>5.1}",
                    m.vehicle_id, m.crash_id, m.involvement_score
                )?;
            }
        }
        Ok(())
    }
}
