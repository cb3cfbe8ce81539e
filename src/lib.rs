//! # Crashmatch
//!
//! Spatial-temporal linkage of vehicle GPS trajectories to road crash
//! locations.
//!
//! This library provides:
//! - WGS84 → NZTM forward projection onto the crash dataset's meter grid
//! - An R-tree spatial index over crash locations with batched queries
//! - Per-trip proximity matching with closest-approach aggregation
//! - A 0–100 involvement score (distance, speed, deceleration, severity)
//! - Progressive temporal window validation (5/10/15/20 minutes)
//! - Behavioral participant classification (witness / emergency responder /
//!   participant)
//! - Checkpointed, resumable batch processing over trip CSV files
//!
//! ## Features
//!
//! - **`parallel`** - Process a file's trips in parallel with rayon
//! - **`synthetic`** - Seeded synthetic trip/crash generator for tests and
//!   benchmarks
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use crashmatch::{
//!     projection, Crash, LinkageEngine, MatchConfig, Severity, TrajectoryPoint, Trip,
//!     VehicleType,
//! };
//!
//! // Site a crash at a known trajectory coordinate (Auckland CBD)
//! let (easting, northing) = projection::project(174.7633, -36.8485).unwrap();
//! let crash = Crash::new("crash-1", easting, northing, Severity::Serious);
//!
//! let t0 = NaiveDate::from_ymd_opt(2024, 3, 14)
//!     .unwrap()
//!     .and_hms_opt(8, 30, 0)
//!     .unwrap();
//! let trip = Trip::new(
//!     "veh-1",
//!     "trip-1",
//!     VehicleType::Car,
//!     vec![TrajectoryPoint::new(t0, 174.7633, -36.8485, 12.0, -2.5)],
//! );
//!
//! let engine = LinkageEngine::new(vec![crash], MatchConfig::default()).unwrap();
//! let matches = engine.match_trip(&trip).unwrap();
//! assert_eq!(matches.len(), 1);
//! assert!(matches[0].distance < 1.0);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LinkError, OptionExt, Result};

// WGS84 -> NZTM forward projection
pub mod projection;
pub use projection::ProjectedPoint;

// Encoded trip sequence decoding
pub mod trajectory;
pub use trajectory::{decode_points, DecodeStats};

// Per-trip proximity matching against the crash index
pub mod matching;
pub use matching::match_trip;

// Involvement scoring
pub mod scoring;
pub use scoring::{filter_candidates, score_match, score_matches, top_matches_per_crash, ScoreConfig};

// Progressive temporal window validation
pub mod temporal;
pub use temporal::{validate_match, validate_matches, TemporalConfig};

// Participant classification heuristics
pub mod classify;
pub use classify::{
    classify_match, classify_matches, extract_features, BehaviorFeatures, ClassifyConfig,
    EmergencyFacility,
};

// Crash store, spatial index, checkpoint, and the composed engine
pub mod engine;
pub use engine::{Checkpoint, CrashIndex, CrashStore, EngineStats, LinkageEngine, PipelineResult};

// CSV table schemas and readers/writers
pub mod tables;
pub use tables::{
    append_rows, classification_rows, match_rows, read_crashes, read_rows, read_trips,
    scored_rows, temporal_rows, write_rows, ClassificationRow, CrashRow, MatchRow, ScoredRow,
    TemporalRow, TripRow,
};

// Summary statistics over output tables
pub mod report;
pub use report::{DistributionStats, SummaryReport, TopMatch};

// Synthetic trip/crash generator (tests and benches)
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A single decoded trajectory sample.
///
/// Speed is in km/h, longitudinal acceleration in m/s² (negative while
/// braking). Built from parallel encoded sequences by [`trajectory`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: NaiveDateTime,
    pub longitude: f64,
    pub latitude: f64,
    pub speed: f64,
    pub acceleration: f64,
}

impl TrajectoryPoint {
    pub fn new(
        timestamp: NaiveDateTime,
        longitude: f64,
        latitude: f64,
        speed: f64,
        acceleration: f64,
    ) -> Self {
        Self {
            timestamp,
            longitude,
            latitude,
            speed,
            acceleration,
        }
    }

    /// Check that the coordinates are finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        projection::is_valid_lonlat(self.longitude, self.latitude)
    }
}

/// One vehicle trip: an ordered trajectory plus identity metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub vehicle_id: String,
    pub trip_id: String,
    pub vehicle_type: VehicleType,
    /// Points ordered by timestamp.
    pub points: Vec<TrajectoryPoint>,
}

impl Trip {
    pub fn new(
        vehicle_id: impl Into<String>,
        trip_id: impl Into<String>,
        vehicle_type: VehicleType,
        points: Vec<TrajectoryPoint>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            trip_id: trip_id.into(),
            vehicle_type,
            points,
        }
    }

    /// First trajectory point, if any.
    pub fn origin(&self) -> Option<&TrajectoryPoint> {
        self.points.first()
    }

    /// Last trajectory point, if any.
    pub fn destination(&self) -> Option<&TrajectoryPoint> {
        self.points.last()
    }
}

/// A crash record with projected NZTM coordinates.
///
/// Immutable once loaded; one record per crash, uniquely keyed by `id`.
/// The datetime is nullable — many source records carry only a date or
/// nothing at all, and such crashes never reach the temporal stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crash {
    pub id: String,
    /// NZTM easting in meters.
    pub easting: f64,
    /// NZTM northing in meters.
    pub northing: f64,
    pub severity: Severity,
    pub datetime: Option<NaiveDateTime>,
    pub road_name: Option<String>,
    pub locality: Option<String>,
}

impl Crash {
    pub fn new(id: impl Into<String>, easting: f64, northing: f64, severity: Severity) -> Self {
        Self {
            id: id.into(),
            easting,
            northing,
            severity,
            datetime: None,
            road_name: None,
            locality: None,
        }
    }

    pub fn with_datetime(mut self, datetime: NaiveDateTime) -> Self {
        self.datetime = Some(datetime);
        self
    }

    /// Coordinates as an `[easting, northing]` array.
    pub fn xy(&self) -> [f64; 2] {
        [self.easting, self.northing]
    }
}

/// Crash severity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Fatal,
    Serious,
    Minor,
    #[serde(rename = "Non-Injury")]
    NonInjury,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "Fatal",
            Severity::Serious => "Serious",
            Severity::Minor => "Minor",
            Severity::NonInjury => "Non-Injury",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    /// Accepts both short names and the source table's long forms
    /// ("Fatal Crash", "Non-Injury Crash"). Unknown strings map to
    /// `NonInjury`, which carries no severity bonus.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower.starts_with("fatal") {
            Ok(Severity::Fatal)
        } else if lower.starts_with("serious") {
            Ok(Severity::Serious)
        } else if lower.starts_with("minor") {
            Ok(Severity::Minor)
        } else {
            Ok(Severity::NonInjury)
        }
    }
}

/// Vehicle category from the trip table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    /// Heavy commercial vehicle.
    #[serde(rename = "HCV")]
    Hcv,
    /// Light commercial vehicle.
    #[serde(rename = "LCV")]
    Lcv,
    #[serde(rename = "CAR")]
    Car,
    #[serde(rename = "BUS")]
    Bus,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Hcv => "HCV",
            VehicleType::Lcv => "LCV",
            VehicleType::Car => "CAR",
            VehicleType::Bus => "BUS",
            VehicleType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VehicleType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HCV" => Ok(VehicleType::Hcv),
            "LCV" => Ok(VehicleType::Lcv),
            "CAR" => Ok(VehicleType::Car),
            "BUS" => Ok(VehicleType::Bus),
            _ => Ok(VehicleType::Unknown),
        }
    }
}

// ============================================================================
// Match Records
// ============================================================================

/// Closest approach of one trip to one crash.
///
/// At most one exists per (trip, crash) pair: the minimum-distance point
/// wins, exact ties broken by earliest timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityMatch {
    pub vehicle_id: String,
    pub trip_id: String,
    pub vehicle_type: VehicleType,
    pub crash_id: String,
    /// Closest-approach distance in meters.
    pub distance: f64,
    /// Speed at closest approach, km/h.
    pub speed: f64,
    /// Longitudinal acceleration at closest approach, m/s².
    pub acceleration: f64,
    /// Timestamp of the closest-approach point.
    pub timestamp: NaiveDateTime,
    /// Index of the closest-approach point within the trip.
    pub point_index: usize,
}

/// A proximity match with its involvement score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub proximity: ProximityMatch,
    /// 0–100, sum of four capped components (see [`scoring`]).
    pub involvement_score: f64,
    pub tier: ConfidenceTier,
}

/// A scored match validated against the crash datetime.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalMatch {
    pub scored: ScoredMatch,
    /// Smallest validation window satisfied, in minutes.
    pub window_minutes: u32,
    /// Absolute gap between closest approach and the crash time, seconds.
    pub time_delta_seconds: i64,
    /// Combined spatial-temporal confidence, 0–100 (see [`temporal`]).
    pub combined_confidence: f64,
}

/// Confidence tier derived from the involvement score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Candidate,
    Probable,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Candidate => "candidate",
            ConfidenceTier::Probable => "probable",
            ConfidenceTier::High => "high",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavioral role assigned to a vehicle for one crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantTag {
    Witness,
    EmergencyResponder,
    Participant,
}

impl ParticipantTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantTag::Witness => "witness",
            ParticipantTag::EmergencyResponder => "emergency_responder",
            ParticipantTag::Participant => "participant",
        }
    }
}

impl std::fmt::Display for ParticipantTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParticipantTag {
    type Err = ();

    /// Unknown strings map to `Witness`, the conservative default.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "participant" => Ok(ParticipantTag::Participant),
            "emergency_responder" => Ok(ParticipantTag::EmergencyResponder),
            _ => Ok(ParticipantTag::Witness),
        }
    }
}

/// One vehicle's classification for one crash, with its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub vehicle_id: String,
    pub trip_id: String,
    pub crash_id: String,
    pub tag: ParticipantTag,
    /// Human-readable rule that fired, for audit output.
    pub reason: String,
}

// ============================================================================
// Matching Configuration
// ============================================================================

/// Configuration for spatial proximity matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    /// Maximum distance between a trajectory point and a crash to count as
    /// proximity, in meters.
    /// Default: 100.0
    pub buffer_radius: f64,

    /// Nearest crashes examined per trajectory point. A point inside a
    /// cluster of crashes can contribute one candidate per crash.
    /// Default: 10
    pub max_candidates: usize,

    /// Minimum valid (parseable, in-range) points for a trip to be matched.
    /// Trips below this produce an index query error and are skipped.
    /// Default: 1
    pub min_trip_points: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            buffer_radius: 100.0, // 100m buffer around each crash site
            max_candidates: 10,
            min_trip_points: 1,
        }
    }
}

impl MatchConfig {
    /// Tight matching: half the buffer, single nearest crash per point.
    pub fn strict() -> Self {
        Self {
            buffer_radius: 50.0,
            max_candidates: 1,
            ..Default::default()
        }
    }
}
