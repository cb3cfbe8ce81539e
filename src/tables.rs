//! CSV table schemas and readers/writers.
//!
//! Input rows (`CrashRow`, `TripRow`) mirror the source extracts; output
//! rows are flat snake_case tables, one writer call per pipeline stage.
//! Writers support append mode so an interrupted batch can resume
//! without rewriting completed files.

use std::fs::OpenOptions;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::CrashStore;
use crate::error::{LinkError, Result};
use crate::trajectory::{self, DecodeStats, TIMESTAMP_FORMAT};
use crate::{projection, Classification, Crash, ProximityMatch, ScoredMatch, TemporalMatch, Trip};

/// Crash date layout in the source table.
pub const CRASH_DATE_FORMAT: &str = "%Y-%m-%d";
/// Crash time layout in the source table (no seconds recorded).
pub const CRASH_TIME_FORMAT: &str = "%H:%M";

// ===== Input Rows =====

/// One row of the crash table.
///
/// Coordinates come either projected (`easting`/`northing`) or geodetic
/// (`latitude`/`longitude`); projected wins when both are present.
#[derive(Debug, Clone, Deserialize)]
pub struct CrashRow {
    pub crash_id: String,
    #[serde(default)]
    pub easting: Option<f64>,
    #[serde(default)]
    pub northing: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub crash_date: Option<String>,
    #[serde(default)]
    pub crash_time: Option<String>,
    #[serde(default)]
    pub road_name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

fn parse_crash_datetime(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date?.trim(), CRASH_DATE_FORMAT).ok()?;
    let time = NaiveTime::parse_from_str(time?.trim(), CRASH_TIME_FORMAT).ok()?;
    Some(NaiveDateTime::new(date, time))
}

impl CrashRow {
    /// Year of the crash, from the year column or the date.
    pub fn year(&self) -> Option<i32> {
        if self.year.is_some() {
            return self.year;
        }
        let date = self.crash_date.as_deref()?;
        NaiveDate::parse_from_str(date.trim(), CRASH_DATE_FORMAT)
            .ok()
            .map(|d| d.year())
    }

    /// Convert to a [`Crash`], projecting geodetic coordinates when no
    /// projected pair is present. An unparseable or missing datetime
    /// leaves the crash undated rather than failing the row.
    pub fn into_crash(self) -> Result<Crash> {
        let (easting, northing) = match (self.easting, self.northing) {
            (Some(easting), Some(northing)) => (easting, northing),
            _ => match (self.longitude, self.latitude) {
                (Some(longitude), Some(latitude)) => projection::project(longitude, latitude)?,
                _ => {
                    return Err(LinkError::Parse {
                        field: "coordinates",
                        token: self.crash_id,
                        position: 0,
                    })
                }
            },
        };

        let severity = self.severity.parse().unwrap_or(crate::Severity::NonInjury);
        let datetime = parse_crash_datetime(self.crash_date.as_deref(), self.crash_time.as_deref());

        Ok(Crash {
            id: self.crash_id,
            easting,
            northing,
            severity,
            datetime,
            road_name: self.road_name.filter(|s| !s.trim().is_empty()),
            locality: self.locality.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// One row of the trip table, with the four encoded parallel sequences.
#[derive(Debug, Clone, Deserialize)]
pub struct TripRow {
    pub vehicle_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub vehicle_type: String,
    #[serde(default)]
    pub raw_path: String,
    #[serde(default)]
    pub timestamp_path: String,
    #[serde(default)]
    pub speed_path: String,
    #[serde(default)]
    pub acceleration_path: String,
}

impl TripRow {
    /// Decode the encoded sequences into a [`Trip`].
    pub fn into_trip(self) -> (Trip, DecodeStats) {
        let (points, stats) = trajectory::decode_points(
            &self.raw_path,
            &self.timestamp_path,
            &self.speed_path,
            &self.acceleration_path,
        );
        let vehicle_type = self
            .vehicle_type
            .parse()
            .unwrap_or(crate::VehicleType::Unknown);
        (
            Trip::new(self.vehicle_id, self.trip_id, vehicle_type, points),
            stats,
        )
    }
}

// ===== Readers =====

/// Read and convert the crash table, optionally filtered to one year.
///
/// Rows that cannot be converted are logged and skipped; the batch runs
/// on whatever loads. Fails only when the file itself is missing or
/// unreadable.
pub fn read_crashes(path: &Path, year: Option<i32>) -> Result<Vec<Crash>> {
    if !path.exists() {
        return Err(LinkError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut crashes = Vec::new();
    let mut skipped = 0usize;

    for record in reader.deserialize::<CrashRow>() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                warn!("crash row skipped: {}", err);
                skipped += 1;
                continue;
            }
        };
        if let Some(filter) = year {
            // Rows with no year information at all are kept
            if row.year().map_or(false, |y| y != filter) {
                continue;
            }
        }
        match row.into_crash() {
            Ok(crash) => crashes.push(crash),
            Err(err) => {
                warn!("crash row skipped: {}", err);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(
            "{} crash row(s) skipped while reading {}",
            skipped,
            path.display()
        );
    }
    Ok(crashes)
}

/// Read and decode the trip table.
///
/// Malformed rows are skipped and counted; malformed points within a row
/// are handled by the decoder and reported through its stats.
pub fn read_trips(path: &Path) -> Result<Vec<Trip>> {
    if !path.exists() {
        return Err(LinkError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut trips = Vec::new();
    let mut bad_rows = 0usize;
    let mut dropped_points = 0usize;

    for record in reader.deserialize::<TripRow>() {
        match record {
            Ok(row) => {
                let (trip, stats) = row.into_trip();
                dropped_points += stats.dropped();
                trips.push(trip);
            }
            Err(err) => {
                warn!("trip row skipped: {}", err);
                bad_rows += 1;
            }
        }
    }

    if bad_rows > 0 || dropped_points > 0 {
        warn!(
            "{}: {} row(s) skipped, {} point(s) dropped",
            path.display(),
            bad_rows,
            dropped_points
        );
    }
    Ok(trips)
}

// ===== Output Rows =====

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Crash attributes joined into the output tables so downstream
/// consumers need no second lookup. Unknown crash ids leave both
/// columns empty.
fn crash_columns(store: &CrashStore, crash_id: &str) -> (String, String) {
    match store.get_by_id(crash_id) {
        Some(crash) => (
            crash.severity.to_string(),
            crash.road_name.clone().unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    }
}

/// One retained proximity match, joined with crash attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub crash_id: String,
    pub vehicle_id: String,
    pub trip_id: String,
    pub vehicle_type: String,
    pub distance: f64,
    pub speed: f64,
    pub acceleration: f64,
    pub timestamp: String,
    pub severity: String,
    pub road_name: String,
    pub point_index: usize,
}

impl MatchRow {
    pub fn new(m: &ProximityMatch, store: &CrashStore) -> Self {
        let (severity, road_name) = crash_columns(store, &m.crash_id);
        MatchRow {
            crash_id: m.crash_id.clone(),
            vehicle_id: m.vehicle_id.clone(),
            trip_id: m.trip_id.clone(),
            vehicle_type: m.vehicle_type.to_string(),
            distance: round2(m.distance),
            speed: m.speed,
            acceleration: m.acceleration,
            timestamp: m.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            severity,
            road_name,
            point_index: m.point_index,
        }
    }
}

/// Match table rows ready to write.
pub fn match_rows(matches: &[ProximityMatch], store: &CrashStore) -> Vec<MatchRow> {
    matches.iter().map(|m| MatchRow::new(m, store)).collect()
}

/// A match row plus its involvement score and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub crash_id: String,
    pub vehicle_id: String,
    pub trip_id: String,
    pub vehicle_type: String,
    pub distance: f64,
    pub speed: f64,
    pub acceleration: f64,
    pub timestamp: String,
    pub severity: String,
    pub road_name: String,
    pub involvement_score: f64,
    pub tier: String,
}

impl ScoredRow {
    pub fn new(m: &ScoredMatch, store: &CrashStore) -> Self {
        let (severity, road_name) = crash_columns(store, &m.proximity.crash_id);
        ScoredRow {
            crash_id: m.proximity.crash_id.clone(),
            vehicle_id: m.proximity.vehicle_id.clone(),
            trip_id: m.proximity.trip_id.clone(),
            vehicle_type: m.proximity.vehicle_type.to_string(),
            distance: round2(m.proximity.distance),
            speed: m.proximity.speed,
            acceleration: m.proximity.acceleration,
            timestamp: m.proximity.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            severity,
            road_name,
            involvement_score: round2(m.involvement_score),
            tier: m.tier.to_string(),
        }
    }
}

/// Scored table rows ready to write.
pub fn scored_rows(scored: &[ScoredMatch], store: &CrashStore) -> Vec<ScoredRow> {
    scored.iter().map(|m| ScoredRow::new(m, store)).collect()
}

/// A scored row plus its validated window and combined confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRow {
    pub crash_id: String,
    pub vehicle_id: String,
    pub trip_id: String,
    pub vehicle_type: String,
    pub distance: f64,
    pub timestamp: String,
    pub severity: String,
    pub road_name: String,
    pub involvement_score: f64,
    pub tier: String,
    pub window_minutes: u32,
    pub time_delta_seconds: i64,
    pub combined_confidence: f64,
}

impl TemporalRow {
    pub fn new(m: &TemporalMatch, store: &CrashStore) -> Self {
        let (severity, road_name) = crash_columns(store, &m.scored.proximity.crash_id);
        TemporalRow {
            crash_id: m.scored.proximity.crash_id.clone(),
            vehicle_id: m.scored.proximity.vehicle_id.clone(),
            trip_id: m.scored.proximity.trip_id.clone(),
            vehicle_type: m.scored.proximity.vehicle_type.to_string(),
            distance: round2(m.scored.proximity.distance),
            timestamp: m
                .scored
                .proximity
                .timestamp
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            severity,
            road_name,
            involvement_score: round2(m.scored.involvement_score),
            tier: m.scored.tier.to_string(),
            window_minutes: m.window_minutes,
            time_delta_seconds: m.time_delta_seconds,
            combined_confidence: round2(m.combined_confidence),
        }
    }
}

/// Temporal table rows ready to write.
pub fn temporal_rows(validated: &[TemporalMatch], store: &CrashStore) -> Vec<TemporalRow> {
    validated.iter().map(|m| TemporalRow::new(m, store)).collect()
}

/// One vehicle's tag for one crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub vehicle_id: String,
    pub trip_id: String,
    pub crash_id: String,
    pub classification: String,
    pub reason: String,
}

impl From<&Classification> for ClassificationRow {
    fn from(c: &Classification) -> Self {
        ClassificationRow {
            vehicle_id: c.vehicle_id.clone(),
            trip_id: c.trip_id.clone(),
            crash_id: c.crash_id.clone(),
            classification: c.tag.to_string(),
            reason: c.reason.clone(),
        }
    }
}

/// Classification table rows ready to write.
pub fn classification_rows(classifications: &[Classification]) -> Vec<ClassificationRow> {
    classifications.iter().map(ClassificationRow::from).collect()
}

// ===== Writers =====

/// Write rows to a fresh file, header included. Overwrites.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Append rows, writing the header only when the file does not exist
/// yet. Matches the checkpoint discipline: a resumed batch keeps
/// appending to the same output files.
pub fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let write_header = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a whole output table back, e.g. for summary reporting.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(LinkError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize::<T>() {
        rows.push(record?);
    }
    Ok(rows)
}
