//! Synthetic crash and trip generator for tests and benchmarking.
//!
//! Generates crash sets and vehicle trips with known ground truth: which
//! trips were involved, which merely passed through, and which never
//! came near a crash. Trips are shaped so the matching, scoring,
//! temporal and classification stages all have something to chew on.
//!
//! Feature-gated behind `synthetic` — not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use crashmatch::synthetic::SyntheticScenario;
//!
//! let dataset = SyntheticScenario::standard_linkage().generate();
//! assert_eq!(dataset.crashes.len(), 10);
//! assert!(!dataset.trips.is_empty());
//! assert!(!dataset.expected.is_empty());
//! ```

use std::f64::consts::PI;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::trajectory::TIMESTAMP_FORMAT;
use crate::{projection, Crash, ParticipantTag, Severity, TrajectoryPoint, Trip, VehicleType};

// ============================================================================
// Types
// ============================================================================

/// Ground truth for one (trip, crash) pair the generator planted.
#[derive(Debug, Clone)]
pub struct ExpectedMatch {
    pub vehicle_id: String,
    pub trip_id: String,
    pub crash_id: String,
    /// Role the trip was shaped to earn.
    pub role: ParticipantTag,
    /// Whether the crash carries a datetime (undated crashes never reach
    /// the temporal stage, so their matches stay spatial-only).
    pub crash_dated: bool,
}

/// Metadata about a generated dataset.
#[derive(Debug, Clone, Copy)]
pub struct DatasetMetadata {
    pub crash_count: usize,
    pub trip_count: usize,
    /// Total trajectory points across all trips.
    pub total_points: usize,
}

/// A complete synthetic dataset with ground truth.
pub struct SyntheticDataset {
    pub crashes: Vec<Crash>,
    pub trips: Vec<Trip>,
    pub expected: Vec<ExpectedMatch>,
    pub metadata: DatasetMetadata,
}

/// Scenario configuration for generating synthetic data.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Center of the generated area (WGS84).
    pub longitude: f64,
    pub latitude: f64,
    /// Crashes scattered within `area_radius_meters` of the center.
    pub crash_count: usize,
    /// Trips per crash that brake hard and stop at the scene.
    pub involved_per_crash: usize,
    /// Trips per crash that pass straight through at speed.
    pub witnesses_per_crash: usize,
    /// Trips per crash that start at a hospital and visit briefly.
    pub responders_per_crash: usize,
    /// Trips that never come near any crash.
    pub unrelated_trips: usize,
    /// Crash scatter radius around the center.
    pub area_radius_meters: f64,
    /// Fraction of crashes generated without a datetime.
    pub undated_fraction: f64,
    /// GPS noise standard deviation in meters.
    pub gps_noise_sigma_meters: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

// ============================================================================
// Coordinate Helpers
// ============================================================================

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Sample interval of the generated trajectories, seconds.
const SAMPLE_SECONDS: i64 = 5;

fn meters_to_deg_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

fn meters_to_deg_lon(meters: f64, latitude: f64) -> f64 {
    let meters_per_deg = METERS_PER_DEG_LAT * latitude.to_radians().cos();
    if meters_per_deg.abs() < 1e-10 {
        return 0.0;
    }
    meters / meters_per_deg
}

/// Shift a WGS84 position by an (east, north) meter offset.
fn offset_lonlat(longitude: f64, latitude: f64, east: f64, north: f64) -> (f64, f64) {
    let lat = latitude + meters_to_deg_lat(north);
    let lon = longitude + meters_to_deg_lon(east, latitude);
    (lon, lat)
}

/// Gaussian sample via Box-Muller.
fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * sigma
}

// ============================================================================
// Generation
// ============================================================================

/// A crash plus the WGS84 position and schedule it was planted at. The
/// datetime is kept here even for crashes emitted undated, so their
/// trips can still be scheduled around the event.
struct CrashSite {
    crash: Crash,
    longitude: f64,
    latitude: f64,
    datetime: NaiveDateTime,
}

const SEVERITY_CYCLE: [Severity; 4] = [
    Severity::Fatal,
    Severity::Serious,
    Severity::Minor,
    Severity::NonInjury,
];

const VEHICLE_CYCLE: [VehicleType; 4] = [
    VehicleType::Car,
    VehicleType::Hcv,
    VehicleType::Lcv,
    VehicleType::Bus,
];

/// Auckland City Hospital, the dispatch origin for responder trips.
const DISPATCH_FACILITY: (f64, f64) = (174.7690, -36.8606);

impl SyntheticScenario {
    /// Generate a complete dataset from this scenario.
    ///
    /// Deterministic for a fixed seed. Placements that would fall
    /// outside valid WGS84 ranges are dropped, which cannot happen for
    /// the predefined scenarios.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let base_time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(6, 0, 0))
            .unwrap_or_default();

        // Crash sites scattered around the center
        let mut sites: Vec<CrashSite> = Vec::with_capacity(self.crash_count);
        for i in 0..self.crash_count {
            let radius = self.area_radius_meters * rng.gen_range(0.0_f64..1.0).sqrt();
            let angle = rng.gen_range(0.0..(2.0 * PI));
            let (lon, lat) = offset_lonlat(
                self.longitude,
                self.latitude,
                radius * angle.cos(),
                radius * angle.sin(),
            );
            let (easting, northing) = match projection::project(lon, lat) {
                Ok(projected) => projected,
                Err(_) => continue,
            };

            let datetime = base_time
                + Duration::minutes(30 * i as i64)
                + Duration::seconds(rng.gen_range(0..600));
            let dated = rng.gen_range(0.0..1.0) >= self.undated_fraction;

            let mut crash = Crash::new(
                format!("crash_{:04}", i),
                easting,
                northing,
                SEVERITY_CYCLE[i % SEVERITY_CYCLE.len()],
            );
            if dated {
                crash = crash.with_datetime(datetime);
            }

            sites.push(CrashSite {
                crash,
                longitude: lon,
                latitude: lat,
                datetime,
            });
        }

        let mut trips = Vec::new();
        let mut expected = Vec::new();
        let mut trip_counter = 0usize;

        for site in &sites {
            for _ in 0..self.involved_per_crash {
                let trip = self.involved_trip(site, trip_counter, &mut rng);
                expected.push(self.expectation(&trip, site, ParticipantTag::Participant));
                trips.push(trip);
                trip_counter += 1;
            }
            for _ in 0..self.witnesses_per_crash {
                let trip = self.witness_trip(site, trip_counter, &mut rng);
                expected.push(self.expectation(&trip, site, ParticipantTag::Witness));
                trips.push(trip);
                trip_counter += 1;
            }
            for _ in 0..self.responders_per_crash {
                let trip = self.responder_trip(site, trip_counter, &mut rng);
                expected.push(self.expectation(&trip, site, ParticipantTag::EmergencyResponder));
                trips.push(trip);
                trip_counter += 1;
            }
        }

        for _ in 0..self.unrelated_trips {
            trips.push(self.unrelated_trip(base_time, trip_counter, &mut rng));
            trip_counter += 1;
        }

        let total_points = trips.iter().map(|t| t.points.len()).sum();
        SyntheticDataset {
            metadata: DatasetMetadata {
                crash_count: sites.len(),
                trip_count: trips.len(),
                total_points,
            },
            crashes: sites.into_iter().map(|s| s.crash).collect(),
            trips,
            expected,
        }
    }

    fn expectation(&self, trip: &Trip, site: &CrashSite, role: ParticipantTag) -> ExpectedMatch {
        ExpectedMatch {
            vehicle_id: trip.vehicle_id.clone(),
            trip_id: trip.trip_id.clone(),
            crash_id: site.crash.id.clone(),
            role,
            crash_dated: site.crash.datetime.is_some(),
        }
    }

    fn new_trip(&self, index: usize, points: Vec<TrajectoryPoint>) -> Trip {
        Trip::new(
            format!("veh_{:05}", index),
            format!("trip_{:05}", index),
            VEHICLE_CYCLE[index % VEHICLE_CYCLE.len()],
            points,
        )
    }

    fn noisy_point(
        &self,
        longitude: f64,
        latitude: f64,
        timestamp: NaiveDateTime,
        speed: f64,
        acceleration: f64,
        rng: &mut StdRng,
    ) -> TrajectoryPoint {
        let (lon, lat) = offset_lonlat(
            longitude,
            latitude,
            gaussian(rng, self.gps_noise_sigma_meters),
            gaussian(rng, self.gps_noise_sigma_meters),
        );
        TrajectoryPoint::new(timestamp, lon, lat, speed, acceleration)
    }

    /// Cruise in, brake hard at the crash, stop for half a minute, drive
    /// off. Earns sudden deceleration and stayed-at-scene indicators.
    fn involved_trip(&self, site: &CrashSite, index: usize, rng: &mut StdRng) -> Trip {
        let heading = rng.gen_range(0.0..(2.0 * PI));
        let cruise_speed = rng.gen_range(45.0..55.0);
        let step = cruise_speed / 3.6 * SAMPLE_SECONDS as f64;

        // The stop lands one minute after the crash
        let arrival = site.datetime + Duration::seconds(60);
        let mut points = Vec::new();

        // 20 cruise samples closing in on the crash
        for i in 0..20 {
            let remaining = step + (19 - i) as f64 * step;
            let (lon, lat) = offset_lonlat(
                site.longitude,
                site.latitude,
                -remaining * heading.cos(),
                -remaining * heading.sin(),
            );
            let timestamp = arrival - Duration::seconds((20 - i) * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, cruise_speed, 0.0, rng));
        }

        // Hard stop at the crash itself. This sample carries no GPS noise
        // so the braking point, not a parked one, is the closest approach.
        points.push(TrajectoryPoint::new(
            arrival,
            site.longitude,
            site.latitude,
            rng.gen_range(0.0..5.0),
            -(cruise_speed / 3.6) / SAMPLE_SECONDS as f64,
        ));

        // Pull over a few meters clear of the lane and sit for half a minute
        let side = heading + PI / 2.0;
        let (parked_lon, parked_lat) = offset_lonlat(
            site.longitude,
            site.latitude,
            10.0 * side.cos(),
            10.0 * side.sin(),
        );
        for i in 1..=6 {
            let timestamp = arrival + Duration::seconds(i * SAMPLE_SECONDS);
            points.push(self.noisy_point(
                parked_lon,
                parked_lat,
                timestamp,
                rng.gen_range(0.0..3.0),
                0.0,
                rng,
            ));
        }

        // Pull away again
        let depart = heading + rng.gen_range(-0.5..0.5);
        for i in 1..=6 {
            let speed = (i as f64 * 8.0).min(45.0);
            let distance = i as f64 * speed / 3.6 * SAMPLE_SECONDS as f64 / 2.0;
            let (lon, lat) = offset_lonlat(
                site.longitude,
                site.latitude,
                distance * depart.cos(),
                distance * depart.sin(),
            );
            let timestamp = arrival + Duration::seconds((6 + i) * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, speed, 1.5, rng));
        }

        self.new_trip(index, points)
    }

    /// Drive straight through the crash location at constant speed a few
    /// minutes after the event. No braking anomaly.
    fn witness_trip(&self, site: &CrashSite, index: usize, rng: &mut StdRng) -> Trip {
        let heading = rng.gen_range(0.0..(2.0 * PI));
        let speed = rng.gen_range(45.0..58.0);
        let step = speed / 3.6 * SAMPLE_SECONDS as f64;
        let passing = site.datetime + Duration::seconds(rng.gen_range(120..240));

        let mut points = Vec::with_capacity(30);
        for i in 0..30 {
            let along = (i as f64 - 15.0) * step;
            let (lon, lat) = offset_lonlat(
                site.longitude,
                site.latitude,
                along * heading.cos(),
                along * heading.sin(),
            );
            let timestamp = passing + Duration::seconds((i - 15) * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, speed, 0.0, rng));
        }

        self.new_trip(index, points)
    }

    /// Start at the dispatch facility, run hot to the crash, pause only
    /// briefly, leave. Earns the responder rules both ways: hospital
    /// origin and a high-speed approach with little time at the scene.
    fn responder_trip(&self, site: &CrashSite, index: usize, rng: &mut StdRng) -> Trip {
        let (facility_lon, facility_lat) = DISPATCH_FACILITY;
        let arrival = site.datetime + Duration::seconds(rng.gen_range(180..300));
        let mut points = Vec::new();

        // Leave the hospital
        let start = arrival - Duration::seconds(12 * SAMPLE_SECONDS);
        points.push(self.noisy_point(facility_lon, facility_lat, start, 0.0, 0.0, rng));

        // Straight-line dash toward the crash
        for i in 1..10 {
            let fraction = i as f64 / 10.0;
            let lon = facility_lon + (site.longitude - facility_lon) * fraction;
            let lat = facility_lat + (site.latitude - facility_lat) * fraction;
            let timestamp = start + Duration::seconds(i * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, rng.gen_range(105.0..120.0), 0.0, rng));
        }

        // Brief pause at the scene, well under the responder cutoff
        for i in 0..2 {
            let timestamp = arrival + Duration::seconds(i * SAMPLE_SECONDS);
            points.push(self.noisy_point(
                site.longitude,
                site.latitude,
                timestamp,
                rng.gen_range(0.0..5.0),
                0.0,
                rng,
            ));
        }

        // Leave again at pace
        for i in 1..=4 {
            let distance = i as f64 * 120.0;
            let heading = rng.gen_range(0.0..(2.0 * PI));
            let (lon, lat) = offset_lonlat(
                site.longitude,
                site.latitude,
                distance * heading.cos(),
                distance * heading.sin(),
            );
            let timestamp = arrival + Duration::seconds((2 + i) * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, 90.0, 0.0, rng));
        }

        self.new_trip(index, points)
    }

    /// Random drive well outside the crash area.
    fn unrelated_trip(&self, base_time: NaiveDateTime, index: usize, rng: &mut StdRng) -> Trip {
        let heading = rng.gen_range(0.0..(2.0 * PI));
        let base_offset = self.area_radius_meters + 8_000.0;
        let (mut lon, mut lat) = offset_lonlat(
            self.longitude,
            self.latitude,
            base_offset * heading.cos(),
            base_offset * heading.sin(),
        );

        let start = base_time + Duration::seconds(rng.gen_range(0..3_600));
        let mut walk_heading = rng.gen_range(0.0..(2.0 * PI));
        let mut points = Vec::with_capacity(30);

        for i in 0..30 {
            let speed = rng.gen_range(40.0..60.0);
            walk_heading += rng.gen_range(-0.2..0.2);
            let step = speed / 3.6 * SAMPLE_SECONDS as f64;
            let shifted = offset_lonlat(lon, lat, step * walk_heading.cos(), step * walk_heading.sin());
            lon = shifted.0;
            lat = shifted.1;
            let timestamp = start + Duration::seconds(i * SAMPLE_SECONDS);
            points.push(self.noisy_point(lon, lat, timestamp, speed, 0.0, rng));
        }

        self.new_trip(index, points)
    }
}

// ============================================================================
// Predefined Scenarios
// ============================================================================

/// East Auckland, comfortably clear of the dispatch facilities so only
/// the planted responder trips ever start or end near one.
const AUCKLAND_EAST: (f64, f64) = (174.95, -36.92);

impl SyntheticScenario {
    /// 10 crashes, 2 involved + 3 witnesses + 1 responder each, 50
    /// unrelated trips. Baseline end-to-end scenario.
    pub fn standard_linkage() -> Self {
        Self {
            longitude: AUCKLAND_EAST.0,
            latitude: AUCKLAND_EAST.1,
            crash_count: 10,
            involved_per_crash: 2,
            witnesses_per_crash: 3,
            responders_per_crash: 1,
            unrelated_trips: 50,
            area_radius_meters: 3_000.0,
            undated_fraction: 0.0,
            gps_noise_sigma_meters: 2.0,
            seed: 42,
        }
    }

    /// Like the baseline, but a fifth of the crashes carry no datetime.
    /// Exercises the scored-but-never-validated path.
    pub fn partially_dated() -> Self {
        Self {
            undated_fraction: 0.2,
            seed: 43,
            ..Self::standard_linkage()
        }
    }

    /// 50 tightly packed crashes with heavy witness traffic. Stresses
    /// the per-point candidate limit.
    pub fn dense_urban() -> Self {
        Self {
            longitude: AUCKLAND_EAST.0,
            latitude: AUCKLAND_EAST.1,
            crash_count: 50,
            involved_per_crash: 1,
            witnesses_per_crash: 5,
            responders_per_crash: 0,
            unrelated_trips: 200,
            area_radius_meters: 1_500.0,
            undated_fraction: 0.0,
            gps_noise_sigma_meters: 3.0,
            seed: 44,
        }
    }

    /// Configurable scale for benchmarks: `crash_count` crashes, a fixed
    /// role mix per crash, and twice as many unrelated trips as crashes.
    pub fn scaled(crash_count: usize) -> Self {
        Self {
            longitude: AUCKLAND_EAST.0,
            latitude: AUCKLAND_EAST.1,
            crash_count,
            involved_per_crash: 1,
            witnesses_per_crash: 2,
            responders_per_crash: 0,
            unrelated_trips: crash_count * 2,
            area_radius_meters: 5_000.0,
            undated_fraction: 0.0,
            gps_noise_sigma_meters: 2.5,
            seed: crash_count as u64 * 7919,
        }
    }
}

// ============================================================================
// Input-table Export
// ============================================================================

/// Encode trajectory points into the four parallel sequence strings the
/// trip table carries.
pub fn encode_sequences(points: &[TrajectoryPoint]) -> (String, String, String, String) {
    let mut path = Vec::with_capacity(points.len());
    let mut times = Vec::with_capacity(points.len());
    let mut speeds = Vec::with_capacity(points.len());
    let mut accels = Vec::with_capacity(points.len());

    for p in points {
        path.push(format!("{:.6} {:.6}", p.longitude, p.latitude));
        times.push(p.timestamp.format(TIMESTAMP_FORMAT).to_string());
        speeds.push(format!("{:.1}", p.speed));
        accels.push(format!("{:.2}", p.acceleration));
    }

    (
        path.join(","),
        times.join(","),
        speeds.join(","),
        accels.join(","),
    )
}

impl SyntheticDataset {
    /// Write the dataset as input tables the CLI can consume.
    pub fn write_input_tables(&self, crash_path: &Path, trip_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(crash_path)?;
        writer.write_record([
            "crash_id",
            "easting",
            "northing",
            "severity",
            "crash_date",
            "crash_time",
            "year",
        ])?;
        for crash in &self.crashes {
            let (date, time, year) = match crash.datetime {
                Some(dt) => (
                    dt.format("%Y-%m-%d").to_string(),
                    dt.format("%H:%M").to_string(),
                    dt.year().to_string(),
                ),
                None => (String::new(), String::new(), String::new()),
            };
            writer.write_record([
                crash.id.as_str(),
                &format!("{:.2}", crash.easting),
                &format!("{:.2}", crash.northing),
                crash.severity.as_str(),
                &date,
                &time,
                &year,
            ])?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(trip_path)?;
        writer.write_record([
            "vehicle_id",
            "trip_id",
            "vehicle_type",
            "raw_path",
            "timestamp_path",
            "speed_path",
            "acceleration_path",
        ])?;
        for trip in &self.trips {
            let (path, times, speeds, accels) = encode_sequences(&trip.points);
            writer.write_record([
                trip.vehicle_id.as_str(),
                trip.trip_id.as_str(),
                trip.vehicle_type.as_str(),
                &path,
                &times,
                &speeds,
                &accels,
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
