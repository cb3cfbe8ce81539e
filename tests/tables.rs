//! Tests for CSV table reading and writing
//!
//! Fixtures are written as raw CSV text so the column handling is
//! exercised end to end, including blank optional fields.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use crashmatch::engine::CrashStore;
use crashmatch::{
    append_rows, match_rows, read_crashes, read_rows, read_trips, write_rows, Crash, MatchRow,
    ProximityMatch, Severity, VehicleType,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("crashmatch-tables-{}-{}", std::process::id(), name))
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

const CRASH_CSV: &str = "\
crash_id,easting,northing,latitude,longitude,severity,crash_date,crash_time,road_name,year
c-001,1757036.0,5920184.0,,,Fatal Crash,2024-03-01,08:00,Queen Street,2024
c-002,,,-36.8485,174.7633,Serious Crash,2024-06-14,17:30,Karangahape Road,2024
c-003,,,-36.7500,174.6000,Minor Crash,2023-01-05,09:15,State Highway 16,
c-004,,,-36.9000,174.8000,non-injury,,,Great South Road,
c-005,,,,,Serious Crash,2024-02-02,10:00,Nowhere Road,2024
";

#[test]
fn test_read_crashes_mixed_coordinate_sources() {
    let path = temp_path("crashes-mixed.csv");
    fs::write(&path, CRASH_CSV).unwrap();

    let crashes = read_crashes(&path, None).unwrap();
    // c-005 has no coordinates at all and is skipped
    assert_eq!(crashes.len(), 4);

    // Projected coordinates pass through untouched
    let first = &crashes[0];
    assert_eq!(first.id, "c-001");
    assert_eq!(first.easting, 1_757_036.0);
    assert_eq!(first.northing, 5_920_184.0);
    assert_eq!(first.severity, Severity::Fatal);
    assert_eq!(first.datetime, Some(ts("2024-03-01 08:00:00")));
    assert_eq!(first.road_name.as_deref(), Some("Queen Street"));

    // Geodetic coordinates land in the Auckland grid range
    let second = &crashes[1];
    assert!(
        (1_750_000.0..1_765_000.0).contains(&second.easting),
        "easting {}",
        second.easting
    );
    assert!(
        (5_910_000.0..5_930_000.0).contains(&second.northing),
        "northing {}",
        second.northing
    );

    // Missing date leaves the crash undated, not rejected
    let fourth = &crashes[3];
    assert_eq!(fourth.id, "c-004");
    assert_eq!(fourth.datetime, None);
    assert_eq!(fourth.severity, Severity::NonInjury);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_read_crashes_year_filter() {
    let path = temp_path("crashes-year.csv");
    fs::write(&path, CRASH_CSV).unwrap();

    let crashes = read_crashes(&path, Some(2024)).unwrap();
    let ids: Vec<&str> = crashes.iter().map(|c| c.id.as_str()).collect();

    // c-003 has no year column but its date says 2023; c-004 carries no
    // year information at all and is kept
    assert_eq!(ids, vec!["c-001", "c-002", "c-004"]);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_read_crashes_missing_file() {
    let result = read_crashes(&temp_path("no-such-crashes.csv"), None);
    assert!(result.is_err());
}

#[test]
fn test_read_trips_decodes_encoded_sequences() {
    let path = temp_path("trips.csv");
    let csv = "\
vehicle_id,trip_id,vehicle_type,raw_path,timestamp_path,speed_path,acceleration_path
veh-1,trip-1,HCV,\"174.7600 -36.8500,174.7610 -36.8500\",\"2024-03-01 08:00:00,2024-03-01 08:00:05\",\"48.0,47.2\",\"0.1,-0.2\"
veh-2,trip-2,scooter,\"174.8000 -36.9000\",\"2024-03-01 09:00:00\",\"30.0\",\"0.0\"
";
    fs::write(&path, csv).unwrap();

    let trips = read_trips(&path).unwrap();
    assert_eq!(trips.len(), 2);

    let first = &trips[0];
    assert_eq!(first.vehicle_id, "veh-1");
    assert_eq!(first.vehicle_type, VehicleType::Hcv);
    assert_eq!(first.points.len(), 2);
    assert_eq!(first.points[0].longitude, 174.7600);
    assert_eq!(first.points[0].timestamp, ts("2024-03-01 08:00:00"));
    assert_eq!(first.points[1].speed, 47.2);
    assert_eq!(first.points[1].acceleration, -0.2);

    // Unrecognized vehicle types degrade to Unknown
    assert_eq!(trips[1].vehicle_type, VehicleType::Unknown);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_write_then_read_round_trip() {
    let path = temp_path("rows-roundtrip.csv");
    let store = CrashStore::from_crashes(vec![Crash {
        id: "c-001".to_string(),
        easting: 1_757_000.0,
        northing: 5_920_000.0,
        severity: Severity::Serious,
        datetime: Some(ts("2024-03-01 08:00:00")),
        road_name: Some("Queen Street".to_string()),
        locality: None,
    }]);
    let matches = vec![ProximityMatch {
        vehicle_id: "veh-1".to_string(),
        trip_id: "trip-1".to_string(),
        vehicle_type: VehicleType::Car,
        crash_id: "c-001".to_string(),
        distance: 12.3456,
        speed: 48.0,
        acceleration: -0.2,
        timestamp: ts("2024-03-01 08:00:05"),
        point_index: 7,
    }];

    let rows = match_rows(&matches, &store);
    write_rows(&path, &rows).unwrap();
    let back: Vec<MatchRow> = read_rows(&path).unwrap();

    assert_eq!(back.len(), 1);
    assert_eq!(back[0].crash_id, "c-001");
    assert_eq!(back[0].distance, 12.35, "distances round to 2dp");
    assert_eq!(back[0].severity, "Serious");
    assert_eq!(back[0].road_name, "Queen Street");
    assert_eq!(back[0].timestamp, "2024-03-01 08:00:05");
    assert_eq!(back[0].point_index, 7);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_join_with_unknown_crash_leaves_columns_empty() {
    let store = CrashStore::new();
    let matches = vec![ProximityMatch {
        vehicle_id: "veh-1".to_string(),
        trip_id: "trip-1".to_string(),
        vehicle_type: VehicleType::Car,
        crash_id: "c-404".to_string(),
        distance: 5.0,
        speed: 10.0,
        acceleration: 0.0,
        timestamp: ts("2024-03-01 08:00:00"),
        point_index: 0,
    }];

    let rows = match_rows(&matches, &store);
    assert_eq!(rows[0].severity, "");
    assert_eq!(rows[0].road_name, "");
}

#[test]
fn test_append_rows_writes_the_header_once() {
    let path = temp_path("rows-append.csv");
    let _ = fs::remove_file(&path);

    let store = CrashStore::from_crashes(vec![Crash::new(
        "c-001",
        1_757_000.0,
        5_920_000.0,
        Severity::Minor,
    )]);
    let make = |trip: &str| ProximityMatch {
        vehicle_id: "veh-1".to_string(),
        trip_id: trip.to_string(),
        vehicle_type: VehicleType::Car,
        crash_id: "c-001".to_string(),
        distance: 5.0,
        speed: 10.0,
        acceleration: 0.0,
        timestamp: ts("2024-03-01 08:00:00"),
        point_index: 0,
    };

    append_rows(&path, &match_rows(&[make("trip-1")], &store)).unwrap();
    append_rows(&path, &match_rows(&[make("trip-2")], &store)).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let header_count = contents
        .lines()
        .filter(|line| line.starts_with("crash_id"))
        .count();
    assert_eq!(header_count, 1, "second append must not repeat the header");

    let back: Vec<MatchRow> = read_rows(&path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[1].trip_id, "trip-2");

    let _ = fs::remove_file(&path);
}
