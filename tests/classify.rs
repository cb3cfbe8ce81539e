//! Tests for participant classification
//!
//! Trips are engineered around a crash at (174.7600, -36.8500), about
//! 1.4km from the nearest default facility, so the facility rule only
//! fires where a test puts an endpoint at a hospital on purpose.

use chrono::NaiveDateTime;
use crashmatch::classify::{classify_match, classify_matches, extract_features, ClassifyConfig};
use crashmatch::engine::CrashStore;
use crashmatch::{
    projection, ConfidenceTier, Crash, ParticipantTag, ProximityMatch, ScoredMatch, Severity,
    TemporalMatch, TrajectoryPoint, Trip, VehicleType,
};

const CRASH_LON: f64 = 174.7600;
const CRASH_LAT: f64 = -36.8500;
const CRASH_TIME: &str = "2024-03-01 08:00:00";

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn crash() -> Crash {
    let (easting, northing) = projection::project(CRASH_LON, CRASH_LAT).unwrap();
    Crash::new("c-001", easting, northing, Severity::Serious).with_datetime(ts(CRASH_TIME))
}

fn tpoint(longitude: f64, latitude: f64, t: &str, speed: f64, acceleration: f64) -> TrajectoryPoint {
    TrajectoryPoint::new(ts(t), longitude, latitude, speed, acceleration)
}

fn temporal(
    vehicle: &str,
    trip: &str,
    point_index: usize,
    timestamp: &str,
    confidence: f64,
) -> TemporalMatch {
    TemporalMatch {
        scored: ScoredMatch {
            proximity: ProximityMatch {
                vehicle_id: vehicle.to_string(),
                trip_id: trip.to_string(),
                vehicle_type: VehicleType::Car,
                crash_id: "c-001".to_string(),
                distance: 5.0,
                speed: 10.0,
                acceleration: -1.0,
                timestamp: ts(timestamp),
                point_index,
            },
            involvement_score: 80.0,
            tier: ConfidenceTier::High,
        },
        window_minutes: 5,
        time_delta_seconds: 60,
        combined_confidence: confidence,
    }
}

/// Hard stop at the crash, a short stay, then departure. Closest
/// approach is index 4.
fn stopping_trip(vehicle: &str, trip: &str) -> Trip {
    let points = vec![
        tpoint(174.7560, CRASH_LAT, "2024-03-01 07:59:40", 50.0, 0.0),
        tpoint(174.7570, CRASH_LAT, "2024-03-01 07:59:45", 50.0, 0.0),
        tpoint(174.7580, CRASH_LAT, "2024-03-01 07:59:50", 50.0, 0.0),
        tpoint(174.7590, CRASH_LAT, "2024-03-01 07:59:55", 50.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, CRASH_TIME, 2.0, -4.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:05", 1.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:10", 1.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:15", 1.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:20", 1.0, 0.0),
        tpoint(174.7610, CRASH_LAT, "2024-03-01 08:00:25", 20.0, 1.5),
        tpoint(174.7620, CRASH_LAT, "2024-03-01 08:00:30", 40.0, 1.5),
    ];
    Trip::new(vehicle, trip, VehicleType::Car, points)
}

/// Constant 50 km/h pass ~22m north of the crash. Closest approach is
/// index 4.
fn passing_trip(vehicle: &str, trip: &str) -> Trip {
    let start = ts("2024-03-01 07:59:40");
    let points = (0..9)
        .map(|i| {
            TrajectoryPoint::new(
                start + chrono::Duration::seconds(5 * i),
                174.7560 + 0.001 * i as f64,
                CRASH_LAT + 0.0002,
                50.0,
                0.0,
            )
        })
        .collect();
    Trip::new(vehicle, trip, VehicleType::Car, points)
}

#[test]
fn test_hard_stop_with_stay_is_a_participant() {
    let crash = crash();
    let trip = stopping_trip("veh-1", "trip-1");
    let m = temporal("veh-1", "trip-1", 4, CRASH_TIME, 90.0);

    let c = classify_match(&trip, &m, &crash, &ClassifyConfig::default());
    assert_eq!(c.tag, ParticipantTag::Participant);
    assert!(c.reason.contains("sudden deceleration"), "reason: {}", c.reason);
    assert!(c.reason.contains("stayed at scene"), "reason: {}", c.reason);
}

#[test]
fn test_participant_features() {
    let features = extract_features(
        &stopping_trip("veh-1", "trip-1"),
        4,
        &crash(),
        &ClassifyConfig::default(),
    );

    assert!(features.sudden_deceleration, "50 -> 2 km/h is a sudden drop");
    assert!(features.stayed_at_scene);
    assert!(!features.strong_acceleration);
    assert_eq!(features.scene_point_count, 5);
    assert_eq!(features.time_at_scene_seconds, 20);
    assert_eq!(features.indicator_count(), 2);
}

#[test]
fn test_steady_pass_is_a_witness() {
    let crash = crash();
    let trip = passing_trip("veh-2", "trip-2");
    let m = temporal("veh-2", "trip-2", 4, CRASH_TIME, 60.0);

    let c = classify_match(&trip, &m, &crash, &ClassifyConfig::default());
    assert_eq!(c.tag, ParticipantTag::Witness);
    assert!(c.reason.contains("no braking anomaly"), "reason: {}", c.reason);
}

#[test]
fn test_braking_alone_defaults_to_witness() {
    // Sharp brake at closest approach but no stay and no spike: one
    // indicator is not enough
    let points = vec![
        tpoint(174.7580, CRASH_LAT, "2024-03-01 07:59:50", 60.0, 0.0),
        tpoint(174.7590, CRASH_LAT, "2024-03-01 07:59:55", 60.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, CRASH_TIME, 20.0, -3.0),
        tpoint(174.7615, CRASH_LAT, "2024-03-01 08:00:05", 45.0, 2.0),
        tpoint(174.7630, CRASH_LAT, "2024-03-01 08:00:10", 60.0, 2.0),
    ];
    let trip = Trip::new("veh-3", "trip-3", VehicleType::Car, points);
    let m = temporal("veh-3", "trip-3", 2, CRASH_TIME, 70.0);

    let c = classify_match(&trip, &m, &crash(), &ClassifyConfig::default());
    assert_eq!(c.tag, ParticipantTag::Witness);
    assert!(c.reason.contains("defaulting to witness"), "reason: {}", c.reason);
}

#[test]
fn test_facility_origin_is_a_responder() {
    // Departs from Auckland City Hospital, stops at the crash
    let points = vec![
        tpoint(174.7690, -36.8606, "2024-03-01 07:58:00", 0.0, 0.0),
        tpoint(174.7660, -36.8570, "2024-03-01 07:58:20", 80.0, 2.0),
        tpoint(174.7630, -36.8535, "2024-03-01 07:58:40", 80.0, 0.0),
        tpoint(174.7615, -36.8515, "2024-03-01 07:58:50", 60.0, -1.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 07:59:00", 10.0, -3.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 07:59:10", 0.0, 0.0),
    ];
    let trip = Trip::new("veh-4", "trip-4", VehicleType::Car, points);
    let m = temporal("veh-4", "trip-4", 4, "2024-03-01 07:59:00", 85.0);

    let c = classify_match(&trip, &m, &crash(), &ClassifyConfig::default());
    assert_eq!(c.tag, ParticipantTag::EmergencyResponder);
    assert!(c.reason.contains("origin"), "reason: {}", c.reason);
    assert!(c.reason.contains("Auckland City Hospital"), "reason: {}", c.reason);
}

#[test]
fn test_high_speed_brief_visit_is_a_responder() {
    // Peak 110 km/h, two scene points, gone within 30 seconds; both
    // endpoints are well away from any facility
    let points = vec![
        tpoint(174.7300, -36.8200, "2024-03-01 07:58:00", 80.0, 0.0),
        tpoint(174.7400, -36.8300, "2024-03-01 07:58:20", 110.0, 2.0),
        tpoint(174.7500, -36.8400, "2024-03-01 07:58:40", 110.0, 0.0),
        tpoint(174.7580, -36.8480, "2024-03-01 07:59:20", 70.0, -2.0),
        tpoint(CRASH_LON, CRASH_LAT, CRASH_TIME, 5.0, -4.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:30", 0.0, 0.0),
        tpoint(174.7660, -36.8470, "2024-03-01 08:01:00", 60.0, 2.0),
        tpoint(174.7720, -36.8450, "2024-03-01 08:01:30", 80.0, 0.0),
    ];
    let trip = Trip::new("veh-5", "trip-5", VehicleType::Car, points);
    let m = temporal("veh-5", "trip-5", 4, CRASH_TIME, 85.0);

    let c = classify_match(&trip, &m, &crash(), &ClassifyConfig::default());
    assert_eq!(c.tag, ParticipantTag::EmergencyResponder);
    assert!(c.reason.contains("high-speed approach"), "reason: {}", c.reason);
}

#[test]
fn test_features_without_a_previous_point() {
    // Closest approach at the very first point: no speed step to inspect
    let points = vec![
        tpoint(CRASH_LON, CRASH_LAT, CRASH_TIME, 2.0, -4.0),
        tpoint(CRASH_LON, CRASH_LAT, "2024-03-01 08:00:05", 1.0, 0.0),
    ];
    let trip = Trip::new("veh-6", "trip-6", VehicleType::Car, points);

    let features = extract_features(&trip, 0, &crash(), &ClassifyConfig::default());
    assert!(!features.sudden_deceleration);
    assert_eq!(features.scene_point_count, 2);
}

#[test]
fn test_features_out_of_bounds_index() {
    let trip = passing_trip("veh-7", "trip-7");
    let features = extract_features(&trip, 99, &crash(), &ClassifyConfig::default());
    assert_eq!(features, Default::default());
    assert_eq!(features.indicator_count(), 0);
}

#[test]
fn test_strong_acceleration_spike_in_window() {
    let points = vec![
        tpoint(174.7590, CRASH_LAT, "2024-03-01 07:59:55", 50.0, 0.0),
        tpoint(CRASH_LON, CRASH_LAT, CRASH_TIME, 10.0, -3.0),
        tpoint(174.7605, CRASH_LAT, "2024-03-01 08:00:05", 30.0, 6.5),
    ];
    let trip = Trip::new("veh-8", "trip-8", VehicleType::Car, points);

    let features = extract_features(&trip, 1, &crash(), &ClassifyConfig::default());
    assert!(features.strong_acceleration);
}

#[test]
fn test_one_tag_per_vehicle_crash_pair() {
    // Same vehicle matched the same crash on two trips; the
    // higher-confidence match decides the tag
    let store = CrashStore::from_crashes(vec![crash()]);
    let trips = vec![
        passing_trip("veh-9", "trip-low"),
        stopping_trip("veh-9", "trip-high"),
    ];
    let matches = vec![
        temporal("veh-9", "trip-low", 4, CRASH_TIME, 55.0),
        temporal("veh-9", "trip-high", 4, CRASH_TIME, 90.0),
    ];

    let out = classify_matches(&matches, &trips, &store, &ClassifyConfig::default());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].trip_id, "trip-high");
    assert_eq!(out[0].tag, ParticipantTag::Participant);
}

#[test]
fn test_matches_without_their_trip_are_left_unclassified() {
    let store = CrashStore::from_crashes(vec![crash()]);
    let trips = vec![passing_trip("veh-2", "trip-2")];
    let matches = vec![
        temporal("veh-2", "trip-2", 4, CRASH_TIME, 60.0),
        temporal("veh-x", "trip-missing", 4, CRASH_TIME, 95.0),
    ];

    let out = classify_matches(&matches, &trips, &store, &ClassifyConfig::default());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].vehicle_id, "veh-2");
}

#[test]
fn test_output_sorted_by_vehicle_then_crash() {
    let store = CrashStore::from_crashes(vec![crash()]);
    let trips = vec![
        passing_trip("veh-b", "trip-b"),
        passing_trip("veh-a", "trip-a"),
    ];
    let matches = vec![
        temporal("veh-b", "trip-b", 4, CRASH_TIME, 60.0),
        temporal("veh-a", "trip-a", 4, CRASH_TIME, 60.0),
    ];

    let out = classify_matches(&matches, &trips, &store, &ClassifyConfig::default());
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].vehicle_id, "veh-a");
    assert_eq!(out[1].vehicle_id, "veh-b");
}
