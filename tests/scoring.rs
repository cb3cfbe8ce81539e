//! Tests for involvement scoring

use approx::assert_relative_eq;
use chrono::NaiveDateTime;
use crashmatch::engine::CrashStore;
use crashmatch::scoring::{
    filter_candidates, score_match, score_matches, top_matches_per_crash, ScoreConfig,
};
use crashmatch::{Crash, ConfidenceTier, LinkError, ProximityMatch, Severity, VehicleType};

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn proximity(distance: f64, speed: f64, acceleration: f64) -> ProximityMatch {
    ProximityMatch {
        vehicle_id: "veh-1".to_string(),
        trip_id: "trip-1".to_string(),
        vehicle_type: VehicleType::Car,
        crash_id: "c-001".to_string(),
        distance,
        speed,
        acceleration,
        timestamp: ts("2024-03-01 08:00:00"),
        point_index: 0,
    }
}

fn score(distance: f64, speed: f64, acceleration: f64, severity: Severity) -> f64 {
    score_match(&proximity(distance, speed, acceleration), severity, &ScoreConfig::default())
        .involvement_score
}

#[test]
fn test_stationary_braking_fatal_scores_maximum() {
    // At the crash, stopped, hard braking, fatal: every component maxes out
    let scored = score_match(
        &proximity(0.0, 0.0, -5.0),
        Severity::Fatal,
        &ScoreConfig::default(),
    );
    assert_relative_eq!(scored.involvement_score, 100.0);
    assert_eq!(scored.tier, ConfidenceTier::High);
}

#[test]
fn test_distant_fast_noninjury_scores_zero() {
    // At the buffer edge, at the high-speed threshold, no braking
    assert_relative_eq!(score(100.0, 60.0, 0.0, Severity::NonInjury), 0.0);
    // Faster than the threshold is no better
    assert_relative_eq!(score(100.0, 85.0, 0.0, Severity::NonInjury), 0.0);
}

#[test]
fn test_mid_range_components_add_up() {
    // distance 50m -> 15 of 30, speed 30 -> 20 of 40, no braking, no bonus
    assert_relative_eq!(score(50.0, 30.0, 0.0, Severity::NonInjury), 35.0);
}

#[test]
fn test_score_non_increasing_in_distance() {
    let mut last = f64::INFINITY;
    for distance in [0.0, 25.0, 50.0, 75.0, 100.0] {
        let s = score(distance, 20.0, 0.0, Severity::Minor);
        assert!(s <= last, "score rose from {} to {} at {}m", last, s, distance);
        last = s;
    }
}

#[test]
fn test_score_non_increasing_in_speed() {
    let mut last = f64::INFINITY;
    for speed in [0.0, 15.0, 30.0, 45.0, 60.0, 90.0] {
        let s = score(10.0, speed, 0.0, Severity::Minor);
        assert!(s <= last, "score rose from {} to {} at {} km/h", last, s, speed);
        last = s;
    }
}

#[test]
fn test_only_deceleration_counts() {
    // Positive acceleration earns nothing over coasting
    assert_relative_eq!(
        score(50.0, 30.0, 3.0, Severity::NonInjury),
        score(50.0, 30.0, 0.0, Severity::NonInjury)
    );
    // Braking earns points
    assert!(score(50.0, 30.0, -3.0, Severity::NonInjury) > score(50.0, 30.0, 0.0, Severity::NonInjury));
}

#[test]
fn test_deceleration_saturates() {
    // Anything past the saturation point scores the same
    assert_relative_eq!(
        score(50.0, 30.0, -5.0, Severity::NonInjury),
        score(50.0, 30.0, -12.0, Severity::NonInjury)
    );
}

#[test]
fn test_severity_bonus_ladder() {
    let base = score(50.0, 30.0, 0.0, Severity::NonInjury);
    assert_relative_eq!(score(50.0, 30.0, 0.0, Severity::Minor), base + 3.0);
    assert_relative_eq!(score(50.0, 30.0, 0.0, Severity::Serious), base + 7.0);
    assert_relative_eq!(score(50.0, 30.0, 0.0, Severity::Fatal), base + 10.0);
}

#[test]
fn test_score_clamped_to_valid_range() {
    // Components already max out at 90 + 10 bonus; the clamp holds the cap
    let s = score(0.0, 0.0, -20.0, Severity::Fatal);
    assert!(s <= 100.0);
    assert!(score(100.0, 90.0, 5.0, Severity::NonInjury) >= 0.0);
}

#[test]
fn test_tier_thresholds() {
    let config = ScoreConfig::default();
    assert_eq!(config.tier(49.9), ConfidenceTier::Low);
    assert_eq!(config.tier(50.0), ConfidenceTier::Candidate);
    assert_eq!(config.tier(69.9), ConfidenceTier::Candidate);
    assert_eq!(config.tier(70.0), ConfidenceTier::Probable);
    assert_eq!(config.tier(80.0), ConfidenceTier::High);
    assert_eq!(config.tier(100.0), ConfidenceTier::High);
}

#[test]
fn test_score_matches_resolves_severity_from_store() {
    let store = CrashStore::from_crashes(vec![Crash::new(
        "c-001",
        1_757_000.0,
        5_920_000.0,
        Severity::Fatal,
    )]);

    let scored = score_matches(&[proximity(0.0, 0.0, -5.0)], &store, &ScoreConfig::default())
        .unwrap();
    assert_eq!(scored.len(), 1);
    assert_relative_eq!(scored[0].involvement_score, 100.0);
}

#[test]
fn test_score_matches_unknown_crash_is_an_error() {
    let store = CrashStore::from_crashes(vec![Crash::new(
        "c-001",
        1_757_000.0,
        5_920_000.0,
        Severity::Minor,
    )]);

    let mut m = proximity(10.0, 20.0, 0.0);
    m.crash_id = "c-999".to_string();
    let result = score_matches(&[m], &store, &ScoreConfig::default());
    assert!(matches!(result, Err(LinkError::UnknownCrash { .. })));
}

#[test]
fn test_filter_candidates_threshold() {
    let config = ScoreConfig::default();
    let store = CrashStore::from_crashes(vec![Crash::new(
        "c-001",
        1_757_000.0,
        5_920_000.0,
        Severity::NonInjury,
    )]);

    // 35 and 75 point matches; only the second reaches candidate level
    let scored = score_matches(
        &[proximity(50.0, 30.0, 0.0), proximity(0.0, 15.0, -5.0)],
        &store,
        &config,
    )
    .unwrap();
    let kept = filter_candidates(scored, &config);
    assert_eq!(kept.len(), 1);
    assert!(kept[0].involvement_score >= config.candidate_score);
}

#[test]
fn test_top_matches_per_crash_limit_and_order() {
    let config = ScoreConfig::default();
    let store = CrashStore::from_crashes(vec![
        Crash::new("c-001", 1_757_000.0, 5_920_000.0, Severity::NonInjury),
        Crash::new("c-002", 1_758_000.0, 5_921_000.0, Severity::NonInjury),
    ]);

    let mut matches = Vec::new();
    for (i, distance) in [80.0, 40.0, 10.0].iter().enumerate() {
        let mut m = proximity(*distance, 0.0, 0.0);
        m.trip_id = format!("trip-{}", i);
        matches.push(m);
    }
    let mut other = proximity(5.0, 0.0, 0.0);
    other.crash_id = "c-002".to_string();
    matches.push(other);

    let scored = score_matches(&matches, &store, &config).unwrap();
    let top = top_matches_per_crash(&scored, 2);

    // Two kept for c-001 (best first), one for c-002
    assert_eq!(top.len(), 3);
    let c1: Vec<_> = top.iter().filter(|m| m.proximity.crash_id == "c-001").collect();
    assert_eq!(c1.len(), 2);
    assert!(c1[0].involvement_score >= c1[1].involvement_score);
    assert_relative_eq!(c1[0].proximity.distance, 10.0);
}
