//! Participant classification for validated matches.
//!
//! Separates emergency responders, witnesses and likely participants
//! using behavioral heuristics over the trip's points around closest
//! approach. Pure decision logic: thin data gives a conservative
//! witness tag, never an error.
//!
//! The decision sequence is fixed; the thresholds are not. Facility
//! locations, radii and speed cutoffs all live in [`ClassifyConfig`]
//! because they are empirically tuned, not derived.

use std::cmp::Ordering;
use std::collections::HashMap;

use geo::{HaversineDistance, Point};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::CrashStore;
use crate::{projection, Classification, Crash, ParticipantTag, TemporalMatch, TrajectoryPoint, Trip};

// ===== Configuration =====

/// A known emergency facility. Trips that start or end close to one are
/// treated as responder journeys (dispatch out, or returning with a
/// patient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyFacility {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl EmergencyFacility {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        EmergencyFacility {
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

/// Thresholds for the classification heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifyConfig {
    /// Emergency facilities checked against trip origin and destination.
    pub facilities: Vec<EmergencyFacility>,
    /// Origin/destination distance to a facility that flags a responder.
    pub facility_radius: f64,
    /// Peak trip speed above which a brief scene visit reads as a
    /// responder rather than a participant.
    pub responder_speed_threshold: f64,
    /// Scene time below which a high-speed visitor reads as a responder.
    pub responder_max_scene_seconds: i64,
    /// Points after closest approach inspected for scene behavior.
    pub post_window_points: usize,
    /// Distance from the crash that counts as "at the scene".
    pub scene_radius: f64,
    /// Scene points required before a stop counts as staying.
    pub scene_min_points: usize,
    /// Average scene speed below which the vehicle counts as stopped.
    pub scene_speed_threshold: f64,
    /// Speed drop into closest approach that counts as sudden braking.
    pub sudden_decel_drop: f64,
    /// Acceleration magnitude that counts as a strong spike.
    pub strong_accel_threshold: f64,
    /// Involvement indicators required for a participant tag.
    pub min_indicators: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            facilities: vec![
                EmergencyFacility::new("Auckland City Hospital", -36.8606, 174.7690),
                EmergencyFacility::new("North Shore Hospital", -36.7918, 174.7512),
                EmergencyFacility::new("Middlemore Hospital", -37.0088, 174.9385),
                EmergencyFacility::new("Waitakere Hospital", -36.8977, 174.6241),
                EmergencyFacility::new("Greenlane Hospital", -36.8936, 174.7968),
            ],
            facility_radius: 500.0,           // meters
            responder_speed_threshold: 100.0, // km/h
            responder_max_scene_seconds: 120,
            post_window_points: 20,
            scene_radius: 50.0, // meters
            scene_min_points: 3,
            scene_speed_threshold: 10.0, // km/h
            sudden_decel_drop: 30.0,     // km/h
            strong_accel_threshold: 5.0, // m/s^2
            min_indicators: 2,
        }
    }
}

// ===== Feature extraction =====

/// Per-match behavioral features aggregated from the trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorFeatures {
    /// Enough low-speed points within the scene radius.
    pub stayed_at_scene: bool,
    /// Sharp speed drop into the closest-approach point.
    pub sudden_deceleration: bool,
    /// Acceleration spike anywhere in the post-approach window.
    pub strong_acceleration: bool,
    /// Points of the post-approach window inside the scene radius.
    pub scene_point_count: usize,
    /// Latest scene point, measured from the crash time (or closest
    /// approach when the crash is undated).
    pub time_at_scene_seconds: i64,
}

impl BehaviorFeatures {
    /// How many involvement indicators fired.
    pub fn indicator_count(&self) -> usize {
        usize::from(self.stayed_at_scene)
            + usize::from(self.sudden_deceleration)
            + usize::from(self.strong_acceleration)
    }
}

/// Aggregate scene and braking behavior around one closest approach.
///
/// Inspects the speed step into the closest-approach point plus a
/// bounded window of points after it. Scene membership is measured in
/// projected meters from the crash, so out-of-range points simply drop
/// out of the window.
pub fn extract_features(
    trip: &Trip,
    closest_index: usize,
    crash: &Crash,
    config: &ClassifyConfig,
) -> BehaviorFeatures {
    let mut features = BehaviorFeatures::default();
    let points = &trip.points;
    if closest_index >= points.len() {
        return features;
    }

    if closest_index > 0 {
        let drop = points[closest_index - 1].speed - points[closest_index].speed;
        features.sudden_deceleration = drop > config.sudden_decel_drop;
    }

    let window_end = (closest_index + config.post_window_points).min(points.len());
    let window = &points[closest_index..window_end];

    features.strong_acceleration = window
        .iter()
        .any(|p| p.acceleration.abs() > config.strong_accel_threshold);

    let reference = crash.datetime.unwrap_or(points[closest_index].timestamp);
    let (projected, _) = projection::project_trajectory(window);

    let mut scene_speed_sum = 0.0;
    let mut latest_scene_seconds = 0i64;
    for p in &projected {
        let dx = p.easting - crash.easting;
        let dy = p.northing - crash.northing;
        if (dx * dx + dy * dy).sqrt() <= config.scene_radius {
            let point = &window[p.index];
            features.scene_point_count += 1;
            scene_speed_sum += point.speed;
            let after = point
                .timestamp
                .signed_duration_since(reference)
                .num_seconds();
            latest_scene_seconds = latest_scene_seconds.max(after);
        }
    }

    if features.scene_point_count >= config.scene_min_points {
        let average = scene_speed_sum / features.scene_point_count as f64;
        features.stayed_at_scene = average < config.scene_speed_threshold;
    }
    features.time_at_scene_seconds = latest_scene_seconds.max(0);

    features
}

// ===== Classification =====

fn nearest_facility<'a>(
    point: &TrajectoryPoint,
    facilities: &'a [EmergencyFacility],
) -> Option<(&'a str, f64)> {
    let here = Point::new(point.longitude, point.latitude);
    facilities
        .iter()
        .map(|f| {
            let there = Point::new(f.longitude, f.latitude);
            (f.name.as_str(), here.haversine_distance(&there))
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

fn participant_reason(features: &BehaviorFeatures) -> String {
    let mut parts = Vec::new();
    if features.sudden_deceleration {
        parts.push("sudden deceleration into closest approach");
    }
    if features.stayed_at_scene {
        parts.push("stayed at scene at low speed");
    }
    if features.strong_acceleration {
        parts.push("strong acceleration spike");
    }
    parts.join("; ")
}

/// Classify one validated match into a participant tag.
///
/// Decision sequence, first hit wins:
/// 1. responder when the trip starts or ends at a facility, or made a
///    brief high-speed scene visit;
/// 2. witness when there is no braking anomaly at closest approach;
/// 3. participant when enough involvement indicators fire;
/// 4. witness otherwise. Ambiguity stays conservative.
pub fn classify_match(
    trip: &Trip,
    m: &TemporalMatch,
    crash: &Crash,
    config: &ClassifyConfig,
) -> Classification {
    let features = extract_features(trip, m.scored.proximity.point_index, crash, config);

    let mut responder_reasons: Vec<String> = Vec::new();
    if let Some(origin) = trip.origin() {
        if let Some((name, distance)) = nearest_facility(origin, &config.facilities) {
            if distance <= config.facility_radius {
                responder_reasons.push(format!("origin {:.0}m from {}", distance, name));
            }
        }
    }
    if let Some(destination) = trip.destination() {
        if let Some((name, distance)) = nearest_facility(destination, &config.facilities) {
            if distance <= config.facility_radius {
                responder_reasons.push(format!("destination {:.0}m from {}", distance, name));
            }
        }
    }

    let peak_speed = trip.points.iter().map(|p| p.speed).fold(0.0_f64, f64::max);
    if peak_speed > config.responder_speed_threshold
        && features.scene_point_count > 0
        && features.time_at_scene_seconds < config.responder_max_scene_seconds
    {
        responder_reasons.push(format!(
            "high-speed approach ({:.0} km/h) with {}s at scene",
            peak_speed, features.time_at_scene_seconds
        ));
    }

    let (tag, reason) = if !responder_reasons.is_empty() {
        (
            ParticipantTag::EmergencyResponder,
            responder_reasons.join("; "),
        )
    } else if !features.sudden_deceleration {
        (
            ParticipantTag::Witness,
            "no braking anomaly near closest approach".to_string(),
        )
    } else if features.indicator_count() >= config.min_indicators {
        (ParticipantTag::Participant, participant_reason(&features))
    } else {
        (
            ParticipantTag::Witness,
            "sudden deceleration alone, defaulting to witness".to_string(),
        )
    };

    Classification {
        vehicle_id: m.scored.proximity.vehicle_id.clone(),
        trip_id: m.scored.proximity.trip_id.clone(),
        crash_id: m.scored.proximity.crash_id.clone(),
        tag,
        reason,
    }
}

/// Classify a batch of validated matches.
///
/// Each (vehicle, crash) pair receives exactly one tag; when several
/// trips of the same vehicle matched the same crash, the
/// highest-confidence match decides. Output is sorted by vehicle then
/// crash id.
pub fn classify_matches(
    matches: &[TemporalMatch],
    trips: &[Trip],
    store: &CrashStore,
    config: &ClassifyConfig,
) -> Vec<Classification> {
    let by_trip: HashMap<&str, &Trip> = trips.iter().map(|t| (t.trip_id.as_str(), t)).collect();

    let mut missing_trips = 0usize;
    let mut best: HashMap<(String, String), (f64, Classification)> = HashMap::new();

    for m in matches {
        let trip = match by_trip.get(m.scored.proximity.trip_id.as_str()) {
            Some(trip) => *trip,
            None => {
                missing_trips += 1;
                continue;
            }
        };
        let crash = match store.get_by_id(&m.scored.proximity.crash_id) {
            Some(crash) => crash,
            None => continue,
        };

        let classification = classify_match(trip, m, crash, config);
        let key = (
            classification.vehicle_id.clone(),
            classification.crash_id.clone(),
        );
        match best.get(&key) {
            Some(&(confidence, _)) if confidence >= m.combined_confidence => {}
            _ => {
                best.insert(key, (m.combined_confidence, classification));
            }
        }
    }

    if missing_trips > 0 {
        debug!(
            "{} match(es) reference trips absent from the batch, left unclassified",
            missing_trips
        );
    }

    let mut out: Vec<Classification> = best.into_values().map(|(_, c)| c).collect();
    out.sort_by(|a, b| {
        a.vehicle_id
            .cmp(&b.vehicle_id)
            .then_with(|| a.crash_id.cmp(&b.crash_id))
    });
    out
}
