//! Per-trip proximity matching against the crash index.
//!
//! Scans every valid trajectory point of a trip, queries the index for
//! crashes within the buffer radius, and keeps the closest-approach point
//! per (trip, crash) pair. Pure over its inputs: persistence and
//! checkpointing belong to the caller.
//!
//! ## Aggregation policy
//!
//! For a given (trip, crash) pair only the minimum-distance candidate is
//! retained. Points are scanned in timestamp order and a candidate only
//! replaces the incumbent when strictly closer, so exact distance ties
//! resolve to the earliest timestamp.

use std::collections::HashMap;

use log::debug;

use crate::engine::{CrashIndex, CrashStore};
use crate::error::{LinkError, Result};
use crate::{projection, MatchConfig, ProximityMatch, Trip};

/// Match one trip against the crash index.
///
/// Out-of-range points are dropped before querying. Returns
/// [`LinkError::IndexQuery`] when fewer than `min_trip_points` valid
/// points remain; callers skip the trip and continue the batch. Zero
/// matches is a valid empty result, not an error.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use crashmatch::engine::{CrashIndex, CrashStore};
/// use crashmatch::matching::match_trip;
/// use crashmatch::{projection, Crash, MatchConfig, Severity, TrajectoryPoint, Trip, VehicleType};
///
/// let (easting, northing) = projection::project(174.76, -36.85).unwrap();
/// let store = CrashStore::from_crashes(vec![Crash::new("c1", easting, northing, Severity::Minor)]);
/// let index = CrashIndex::build(&store);
///
/// let t0 = NaiveDate::from_ymd_opt(2024, 1, 5)
///     .unwrap()
///     .and_hms_opt(7, 0, 0)
///     .unwrap();
/// let trip = Trip::new(
///     "v1",
///     "t1",
///     VehicleType::Hcv,
///     vec![TrajectoryPoint::new(t0, 174.76, -36.85, 45.0, 0.0)],
/// );
///
/// let matches = match_trip(&trip, &store, &index, &MatchConfig::default()).unwrap();
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].crash_id, "c1");
/// ```
pub fn match_trip(
    trip: &Trip,
    store: &CrashStore,
    index: &CrashIndex,
    config: &MatchConfig,
) -> Result<Vec<ProximityMatch>> {
    let (projected, dropped) = projection::project_trajectory(&trip.points);
    if dropped > 0 {
        debug!(
            "trip '{}': dropped {} out-of-range point(s)",
            trip.trip_id, dropped
        );
    }

    if projected.len() < config.min_trip_points {
        return Err(LinkError::IndexQuery {
            trip_id: trip.trip_id.clone(),
            reason: format!(
                "{} valid point(s), need at least {}",
                projected.len(),
                config.min_trip_points
            ),
        });
    }

    // Closest approach per crash: store position -> (distance, point index)
    let mut closest: HashMap<usize, (f64, usize)> = HashMap::new();

    for point in &projected {
        let candidates =
            index.nearest_k_within(point.xy(), config.buffer_radius, config.max_candidates);
        for (crash_idx, distance) in candidates {
            match closest.get(&crash_idx) {
                // Earlier point keeps exact ties
                Some(&(best, _)) if best <= distance => {}
                _ => {
                    closest.insert(crash_idx, (distance, point.index));
                }
            }
        }
    }

    let mut matches: Vec<ProximityMatch> = closest
        .into_iter()
        .filter_map(|(crash_idx, (distance, point_index))| {
            let crash = store.get(crash_idx)?;
            let point = &trip.points[point_index];
            Some(ProximityMatch {
                vehicle_id: trip.vehicle_id.clone(),
                trip_id: trip.trip_id.clone(),
                vehicle_type: trip.vehicle_type,
                crash_id: crash.id.clone(),
                distance,
                speed: point.speed,
                acceleration: point.acceleration,
                timestamp: point.timestamp,
                point_index,
            })
        })
        .collect();

    // Stable output order regardless of hash iteration
    matches.sort_by(|a, b| a.crash_id.cmp(&b.crash_id));

    Ok(matches)
}
