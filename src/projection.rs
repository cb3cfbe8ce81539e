//! WGS84 to NZTM2000 forward projection.
//!
//! Crash coordinates are published in New Zealand Transverse Mercator
//! (EPSG:2193), a meter-based grid, so trajectory points are projected onto
//! the same grid before any distance computation. Implements the standard
//! Redfearn series on the GRS80 ellipsoid with the NZTM2000 origin
//! parameters (central meridian 173°E, scale factor 0.9996, false easting
//! 1,600,000 m, false northing 10,000,000 m).
//!
//! Forward-only: nothing in the pipeline maps grid coordinates back to
//! lon/lat.

use crate::error::{LinkError, Result};
use crate::TrajectoryPoint;

// GRS80 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;

// NZTM2000 origin
const ORIGIN_LONGITUDE_DEG: f64 = 173.0;
const CENTRAL_SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 1_600_000.0;
const FALSE_NORTHING: f64 = 10_000_000.0;

/// A trajectory point's index paired with its projected grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Index into the source trajectory.
    pub index: usize,
    /// NZTM easting in meters.
    pub easting: f64,
    /// NZTM northing in meters.
    pub northing: f64,
}

impl ProjectedPoint {
    /// Coordinates as an `[easting, northing]` array for spatial queries.
    pub fn xy(&self) -> [f64; 2] {
        [self.easting, self.northing]
    }
}

/// Check that a lon/lat pair is finite and within WGS84 ranges.
pub fn is_valid_lonlat(longitude: f64, latitude: f64) -> bool {
    longitude.is_finite()
        && latitude.is_finite()
        && (-180.0..=180.0).contains(&longitude)
        && (-90.0..=90.0).contains(&latitude)
}

/// Project a WGS84 lon/lat pair onto the NZTM grid.
///
/// Returns [`LinkError::InvalidCoordinate`] when the input is out of range;
/// callers drop the offending point and continue.
pub fn project(longitude: f64, latitude: f64) -> Result<(f64, f64)> {
    if !is_valid_lonlat(longitude, latitude) {
        return Err(LinkError::InvalidCoordinate {
            longitude,
            latitude,
        });
    }
    Ok(transverse_mercator(longitude, latitude))
}

/// Project every valid point of a trajectory.
///
/// Out-of-range points are dropped; the second element is the drop count.
/// Indices in the result refer to the original slice, so downstream stages
/// can recover the timestamp/speed/acceleration of a match.
pub fn project_trajectory(points: &[TrajectoryPoint]) -> (Vec<ProjectedPoint>, usize) {
    let mut projected = Vec::with_capacity(points.len());
    let mut dropped = 0usize;

    for (index, point) in points.iter().enumerate() {
        match project(point.longitude, point.latitude) {
            Ok((easting, northing)) => projected.push(ProjectedPoint {
                index,
                easting,
                northing,
            }),
            Err(_) => dropped += 1,
        }
    }

    (projected, dropped)
}

/// Redfearn forward transverse Mercator. Input must already be range-checked.
fn transverse_mercator(longitude: f64, latitude: f64) -> (f64, f64) {
    let e2 = 2.0 * FLATTENING - FLATTENING * FLATTENING;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let phi = latitude.to_radians();
    let omega = (longitude - ORIGIN_LONGITUDE_DEG).to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let t = phi.tan();
    let t2 = t * t;
    let t4 = t2 * t2;
    let t6 = t4 * t2;

    // Meridian arc from the equator (origin latitude is 0, so m0 = 0)
    let a0 = 1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0;
    let a2 = 3.0 / 8.0 * (e2 + e4 / 4.0 + 15.0 * e6 / 128.0);
    let a4 = 15.0 / 256.0 * (e4 + 3.0 * e6 / 4.0);
    let a6 = 35.0 * e6 / 3072.0;
    let m = SEMI_MAJOR_AXIS
        * (a0 * phi - a2 * (2.0 * phi).sin() + a4 * (4.0 * phi).sin() - a6 * (6.0 * phi).sin());

    // Radii of curvature and their ratio
    let denom = 1.0 - e2 * sin_phi * sin_phi;
    let nu = SEMI_MAJOR_AXIS / denom.sqrt();
    let rho = SEMI_MAJOR_AXIS * (1.0 - e2) / (denom * denom.sqrt());
    let psi = nu / rho;
    let psi2 = psi * psi;
    let psi3 = psi2 * psi;
    let psi4 = psi2 * psi2;

    let cos2 = cos_phi * cos_phi;
    let omega2 = omega * omega;

    let easting_series = 1.0
        + omega2 * cos2 / 6.0 * (psi - t2)
        + omega2 * omega2 * cos2 * cos2 / 120.0
            * (4.0 * psi3 * (1.0 - 6.0 * t2) + psi2 * (1.0 + 8.0 * t2) - psi * 2.0 * t2 + t4)
        + omega2 * omega2 * omega2 * cos2 * cos2 * cos2 / 5040.0
            * (61.0 - 479.0 * t2 + 179.0 * t4 - t6);
    let easting = FALSE_EASTING + CENTRAL_SCALE * nu * omega * cos_phi * easting_series;

    let northing_series = m
        + nu * sin_phi * omega2 * cos_phi / 2.0
        + nu * sin_phi * omega2 * omega2 * cos2 * cos_phi / 24.0 * (4.0 * psi2 + psi - t2)
        + nu * sin_phi * omega2 * omega2 * omega2 * cos2 * cos2 * cos_phi / 720.0
            * (8.0 * psi4 * (11.0 - 24.0 * t2) - 28.0 * psi3 * (1.0 - 6.0 * t2)
                + psi2 * (1.0 - 32.0 * t2)
                - psi * 2.0 * t2
                + t4)
        + nu * sin_phi * omega2 * omega2 * omega2 * omega2 * cos2 * cos2 * cos2 * cos_phi
            / 40320.0
            * (1385.0 - 3111.0 * t2 + 543.0 * t4 - t6);
    let northing = FALSE_NORTHING + CENTRAL_SCALE * northing_series;

    (easting, northing)
}
