//! Decoding of encoded trip sequences into aligned trajectory points.
//!
//! Trip tables store each trajectory as four parallel delimited strings:
//! a path of "lon lat" pairs, timestamps, speeds, and longitudinal
//! accelerations, all comma-separated. The sequences are decoded together
//! and aligned by position. Two recovery rules apply:
//!
//! - Unequal sequence lengths truncate to the shortest; the valid prefix
//!   survives.
//! - A malformed token invalidates that point only; the trip continues.

use chrono::NaiveDateTime;

use crate::error::{LinkError, Result};
use crate::TrajectoryPoint;

/// Timestamp layout used by the encoded trip sequences and the output
/// tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Counters describing one trajectory decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Points successfully decoded.
    pub decoded: usize,
    /// Points skipped because a token failed to parse.
    pub skipped_parse: usize,
    /// Point positions lost to parallel sequences of unequal length.
    pub truncated: usize,
}

impl DecodeStats {
    /// Total points dropped for any reason.
    pub fn dropped(&self) -> usize {
        self.skipped_parse + self.truncated
    }
}

/// Parse one "lon lat" pair from a path sequence.
pub fn parse_coordinate_pair(token: &str, position: usize) -> Result<(f64, f64)> {
    let mut parts = token.split_whitespace();
    let (Some(lon_str), Some(lat_str)) = (parts.next(), parts.next()) else {
        return Err(parse_error("path", token, position));
    };

    let longitude: f64 = lon_str
        .parse()
        .map_err(|_| parse_error("path", token, position))?;
    let latitude: f64 = lat_str
        .parse()
        .map_err(|_| parse_error("path", token, position))?;

    Ok((longitude, latitude))
}

/// Parse one timestamp token. Subsecond suffixes are ignored.
pub fn parse_timestamp(token: &str, position: usize) -> Result<NaiveDateTime> {
    let trimmed = token.trim();
    let without_subseconds = trimmed.split('.').next().unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(without_subseconds, TIMESTAMP_FORMAT)
        .map_err(|_| parse_error("timestamp", token, position))
}

/// Decode four parallel encoded sequences into aligned trajectory points.
///
/// Returns the decoded points together with counters for skipped and
/// truncated positions. Never fails as a whole: a trip whose every point is
/// malformed simply decodes to an empty vector.
pub fn decode_points(
    path: &str,
    timestamps: &str,
    speeds: &str,
    accelerations: &str,
) -> (Vec<TrajectoryPoint>, DecodeStats) {
    let path_tokens = split_sequence(path);
    let time_tokens = split_sequence(timestamps);
    let speed_tokens = split_sequence(speeds);
    let accel_tokens = split_sequence(accelerations);

    let aligned = path_tokens
        .len()
        .min(time_tokens.len())
        .min(speed_tokens.len())
        .min(accel_tokens.len());
    let longest = path_tokens
        .len()
        .max(time_tokens.len())
        .max(speed_tokens.len())
        .max(accel_tokens.len());

    let mut stats = DecodeStats {
        truncated: longest - aligned,
        ..Default::default()
    };
    let mut points = Vec::with_capacity(aligned);

    for i in 0..aligned {
        let decoded = decode_one(
            path_tokens[i],
            time_tokens[i],
            speed_tokens[i],
            accel_tokens[i],
            i,
        );
        match decoded {
            Ok(point) => {
                stats.decoded += 1;
                points.push(point);
            }
            Err(_) => stats.skipped_parse += 1,
        }
    }

    (points, stats)
}

fn decode_one(
    path_token: &str,
    time_token: &str,
    speed_token: &str,
    accel_token: &str,
    position: usize,
) -> Result<TrajectoryPoint> {
    let (longitude, latitude) = parse_coordinate_pair(path_token, position)?;
    let timestamp = parse_timestamp(time_token, position)?;
    let speed: f64 = speed_token
        .trim()
        .parse()
        .map_err(|_| parse_error("speed", speed_token, position))?;
    let acceleration: f64 = accel_token
        .trim()
        .parse()
        .map_err(|_| parse_error("acceleration", accel_token, position))?;

    Ok(TrajectoryPoint::new(
        timestamp,
        longitude,
        latitude,
        speed,
        acceleration,
    ))
}

/// Split a comma-delimited sequence, ignoring empty trailing tokens.
fn split_sequence(encoded: &str) -> Vec<&str> {
    encoded
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_error(field: &'static str, token: &str, position: usize) -> LinkError {
    LinkError::Parse {
        field,
        token: token.trim().to_string(),
        position,
    }
}
