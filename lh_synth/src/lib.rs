//! Synthesize timestamped, activity-tagged location history from GPX tracks.
//!
//! GPX tracks carry waypoints without time. Given a declared tracking window per
//! input file, every waypoint receives a timestamp proportional to the distance
//! travelled, and each segment is annotated with periodic activity markers derived
//! from its mean velocity.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod activity;
pub mod config;
pub mod export;
pub mod geo_metrics;
pub mod overlap;
pub mod segment;
pub mod time_alloc;

pub use activity::{classify, generate_markers};
pub use config::{parse_tracking_time, InputEntry, RunConfig};
pub use export::{LegacyRandom, LocationHistory, MillisSuffix, ZeroMillis};
pub use geo_metrics::{
    mean_velocity, path_distance, DistanceMetric, Geodesic, Haversine, LegBounds, Metric,
};
pub use overlap::{any_overlap, overlapping_pairs, overlaps};
pub use segment::TrackSegment;
pub use time_alloc::{allocate_timestamps, dedup_by_timestamp};

#[derive(Error, Debug)]
pub enum LhError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    #[error("malformed source: {0}")]
    MalformedSource(String),
    #[error("segment {index} of {source_file}: {source}")]
    Segment {
        source_file: String,
        index: usize,
        #[source]
        source: Box<LhError>,
    },
}

/// A waypoint position as read from the GPX input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }
}

/// Declared wall-clock interval of a segment, in epoch seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: i64,
    end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Result<Self, LhError> {
        if start > end {
            return Err(LhError::InvalidInput(format!(
                "time window starts after it ends ({start} > {end})"
            )));
        }
        if end.checked_sub(start).is_none() {
            return Err(LhError::InvalidInput(format!(
                "time window [{start}, {end}] is too long to measure in seconds"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration_s(&self) -> i64 {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Still,
    Walking,
    Running,
    InVehicle,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Still => "STILL",
            ActivityType::Walking => "WALKING",
            ActivityType::Running => "RUNNING",
            ActivityType::InVehicle => "IN_VEHICLE",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMarker {
    pub timestamp: i64,
    pub activity_type: ActivityType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub coordinate: Coordinate,
    /// Epoch seconds; `None` until time allocation runs.
    pub timestamp: Option<i64>,
    pub activities: Vec<ActivityMarker>,
}

impl TrackPoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            timestamp: None,
            activities: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    pub sampling_rate_s: i64,
    pub metric: Metric,
    pub leg_bounds: LegBounds,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            sampling_rate_s: 60,
            metric: Metric::Geodesic,
            leg_bounds: LegBounds::Full,
        }
    }
}

/// Parse the track segments of a GPX document into ordered coordinate lists.
///
/// One list is produced per `<trkseg>`, across all tracks, in document order.
/// Waypoints without `<ele>` get an elevation of zero.
pub fn parse_gpx_segments(input: &[u8]) -> Result<Vec<Vec<Coordinate>>, LhError> {
    use gpx::read;
    use std::io::Cursor;

    let mut cursor = Cursor::new(input);
    let gpx = read(&mut cursor).map_err(|e| LhError::MalformedSource(e.to_string()))?;
    let mut out = Vec::new();

    for track in gpx.tracks {
        for segment in track.segments {
            let coordinates = segment
                .points
                .iter()
                .map(|point| {
                    let point_geo = point.point();
                    Coordinate::new(point_geo.y(), point_geo.x(), point.elevation.unwrap_or(0.0))
                })
                .collect();
            out.push(coordinates);
        }
    }
    Ok(out)
}

/// Run the segment pipeline over every parsed track of one input entry.
///
/// Each failure is wrapped with the entry's file name and the segment index so
/// callers can reject that segment alone.
pub fn build_segments(
    tracks: Vec<Vec<Coordinate>>,
    entry: &InputEntry,
    params: &Params,
) -> Vec<Result<TrackSegment, LhError>> {
    let params = Params {
        sampling_rate_s: entry.sampling_rate_s,
        ..params.clone()
    };
    tracks
        .into_iter()
        .enumerate()
        .map(|(index, coordinates)| {
            TrackSegment::new(coordinates, entry.window, &params).map_err(|err| {
                LhError::Segment {
                    source_file: entry.source_file.display().to_string(),
                    index,
                    source: Box::new(err),
                }
            })
        })
        .collect()
}
