//! Distances along a track and the mean velocity they imply.

use geo::{point, GeodesicDistance};
use serde::{Deserialize, Serialize};

use crate::{Coordinate, LhError, TimeWindow};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub trait DistanceMetric {
    /// Distance in meters between two coordinates.
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64;
}

/// Ellipsoidal (WGS84) geodesic distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct Geodesic;

impl DistanceMetric for Geodesic {
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        // x = lon, y = lat
        let p1 = point!(x: a.longitude, y: a.latitude);
        let p2 = point!(x: b.longitude, y: b.latitude);
        p1.geodesic_distance(&p2)
    }
}

/// Great-circle distance on a sphere of mean Earth radius.
#[derive(Clone, Copy, Debug, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
    }
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Metric {
    Geodesic,
    Haversine,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Geodesic
    }
}

impl DistanceMetric for Metric {
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        match self {
            Metric::Geodesic => Geodesic.distance(a, b),
            Metric::Haversine => Haversine.distance(a, b),
        }
    }
}

/// Which consecutive point pairs of a segment are walked when measuring legs
/// and emitting activity markers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LegBounds {
    /// Every pair `[0, n-1)`.
    Full,
    /// Pairs `[0, n-2)`: the final leg is never visited. Matches the output of
    /// the legacy converter.
    Legacy,
}

impl Default for LegBounds {
    fn default() -> Self {
        LegBounds::Full
    }
}

impl LegBounds {
    /// Number of leading pairs visited for a track of `points` points.
    pub fn leg_count(&self, points: usize) -> usize {
        match self {
            LegBounds::Full => points.saturating_sub(1),
            LegBounds::Legacy => points.saturating_sub(2),
        }
    }
}

/// Sum of leg distances in meters over the legs selected by `bounds`.
pub fn path_distance<M: DistanceMetric + ?Sized>(
    coordinates: &[Coordinate],
    metric: &M,
    bounds: LegBounds,
) -> f64 {
    coordinates
        .windows(2)
        .take(bounds.leg_count(coordinates.len()))
        .map(|w| metric.distance(&w[0], &w[1]))
        .sum()
}

/// Path distance divided by the window duration, in meters per second.
pub fn mean_velocity<M: DistanceMetric + ?Sized>(
    coordinates: &[Coordinate],
    window: TimeWindow,
    metric: &M,
    bounds: LegBounds,
) -> Result<f64, LhError> {
    let duration = window.duration_s();
    if duration == 0 {
        return Err(LhError::Arithmetic(format!(
            "zero-length time window {window}: mean velocity is undefined"
        )));
    }
    Ok(path_distance(coordinates, metric, bounds) / duration as f64)
}
