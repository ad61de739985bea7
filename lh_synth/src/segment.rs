//! Per-segment pipeline: velocity snapshot, time allocation, dedup and activity markers.

use serde::Serialize;
use tracing::debug;

use crate::activity::{classify, generate_markers};
use crate::geo_metrics::{mean_velocity, path_distance, DistanceMetric, LegBounds};
use crate::time_alloc::{allocate_timestamps, dedup_by_timestamp};
use crate::{ActivityType, Coordinate, LhError, Params, TimeWindow, TrackPoint};

/// One GPX track segment after time synthesis and activity annotation.
///
/// Mean velocity and activity type are measured on the raw waypoints before
/// deduplication and are kept as that snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct TrackSegment {
    points: Vec<TrackPoint>,
    window: TimeWindow,
    mean_velocity: f64,
    activity_type: ActivityType,
    sampling_rate_s: i64,
    input_points: usize,
    marker_count: usize,
}

impl TrackSegment {
    pub fn new(
        coordinates: Vec<Coordinate>,
        window: TimeWindow,
        params: &Params,
    ) -> Result<Self, LhError> {
        Self::with_metric(coordinates, window, params, &params.metric)
    }

    /// Run the pipeline with an explicit distance metric, ignoring `params.metric`.
    pub fn with_metric<M: DistanceMetric + ?Sized>(
        coordinates: Vec<Coordinate>,
        window: TimeWindow,
        params: &Params,
        metric: &M,
    ) -> Result<Self, LhError> {
        let input_points = coordinates.len();

        let velocity = mean_velocity(&coordinates, window, metric, params.leg_bounds)?;
        let activity_type = classify(velocity)?;

        let mut points: Vec<TrackPoint> = coordinates.into_iter().map(TrackPoint::new).collect();
        allocate_timestamps(&mut points, window, velocity, metric)?;

        let mut points = dedup_by_timestamp(points);
        let marker_count = generate_markers(
            &mut points,
            activity_type,
            params.sampling_rate_s,
            params.leg_bounds,
        )?;

        debug!(
            "segment {}: {} -> {} points, {:.3} m/s ({}), {} markers",
            window,
            input_points,
            points.len(),
            velocity,
            activity_type,
            marker_count
        );

        Ok(Self {
            points,
            window,
            mean_velocity: velocity,
            activity_type,
            sampling_rate_s: params.sampling_rate_s,
            input_points,
            marker_count,
        })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn mean_velocity(&self) -> f64 {
        self.mean_velocity
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    pub fn sampling_rate_s(&self) -> i64 {
        self.sampling_rate_s
    }

    /// Waypoint count before deduplication.
    pub fn input_points(&self) -> usize {
        self.input_points
    }

    pub fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// Length of the surviving points' path over every leg.
    pub fn path_distance<M: DistanceMetric + ?Sized>(&self, metric: &M) -> f64 {
        let coordinates: Vec<Coordinate> = self.points.iter().map(|p| p.coordinate).collect();
        path_distance(&coordinates, metric, LegBounds::Full)
    }
}
