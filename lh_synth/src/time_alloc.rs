//! Synthetic timestamp assignment for the points of one segment.

use std::collections::BTreeMap;

use crate::geo_metrics::DistanceMetric;
use crate::{LhError, TimeWindow, TrackPoint};

/// Assign timestamps in place.
///
/// The first point is pinned to `window.start()` and the last to `window.end()`.
/// Each interior point follows its predecessor by the whole seconds needed to
/// cover the leg between them at `mean_velocity`.
pub fn allocate_timestamps<M: DistanceMetric + ?Sized>(
    points: &mut [TrackPoint],
    window: TimeWindow,
    mean_velocity: f64,
    metric: &M,
) -> Result<(), LhError> {
    let n = points.len();
    if n < 2 {
        return Err(LhError::InvalidInput(format!(
            "time allocation needs at least 2 points, got {n}"
        )));
    }

    points[0].timestamp = Some(window.start());
    points[n - 1].timestamp = Some(window.end());

    let mut previous = window.start();
    for i in 1..n - 1 {
        let leg = metric.distance(&points[i - 1].coordinate, &points[i].coordinate);
        let transit = transit_seconds(leg, mean_velocity)?;
        previous = previous.checked_add(transit).ok_or_else(|| {
            LhError::Arithmetic(format!(
                "timestamp of point {i} overflows after a {transit} s transit"
            ))
        })?;
        points[i].timestamp = Some(previous);
    }
    Ok(())
}

fn transit_seconds(leg_m: f64, mean_velocity: f64) -> Result<i64, LhError> {
    if leg_m == 0.0 {
        return Ok(0);
    }
    if !(mean_velocity > 0.0 && mean_velocity.is_finite()) {
        return Err(LhError::InvalidInput(format!(
            "cannot cover a {leg_m:.3} m leg at mean velocity {mean_velocity} m/s"
        )));
    }
    let seconds = (leg_m / mean_velocity).floor();
    if !seconds.is_finite() || seconds >= i64::MAX as f64 {
        return Err(LhError::Arithmetic(format!(
            "a {leg_m:.3} m leg at {mean_velocity} m/s takes too long to represent"
        )));
    }
    Ok(seconds as i64)
}

/// Keep one point per distinct timestamp, in chronological order.
///
/// When several points share a timestamp the one appearing last in the input
/// wins. Points that were never allocated a timestamp are discarded.
pub fn dedup_by_timestamp(points: Vec<TrackPoint>) -> Vec<TrackPoint> {
    let mut by_time: BTreeMap<i64, TrackPoint> = BTreeMap::new();
    for point in points {
        if let Some(t) = point.timestamp {
            by_time.insert(t, point);
        }
    }
    by_time.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_metrics::tests::{line, Planar};
    use crate::geo_metrics::{path_distance, LegBounds};
    use crate::Coordinate;
    use proptest::prelude::*;

    fn points(xs: &[f64]) -> Vec<TrackPoint> {
        line(xs).into_iter().map(TrackPoint::new).collect()
    }

    fn times(points: &[TrackPoint]) -> Vec<i64> {
        points.iter().filter_map(|p| p.timestamp).collect()
    }

    #[test]
    fn test_two_points_take_the_window_bounds() {
        let mut pts = points(&[0.0, 50.0]);
        let window = TimeWindow::new(0, 100).unwrap();
        allocate_timestamps(&mut pts, window, 0.5, &Planar).unwrap();
        assert_eq!(times(&pts), vec![0, 100]);
    }

    #[test]
    fn test_interior_points_follow_floor_recurrence() {
        // 15 m legs at 0.5 m/s: 30 s each.
        let mut pts = points(&[0.0, 15.0, 30.0]);
        let window = TimeWindow::new(0, 60).unwrap();
        allocate_timestamps(&mut pts, window, 0.5, &Planar).unwrap();
        assert_eq!(times(&pts), vec![0, 30, 60]);
    }

    #[test]
    fn test_fractional_transit_is_floored() {
        // 10 m at 3 m/s = 3.33 s -> 3, then 7 m at 3 m/s = 2.33 s -> 2.
        let mut pts = points(&[0.0, 10.0, 17.0, 30.0]);
        let window = TimeWindow::new(1_000, 1_010).unwrap();
        allocate_timestamps(&mut pts, window, 3.0, &Planar).unwrap();
        assert_eq!(times(&pts), vec![1_000, 1_003, 1_005, 1_010]);
    }

    #[test]
    fn test_rejects_fewer_than_two_points() {
        let window = TimeWindow::new(0, 10).unwrap();
        for xs in [&[][..], &[1.0][..]] {
            let mut pts = points(xs);
            let err = allocate_timestamps(&mut pts, window, 1.0, &Planar).unwrap_err();
            assert!(matches!(err, LhError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_zero_velocity_only_fails_on_moving_legs() {
        let window = TimeWindow::new(0, 10).unwrap();

        let mut still = points(&[4.0, 4.0, 4.0]);
        allocate_timestamps(&mut still, window, 0.0, &Planar).unwrap();
        assert_eq!(times(&still), vec![0, 0, 10]);

        let mut moving = points(&[0.0, 4.0, 8.0]);
        let err = allocate_timestamps(&mut moving, window, 0.0, &Planar).unwrap_err();
        assert!(matches!(err, LhError::InvalidInput(_)));
    }

    #[test]
    fn test_tiny_velocity_overflow_is_arithmetic_error() {
        let window = TimeWindow::new(1_556_697_600, 1_556_697_700).unwrap();

        let mut saturating = points(&[0.0, 10.0, 20.0]);
        let err = allocate_timestamps(&mut saturating, window, 1e-30, &Planar).unwrap_err();
        assert!(matches!(err, LhError::Arithmetic(_)));

        // each transit fits in i64 but their running sum does not
        let mut accumulating = points(&[0.0, 10.0, 20.0, 30.0]);
        let v = 10.0 / (i64::MAX / 2) as f64;
        let err = allocate_timestamps(&mut accumulating, window, v, &Planar).unwrap_err();
        assert!(matches!(err, LhError::Arithmetic(_)));
    }

    #[test]
    fn test_dedup_keeps_last_point_per_timestamp() {
        let mut pts = points(&[0.0, 0.0, 5.0, 5.0]);
        for (p, t) in pts.iter_mut().zip([0, 0, 7, 7]) {
            p.timestamp = Some(t);
        }
        let out = dedup_by_timestamp(pts);
        assert_eq!(times(&out), vec![0, 7]);
        assert_eq!(out[0].coordinate, Coordinate::new(0.0, 0.0, 0.0));
        assert_eq!(out[1].coordinate, Coordinate::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_dedup_orders_chronologically() {
        let mut pts = points(&[0.0, 1.0, 2.0]);
        for (p, t) in pts.iter_mut().zip([0, 90, 60]) {
            p.timestamp = Some(t);
        }
        assert_eq!(times(&dedup_by_timestamp(pts)), vec![0, 60, 90]);
    }

    proptest! {
        #[test]
        fn prop_allocation_is_monotonic_and_pinned(
            legs in proptest::collection::vec(0u32..500, 1..40),
            start in 0i64..2_000_000_000,
            duration in 1i64..100_000,
        ) {
            let mut xs = vec![0.0];
            for leg in &legs {
                let last = *xs.last().unwrap();
                xs.push(last + f64::from(*leg));
            }
            let coords = line(&xs);
            let mut pts: Vec<TrackPoint> = coords.iter().copied().map(TrackPoint::new).collect();
            let window = TimeWindow::new(start, start + duration).unwrap();
            let v = path_distance(&coords, &Planar, LegBounds::Full) / duration as f64;
            prop_assume!(v > 0.0);
            allocate_timestamps(&mut pts, window, v, &Planar).unwrap();

            let ts = times(&pts);
            prop_assert_eq!(ts.len(), pts.len());
            prop_assert_eq!(ts[0], window.start());
            prop_assert_eq!(*ts.last().unwrap(), window.end());
            for pair in ts.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }

        #[test]
        fn prop_dedup_is_idempotent(stamps in proptest::collection::vec(0i64..50, 0..60)) {
            let pts: Vec<TrackPoint> = stamps
                .iter()
                .enumerate()
                .map(|(i, &t)| {
                    let mut p = TrackPoint::new(Coordinate::new(0.0, i as f64, 0.0));
                    p.timestamp = Some(t);
                    p
                })
                .collect();
            let once = dedup_by_timestamp(pts);
            let twice = dedup_by_timestamp(once.clone());
            prop_assert_eq!(&once, &twice);
            for pair in once.windows(2) {
                prop_assert!(pair[0].timestamp < pair[1].timestamp);
            }
        }
    }
}
