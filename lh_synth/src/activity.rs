//! Motion-type classification and periodic activity markers.

use crate::geo_metrics::LegBounds;
use crate::{ActivityMarker, ActivityType, LhError, TrackPoint};

/// Upper bound (exclusive) of walking speed: 5 km/h.
pub const WALKING_MAX_MPS: f64 = 5.0 / 3.6;
/// Upper bound (exclusive) of running speed: 25 km/h.
pub const RUNNING_MAX_MPS: f64 = 25.0 / 3.6;

/// Map a mean velocity in m/s to the activity it most plausibly represents.
pub fn classify(mean_velocity: f64) -> Result<ActivityType, LhError> {
    if mean_velocity.is_nan() || mean_velocity < 0.0 {
        return Err(LhError::InvalidInput(format!(
            "mean velocity must be non-negative, got {mean_velocity}"
        )));
    }
    let activity = if mean_velocity == 0.0 {
        ActivityType::Still
    } else if mean_velocity < WALKING_MAX_MPS {
        ActivityType::Walking
    } else if mean_velocity < RUNNING_MAX_MPS {
        ActivityType::Running
    } else {
        ActivityType::InVehicle
    };
    Ok(activity)
}

/// Attach markers every `sampling_rate_s` seconds across gaps longer than the
/// sampling rate. Markers go on the earlier point of each pair, starting at its
/// own timestamp. Returns the number of markers emitted.
pub fn generate_markers(
    points: &mut [TrackPoint],
    activity_type: ActivityType,
    sampling_rate_s: i64,
    bounds: LegBounds,
) -> Result<usize, LhError> {
    if sampling_rate_s <= 0 {
        return Err(LhError::InvalidInput(format!(
            "activity sampling rate must be positive, got {sampling_rate_s}"
        )));
    }

    let mut emitted = 0usize;
    for i in 0..bounds.leg_count(points.len()) {
        let (Some(t0), Some(t1)) = (points[i].timestamp, points[i + 1].timestamp) else {
            return Err(LhError::InvalidInput(format!(
                "point {i} or {} has no timestamp",
                i + 1
            )));
        };
        let gap = t1 - t0;
        if gap <= sampling_rate_s {
            continue;
        }
        let count = gap / sampling_rate_s;
        points[i]
            .activities
            .extend((0..count).map(|j| ActivityMarker {
                timestamp: t0 + sampling_rate_s * j,
                activity_type,
            }));
        emitted += count as usize;
    }
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;
    use proptest::prelude::*;

    fn stamped(times: &[i64]) -> Vec<TrackPoint> {
        times
            .iter()
            .map(|&t| {
                let mut p = TrackPoint::new(Coordinate::new(0.0, 0.0, 0.0));
                p.timestamp = Some(t);
                p
            })
            .collect()
    }

    #[test]
    fn test_classify_band_edges() {
        assert_eq!(classify(0.0).unwrap(), ActivityType::Still);
        assert_eq!(classify(f64::MIN_POSITIVE).unwrap(), ActivityType::Walking);
        assert_eq!(classify(0.5).unwrap(), ActivityType::Walking);
        assert_eq!(classify(WALKING_MAX_MPS).unwrap(), ActivityType::Running);
        assert_eq!(classify(15.0 / 3.6).unwrap(), ActivityType::Running);
        assert_eq!(classify(RUNNING_MAX_MPS).unwrap(), ActivityType::InVehicle);
        assert_eq!(classify(40.0).unwrap(), ActivityType::InVehicle);
        assert_eq!(classify(f64::INFINITY).unwrap(), ActivityType::InVehicle);
    }

    #[test]
    fn test_classify_just_below_edges() {
        let below = |x: f64| x - x * f64::EPSILON;
        assert_eq!(classify(below(WALKING_MAX_MPS)).unwrap(), ActivityType::Walking);
        assert_eq!(classify(below(RUNNING_MAX_MPS)).unwrap(), ActivityType::Running);
    }

    #[test]
    fn test_classify_rejects_negative_and_nan() {
        assert!(matches!(classify(-0.1), Err(LhError::InvalidInput(_))));
        assert!(matches!(classify(f64::NAN), Err(LhError::InvalidInput(_))));
    }

    #[test]
    fn test_markers_fill_long_gaps() {
        let mut pts = stamped(&[0, 25, 30, 100]);
        let emitted =
            generate_markers(&mut pts, ActivityType::Running, 10, LegBounds::Full).unwrap();
        // 25 / 10 = 2, 5 <= 10 none, 70 / 10 = 7
        assert_eq!(emitted, 9);
        let first: Vec<i64> = pts[0].activities.iter().map(|m| m.timestamp).collect();
        assert_eq!(first, vec![0, 10]);
        assert!(pts[1].activities.is_empty());
        assert_eq!(pts[2].activities.len(), 7);
        assert_eq!(pts[2].activities[6].timestamp, 90);
        assert!(pts[3].activities.is_empty());
        assert!(pts
            .iter()
            .flat_map(|p| &p.activities)
            .all(|m| m.activity_type == ActivityType::Running));
    }

    #[test]
    fn test_gap_equal_to_rate_emits_nothing() {
        let mut pts = stamped(&[0, 10, 20]);
        let emitted =
            generate_markers(&mut pts, ActivityType::Walking, 10, LegBounds::Full).unwrap();
        assert_eq!(emitted, 0);
    }

    #[test]
    fn test_legacy_bounds_skip_final_gap() {
        let mut pts = stamped(&[0, 30, 90]);
        let emitted =
            generate_markers(&mut pts, ActivityType::Walking, 10, LegBounds::Legacy).unwrap();
        assert_eq!(emitted, 3);
        assert!(pts[1].activities.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let mut pts = stamped(&[0, 100]);
        for rate in [0, -5] {
            assert!(matches!(
                generate_markers(&mut pts, ActivityType::Still, rate, LegBounds::Full),
                Err(LhError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_rejects_unallocated_points() {
        let mut pts = vec![TrackPoint::new(Coordinate::new(0.0, 0.0, 0.0)); 2];
        assert!(generate_markers(&mut pts, ActivityType::Still, 10, LegBounds::Full).is_err());
    }

    proptest! {
        #[test]
        fn prop_classify_is_total_on_non_negative(v in 0.0f64..1_000.0) {
            prop_assert!(classify(v).is_ok());
        }

        #[test]
        fn prop_marker_count_per_gap(gap in 0i64..10_000, rate in 1i64..600) {
            let mut pts = stamped(&[1_000, 1_000 + gap]);
            let emitted = generate_markers(&mut pts, ActivityType::Walking, rate, LegBounds::Full).unwrap();
            let expected = if gap > rate { (gap / rate) as usize } else { 0 };
            prop_assert_eq!(emitted, expected);
            prop_assert_eq!(pts[0].activities.len(), expected);
            for (j, marker) in pts[0].activities.iter().enumerate() {
                prop_assert_eq!(marker.timestamp, 1_000 + rate * j as i64);
            }
        }
    }
}
