//! Location-history JSON model (`{"locations": [...]}`) and its writer.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::segment::TrackSegment;
use crate::{ActivityMarker, ActivityType, LhError, TrackPoint};

pub const ACCURACY_M: i32 = 80;
pub const CONFIDENCE_PCT: i32 = 50;

/// Source of the text appended to epoch seconds to form `timestampMs`.
pub trait MillisSuffix {
    fn next_suffix(&mut self) -> String;
}

/// Appends `000`, producing a real millisecond timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroMillis;

impl MillisSuffix for ZeroMillis {
    fn next_suffix(&mut self) -> String {
        "000".to_string()
    }
}

/// Appends an unpadded random integer in `[0, 999)`, byte-compatible with the
/// legacy converter. Seed it to make output reproducible.
#[derive(Clone, Debug)]
pub struct LegacyRandom {
    rng: StdRng,
}

impl LegacyRandom {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl MillisSuffix for LegacyRandom {
    fn next_suffix(&mut self) -> String {
        self.rng.gen_range(0..999).to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfidence {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub confidence: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub timestamp_ms: String,
    pub activity: Vec<ActivityConfidence>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub timestamp_ms: String,
    pub latitude_e7: i64,
    pub longitude_e7: i64,
    pub accuracy: i32,
    pub activity: Vec<ActivityRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationHistory {
    pub locations: Vec<LocationRecord>,
}

impl LocationHistory {
    /// Flatten segments, in order, into location records.
    pub fn from_segments<'a, I>(
        segments: I,
        suffix: &mut dyn MillisSuffix,
    ) -> Result<Self, LhError>
    where
        I: IntoIterator<Item = &'a TrackSegment>,
    {
        let mut locations = Vec::new();
        for segment in segments {
            for point in segment.points() {
                locations.push(location_record(point, suffix)?);
            }
        }
        Ok(Self { locations })
    }

    pub fn write_json<W: Write>(&self, writer: W, pretty: bool) -> Result<(), LhError> {
        let result = if pretty {
            serde_json::to_writer_pretty(writer, self)
        } else {
            serde_json::to_writer(writer, self)
        };
        result.map_err(|e| LhError::MalformedSource(format!("failed to write JSON: {e}")))
    }
}

fn location_record(
    point: &TrackPoint,
    suffix: &mut dyn MillisSuffix,
) -> Result<LocationRecord, LhError> {
    let timestamp = point.timestamp.ok_or_else(|| {
        LhError::InvalidInput("cannot export a point without a timestamp".into())
    })?;
    // point first, then its markers: the legacy suffix stream is consumed in this order
    let timestamp_ms = export_time(timestamp, suffix);
    let mut activity = Vec::with_capacity(point.activities.len());
    for marker in &point.activities {
        activity.push(activity_record(marker, suffix));
    }
    Ok(LocationRecord {
        timestamp_ms,
        latitude_e7: to_e7(point.coordinate.latitude),
        longitude_e7: to_e7(point.coordinate.longitude),
        accuracy: ACCURACY_M,
        activity,
    })
}

fn activity_record(marker: &ActivityMarker, suffix: &mut dyn MillisSuffix) -> ActivityRecord {
    ActivityRecord {
        timestamp_ms: export_time(marker.timestamp, suffix),
        activity: vec![ActivityConfidence {
            activity_type: marker.activity_type,
            confidence: CONFIDENCE_PCT,
        }],
    }
}

fn export_time(seconds: i64, suffix: &mut dyn MillisSuffix) -> String {
    format!("{}{}", seconds, suffix.next_suffix())
}

/// Degrees scaled by 10^7, truncated toward zero.
fn to_e7(degrees: f64) -> i64 {
    (degrees * 1e7) as i64
}
