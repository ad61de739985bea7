//! Run configuration: which GPX files to convert and their tracking windows.
//!
//! ```json
//! { "input": [ { "filename": "ride.gpx",
//!                "activitySamplingRate": 60,
//!                "startOfTracking": "2019-05-01 08:00:00",
//!                "endOfTracking": "2019-05-01 09:30:00" } ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::{LhError, TimeWindow};

const TRACKING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
struct RawRunConfig {
    input: Vec<RawInputEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInputEntry {
    filename: String,
    activity_sampling_rate: RateValue,
    start_of_tracking: String,
    end_of_tracking: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RateValue {
    Int(i64),
    Text(String),
}

impl RateValue {
    fn seconds(&self) -> Result<i64, LhError> {
        match self {
            RateValue::Int(v) => Ok(*v),
            RateValue::Text(s) => s.trim().parse().map_err(|_| {
                LhError::MalformedSource(format!(
                    "activitySamplingRate '{s}' is not an integer number of seconds"
                ))
            }),
        }
    }
}

/// One GPX file to convert with its declared tracking window.
#[derive(Clone, Debug, PartialEq)]
pub struct InputEntry {
    pub source_file: PathBuf,
    pub sampling_rate_s: i64,
    pub window: TimeWindow,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub entries: Vec<InputEntry>,
}

impl RunConfig {
    /// Read a config file. Relative GPX paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, LhError> {
        let text = fs::read_to_string(path).map_err(|e| {
            LhError::MalformedSource(format!("failed to read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json_str(&text, base_dir)
    }

    pub fn from_json_str(text: &str, base_dir: &Path) -> Result<Self, LhError> {
        let raw: RawRunConfig = serde_json::from_str(text)
            .map_err(|e| LhError::MalformedSource(format!("invalid run config: {e}")))?;
        if raw.input.is_empty() {
            return Err(LhError::MalformedSource(
                "run config lists no input files".into(),
            ));
        }

        let mut entries = Vec::with_capacity(raw.input.len());
        for entry in raw.input {
            let sampling_rate_s = entry.activity_sampling_rate.seconds()?;
            if sampling_rate_s <= 0 {
                return Err(LhError::InvalidInput(format!(
                    "activitySamplingRate for {} must be positive, got {sampling_rate_s}",
                    entry.filename
                )));
            }
            let start = parse_tracking_time(&entry.start_of_tracking)?;
            let end = parse_tracking_time(&entry.end_of_tracking)?;
            let window = TimeWindow::new(start, end).map_err(|e| match e {
                LhError::InvalidInput(msg) => {
                    LhError::InvalidInput(format!("{}: {msg}", entry.filename))
                }
                other => other,
            })?;
            entries.push(InputEntry {
                source_file: base_dir.join(&entry.filename),
                sampling_rate_s,
                window,
            });
        }
        Ok(Self { entries })
    }
}

/// Parse a configured tracking time into epoch seconds.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (taken as UTC) or RFC 3339 with an offset.
pub fn parse_tracking_time(text: &str) -> Result<i64, LhError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp());
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, TRACKING_TIME_FORMAT).map_err(|e| {
        LhError::MalformedSource(format!(
            "invalid tracking time '{text}' (expected {TRACKING_TIME_FORMAT} or RFC 3339): {e}"
        ))
    })?;
    Ok(Utc.from_utc_datetime(&naive).timestamp())
}
