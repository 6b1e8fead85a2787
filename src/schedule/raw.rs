//! Boundary between the transit API's loosely typed schedule JSON and the
//! typed records the normalizer works on.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{EntryError, ScheduleError};

/// One departure of one route variant from the stop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledStop {
    /// Variant key as sent by the API, e.g. `"60-1-D"`.
    pub variant_key: String,
    pub variant_name: String,
    pub cancelled: bool,
    pub estimated: NaiveDateTime,
    pub scheduled: NaiveDateTime,
}

#[derive(Deserialize)]
struct RawStopSchedule {
    #[serde(rename = "route-schedules", default)]
    route_schedules: Vec<Value>,
}

#[derive(Deserialize)]
struct RawRouteSchedule {
    #[serde(rename = "scheduled-stops", default)]
    scheduled_stops: Vec<Value>,
}

#[derive(Deserialize)]
struct RawScheduledStop {
    variant: Option<RawVariant>,
    cancelled: Option<RawFlag>,
    times: Option<RawTimes>,
}

#[derive(Deserialize)]
struct RawVariant {
    key: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
struct RawTimes {
    departure: Option<RawTimePair>,
}

#[derive(Deserialize)]
struct RawTimePair {
    estimated: Option<String>,
    scheduled: Option<String>,
}

/// Decodes every usable scheduled stop in `raw`, in payload order.
///
/// Only a missing or malformed `stop-schedule` object is an error. Individual
/// route schedules or scheduled stops that fail to decode are skipped.
pub fn decode(raw: &Value) -> Result<Vec<ScheduledStop>, ScheduleError> {
    let stop_schedule = raw
        .get("stop-schedule")
        .filter(|value| value.is_object())
        .ok_or(ScheduleError::MissingStopSchedule)?;
    let stop_schedule = RawStopSchedule::deserialize(stop_schedule)?;

    let mut stops = Vec::new();
    for route_schedule in &stop_schedule.route_schedules {
        let route_schedule = match RawRouteSchedule::deserialize(route_schedule) {
            Ok(route_schedule) => route_schedule,
            Err(e) => {
                debug!("skipping malformed route schedule: {}", e);
                continue;
            }
        };

        for entry in &route_schedule.scheduled_stops {
            match decode_entry(entry) {
                Ok(stop) => stops.push(stop),
                Err(e) => debug!("skipping scheduled stop: {}", e),
            }
        }
    }

    Ok(stops)
}

pub fn decode_entry(entry: &Value) -> Result<ScheduledStop, EntryError> {
    let raw = RawScheduledStop::deserialize(entry)
        .map_err(|e| EntryError::Malformed(e.to_string()))?;

    let variant = raw.variant.ok_or(EntryError::MissingField("variant"))?;
    let variant_key = variant
        .key
        .filter(|key| !key.is_empty())
        .ok_or(EntryError::MissingField("variant.key"))?;
    let variant_name = variant.name.ok_or(EntryError::MissingField("variant.name"))?;

    let cancelled = match raw.cancelled.ok_or(EntryError::MissingField("cancelled"))? {
        RawFlag::Bool(flag) => flag,
        RawFlag::Text(text) if text.eq_ignore_ascii_case("true") => true,
        RawFlag::Text(text) if text.eq_ignore_ascii_case("false") => false,
        RawFlag::Text(text) => return Err(EntryError::BadCancelledFlag(text)),
    };

    let departure = raw
        .times
        .and_then(|times| times.departure)
        .ok_or(EntryError::MissingField("times.departure"))?;
    let estimated = departure
        .estimated
        .ok_or(EntryError::MissingField("times.departure.estimated"))?;
    let scheduled = departure
        .scheduled
        .ok_or(EntryError::MissingField("times.departure.scheduled"))?;

    Ok(ScheduledStop {
        variant_key,
        variant_name,
        cancelled,
        estimated: parse_timestamp("estimated", &estimated)?,
        scheduled: parse_timestamp("scheduled", &scheduled)?,
    })
}

/// Reads a local wall-clock timestamp. An explicit offset, if the API ever
/// sends one, is dropped in favour of the local reading.
fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, EntryError> {
    value
        .parse::<NaiveDateTime>()
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_local()))
        .map_err(|_| EntryError::BadTimestamp {
            field,
            value: value.to_string(),
        })
}
