//! Turns a stop's raw schedule into the ordered arrival rows shown to riders.
//!
//! Everything here is a pure function of the payload, a caller supplied
//! `now` and a [`NormalizerConfig`]. No clock reads, no I/O.

mod display;
mod order;
pub mod raw;

use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{Labels, NormalizerConfig};
use display::DisplayTime;
pub use display::{format_clock, normalize_route_key};
pub use raw::ScheduledStop;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalState {
    Ok,
    Late,
    Early,
    Cancelled,
}

/// How non-late, non-early departures are rendered in single-format mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFormat {
    MinutesRemaining,
    ClockTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArrivalEntry {
    pub route_key: String,
    pub route_name: String,
    pub state: ArrivalState,
    pub display_text: String,
}

impl ArrivalEntry {
    /// Flattens the entry into the `key<sep>name<sep>state<sep>text` row
    /// format widgets store.
    pub fn to_row(&self, labels: &Labels) -> String {
        [
            self.route_key.as_str(),
            self.route_name.as_str(),
            labels.state(self.state),
            self.display_text.as_str(),
        ]
        .join(labels.separator.as_str())
    }

    pub fn from_row(row: &str, labels: &Labels) -> Option<Self> {
        if labels.separator.is_empty() {
            return None;
        }

        let fields: Vec<&str> = row.split(labels.separator.as_str()).collect();
        let [route_key, route_name, state, display_text] = fields.as_slice() else {
            return None;
        };

        Some(Self {
            route_key: route_key.to_string(),
            route_name: route_name.to_string(),
            state: labels.parse_state(state)?,
            display_text: display_text.to_string(),
        })
    }
}

/// Per-departure facts shared by both output modes.
struct Assessed<'a> {
    stop: &'a ScheduledStop,
    route_key: String,
    minutes_until: i64,
    state: ArrivalState,
    due: bool,
    in_window: bool,
}

struct Ranked {
    entry: ArrivalEntry,
    display: DisplayTime,
    minutes_until: i64,
}

#[derive(Clone, Debug, Default)]
pub struct ScheduleNormalizer {
    config: NormalizerConfig,
}

impl ScheduleNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes a raw payload with one time format for every row. A payload
    /// without a stop schedule yields no rows.
    pub fn normalize(
        &self,
        raw: &Value,
        now: NaiveDateTime,
        format: TimeFormat,
    ) -> Vec<ArrivalEntry> {
        self.normalize_stops(&decode_or_empty(raw), now, format)
    }

    /// Normalizes a raw payload showing clock times everywhere except due
    /// departures and the soonest upcoming departure of each route variant.
    pub fn normalize_mixed_format(&self, raw: &Value, now: NaiveDateTime) -> Vec<ArrivalEntry> {
        self.normalize_stops_mixed(&decode_or_empty(raw), now)
    }

    pub fn normalize_stops(
        &self,
        stops: &[ScheduledStop],
        now: NaiveDateTime,
        format: TimeFormat,
    ) -> Vec<ArrivalEntry> {
        let mut ranked: Vec<Ranked> = stops
            .iter()
            .filter_map(|stop| self.assess(stop, now))
            .map(|assessed| {
                let display = self.single_display(&assessed, format);
                self.rank(assessed, display)
            })
            .collect();

        order::stable_sort_by(&mut ranked, |a, b| {
            order::single_format((a.display, a.entry.state), (b.display, b.entry.state))
        });
        ranked.into_iter().map(|r| r.entry).collect()
    }

    pub fn normalize_stops_mixed(
        &self,
        stops: &[ScheduledStop],
        now: NaiveDateTime,
    ) -> Vec<ArrivalEntry> {
        let mut assessed: Vec<Assessed> = stops
            .iter()
            .filter_map(|stop| self.assess(stop, now))
            .collect();
        // The countdown goes to the soonest departure of each variant.
        order::stable_sort_by(&mut assessed, |a, b| a.minutes_until.cmp(&b.minutes_until));

        let mut counted: HashSet<(String, String)> = HashSet::new();
        let mut ranked: Vec<Ranked> = assessed
            .into_iter()
            .map(|assessed| {
                let variant = (assessed.route_key.clone(), assessed.stop.variant_name.clone());
                let display = if assessed.state == ArrivalState::Cancelled {
                    DisplayTime::Hidden
                } else if assessed.due {
                    // Every due departure shows "Due"; the first one also
                    // uses up the variant's countdown.
                    counted.insert(variant);
                    DisplayTime::Due
                } else if assessed.in_window && counted.insert(variant) {
                    DisplayTime::Countdown(assessed.minutes_until)
                } else {
                    DisplayTime::clock_of(assessed.stop.estimated)
                };
                self.rank(assessed, display)
            })
            .collect();

        order::stable_sort_by(&mut ranked, |a, b| {
            order::mixed_format(
                (order::mixed_sort_value(a.display, a.minutes_until), a.entry.route_key.as_str()),
                (order::mixed_sort_value(b.display, b.minutes_until), b.entry.route_key.as_str()),
            )
        });
        ranked.into_iter().map(|r| r.entry).collect()
    }

    /// Computes minute offsets, state and route key for one departure, or
    /// `None` once it is further in the past than the due grace period.
    fn assess<'a>(&self, stop: &'a ScheduledStop, now: NaiveDateTime) -> Option<Assessed<'a>> {
        let minutes_until = ceil_minutes(stop.estimated - now);
        if minutes_until < self.config.due_grace_minutes.saturating_neg() {
            debug!(
                variant = %stop.variant_key,
                minutes_until, "dropping departure that already left"
            );
            return None;
        }

        let delay = round_minutes(stop.estimated - stop.scheduled);
        let in_window = minutes_until <= self.config.next_bus_window_minutes;
        let state = if stop.cancelled {
            ArrivalState::Cancelled
        } else if delay > 0 && in_window {
            ArrivalState::Late
        } else if delay < 0 && in_window {
            ArrivalState::Early
        } else {
            ArrivalState::Ok
        };

        Some(Assessed {
            stop,
            route_key: normalize_route_key(&stop.variant_key),
            minutes_until,
            state,
            due: !stop.cancelled && minutes_until <= 0,
            in_window,
        })
    }

    fn single_display(&self, assessed: &Assessed, format: TimeFormat) -> DisplayTime {
        match assessed.state {
            ArrivalState::Cancelled => DisplayTime::Hidden,
            _ if assessed.due => DisplayTime::Due,
            ArrivalState::Late | ArrivalState::Early => DisplayTime::Countdown(assessed.minutes_until),
            ArrivalState::Ok if format == TimeFormat::MinutesRemaining && assessed.in_window => {
                DisplayTime::Countdown(assessed.minutes_until)
            }
            ArrivalState::Ok => DisplayTime::clock_of(assessed.stop.estimated),
        }
    }

    fn rank(&self, assessed: Assessed, display: DisplayTime) -> Ranked {
        Ranked {
            entry: ArrivalEntry {
                route_key: assessed.route_key,
                route_name: assessed.stop.variant_name.clone(),
                state: assessed.state,
                display_text: display.render(&self.config.labels),
            },
            display,
            minutes_until: assessed.minutes_until,
        }
    }
}

fn decode_or_empty(raw: &Value) -> Vec<ScheduledStop> {
    raw::decode(raw).unwrap_or_else(|e| {
        debug!("no arrivals in schedule payload: {}", e);
        Vec::new()
    })
}

const NANOS_PER_MINUTE: i128 = 60_000_000_000;

fn total_nanos(delta: Duration) -> i128 {
    delta.num_seconds() as i128 * 1_000_000_000 + delta.subsec_nanos() as i128
}

/// Whole minutes, rounded up, covered by `delta`.
fn ceil_minutes(delta: Duration) -> i64 {
    let nanos = total_nanos(delta);
    let minutes = nanos.div_euclid(NANOS_PER_MINUTE)
        + (nanos.rem_euclid(NANOS_PER_MINUTE) > 0) as i128;
    minutes as i64
}

/// Whole minutes in `delta`, halves rounded away from zero.
fn round_minutes(delta: Duration) -> i64 {
    let nanos = total_nanos(delta);
    let minutes = (nanos.abs() + NANOS_PER_MINUTE / 2) / NANOS_PER_MINUTE;
    (minutes * nanos.signum()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        "2024-05-01T14:30:00".parse().unwrap()
    }

    fn stop(key: &str, name: &str, estimated_secs: i64, delay_secs: i64) -> ScheduledStop {
        let estimated = now() + Duration::seconds(estimated_secs);
        ScheduledStop {
            variant_key: key.to_string(),
            variant_name: name.to_string(),
            cancelled: false,
            estimated,
            scheduled: estimated - Duration::seconds(delay_secs),
        }
    }

    fn texts(entries: &[ArrivalEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.display_text.as_str()).collect()
    }

    #[test]
    fn minute_offsets_round_in_opposite_directions() {
        assert_eq!(ceil_minutes(Duration::seconds(61)), 2);
        assert_eq!(ceil_minutes(Duration::seconds(-61)), -1);
        assert_eq!(ceil_minutes(Duration::seconds(-59)), 0);
        assert_eq!(ceil_minutes(Duration::zero()), 0);
        assert_eq!(ceil_minutes(Duration::milliseconds(60_500)), 2);
        assert_eq!(round_minutes(Duration::seconds(89)), 1);
        assert_eq!(round_minutes(Duration::seconds(90)), 2);
        assert_eq!(round_minutes(Duration::seconds(-90)), -2);
        assert_eq!(round_minutes(Duration::milliseconds(-29_999)), 0);
    }

    #[test]
    fn fractional_now_still_counts_partial_minutes_up() {
        let normalizer = ScheduleNormalizer::default();
        let now: NaiveDateTime = "2024-05-01T14:29:59.500".parse().unwrap();
        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", 60, 0)],
            now,
            TimeFormat::MinutesRemaining,
        );
        // 14:31:00 is 60.5 seconds away.
        assert_eq!(texts(&entries), vec!["2 min."]);
    }

    #[test]
    fn extreme_grace_does_not_overflow() {
        let config = NormalizerConfig {
            due_grace_minutes: i64::MIN,
            ..NormalizerConfig::default()
        };
        let entries = ScheduleNormalizer::new(config).normalize_stops(
            &[stop("11", "Polo Park", 5 * 60, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn partial_minutes_count_up() {
        let normalizer = ScheduleNormalizer::default();
        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", 3 * 60 + 10, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert_eq!(texts(&entries), vec!["4 min."]);
    }

    #[test]
    fn grace_period_keeps_just_departed_bus_as_due() {
        let normalizer = ScheduleNormalizer::default();
        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", -59, 0), stop("16", "Osborne", -61, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        // -59s ceils to 0, -61s ceils to -1; both within one minute of grace.
        assert_eq!(texts(&entries), vec!["Due", "Due"]);

        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", -121, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn late_and_early_force_a_countdown_in_clock_mode() {
        let normalizer = ScheduleNormalizer::default();
        let entries = normalizer.normalize_stops(
            &[
                stop("11", "Polo Park", 5 * 60, 2 * 60),
                stop("16", "Osborne", 7 * 60, -3 * 60),
                stop("18", "North Main", 9 * 60, 0),
            ],
            now(),
            TimeFormat::ClockTime,
        );
        let summary: Vec<(&str, ArrivalState, &str)> = entries
            .iter()
            .map(|e| (e.route_key.as_str(), e.state, e.display_text.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("11", ArrivalState::Late, "5 min."),
                ("16", ArrivalState::Early, "7 min."),
                ("18", ArrivalState::Ok, "2:39 PM"),
            ]
        );
    }

    #[test]
    fn delays_outside_the_window_stay_ok() {
        let normalizer = ScheduleNormalizer::default();
        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", 40 * 60, 5 * 60)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert_eq!(entries[0].state, ArrivalState::Ok);
        assert_eq!(entries[0].display_text, "3:10 PM");
    }

    #[test]
    fn cancelled_rows_are_blank_and_last() {
        let normalizer = ScheduleNormalizer::default();
        let mut cancelled = stop("11", "Polo Park", 2 * 60, 60);
        cancelled.cancelled = true;
        let entries = normalizer.normalize_stops(
            &[cancelled, stop("16", "Osborne", 50 * 60, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert_eq!(entries[0].display_text, "3:20 PM");
        assert_eq!(entries[1].state, ArrivalState::Cancelled);
        assert_eq!(entries[1].display_text, "");
    }

    #[test]
    fn custom_labels_flow_into_text() {
        let mut config = NormalizerConfig::default();
        config.labels.minutes = "mins".to_string();
        config.labels.due = "Now".to_string();
        let normalizer = ScheduleNormalizer::new(config);
        let entries = normalizer.normalize_stops(
            &[stop("11", "Polo Park", 0, 0), stop("16", "Osborne", 6 * 60, 0)],
            now(),
            TimeFormat::MinutesRemaining,
        );
        assert_eq!(texts(&entries), vec!["Now", "6 mins"]);
    }

    #[test]
    fn mixed_format_due_takes_the_variant_countdown() {
        let normalizer = ScheduleNormalizer::default();
        let entries = normalizer.normalize_stops_mixed(
            &[stop("11", "Polo Park", 4 * 60, 0), stop("11", "Polo Park", 0, 0)],
            now(),
        );
        assert_eq!(texts(&entries), vec!["Due", "2:34 PM"]);
    }

    #[test]
    fn mixed_format_shows_every_due_departure_as_due() {
        let config = NormalizerConfig {
            due_grace_minutes: 3,
            ..NormalizerConfig::default()
        };
        let entries = ScheduleNormalizer::new(config).normalize_stops_mixed(
            &[
                stop("11", "Polo Park", 5 * 60, 0),
                stop("11", "Polo Park", -3 * 60, 0),
                stop("11", "Polo Park", -2 * 60, 0),
            ],
            now(),
        );
        assert_eq!(texts(&entries), vec!["Due", "Due", "2:35 PM"]);
    }

    #[test]
    fn rows_round_trip_through_labels() {
        let labels = Labels::default();
        let entry = ArrivalEntry {
            route_key: "B".to_string(),
            route_name: "Downtown".to_string(),
            state: ArrivalState::Late,
            display_text: "4 min.".to_string(),
        };
        let row = entry.to_row(&labels);
        assert_eq!(row, "B----Downtown----Late----4 min.");
        assert_eq!(ArrivalEntry::from_row(&row, &labels), Some(entry));
        assert_eq!(ArrivalEntry::from_row("B----Downtown----Delayed----", &labels), None);
        assert_eq!(ArrivalEntry::from_row("B----Downtown", &labels), None);
    }
}
