use chrono::{NaiveDateTime, Timelike};

use crate::config::Labels;

/// What an arrival row shows in its time column, before labels are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DisplayTime {
    /// Cancelled departures show nothing.
    Hidden,
    Due,
    /// Whole minutes until departure; negative once it is overdue.
    Countdown(i64),
    Clock { hour: u32, minute: u32 },
}

impl DisplayTime {
    pub(crate) fn clock_of(time: NaiveDateTime) -> Self {
        DisplayTime::Clock {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub(crate) fn render(&self, labels: &Labels) -> String {
        match *self {
            DisplayTime::Hidden => String::new(),
            DisplayTime::Due => labels.due.clone(),
            DisplayTime::Countdown(minutes) if minutes < 0 => {
                format!("{} {} {}", -minutes, labels.minutes, labels.ago)
            }
            DisplayTime::Countdown(minutes) => format!("{} {}", minutes, labels.minutes),
            DisplayTime::Clock { hour, minute } => format_clock(hour, minute, labels),
        }
    }
}

/// Renders a 24-hour time as `H:MM AM` / `H:MM PM`.
pub fn format_clock(hour: u32, minute: u32, labels: &Labels) -> String {
    let suffix = if hour >= 12 { &labels.pm } else { &labels.am };
    let hour = match hour {
        0 => 12,
        13.. => hour - 12,
        _ => hour,
    };
    format!("{}:{:02} {}", hour, minute, suffix)
}

/// Shortens an API variant key to the route number riders know:
/// `"60-1-D"` becomes `"60"` and `"BLUE-1"` becomes `"B"`.
pub fn normalize_route_key(variant_key: &str) -> String {
    let route = variant_key.split('-').next().unwrap_or(variant_key);
    route.replace("BLUE", "B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_uses_twelve_hour_form() {
        let labels = Labels::default();
        assert_eq!(format_clock(0, 5, &labels), "12:05 AM");
        assert_eq!(format_clock(9, 0, &labels), "9:00 AM");
        assert_eq!(format_clock(12, 30, &labels), "12:30 PM");
        assert_eq!(format_clock(23, 50, &labels), "11:50 PM");
    }

    #[test]
    fn route_keys_keep_first_segment() {
        assert_eq!(normalize_route_key("60-1-A"), "60");
        assert_eq!(normalize_route_key("BLUE-1"), "B");
        assert_eq!(normalize_route_key("11"), "11");
        assert_eq!(normalize_route_key("FX2-0-U"), "FX2");
    }

    #[test]
    fn countdowns_render_with_labels() {
        let labels = Labels::default();
        assert_eq!(DisplayTime::Countdown(4).render(&labels), "4 min.");
        assert_eq!(DisplayTime::Countdown(-2).render(&labels), "2 min. ago");
        assert_eq!(DisplayTime::Due.render(&labels), "Due");
        assert_eq!(DisplayTime::Hidden.render(&labels), "");
    }
}
