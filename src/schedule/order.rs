use std::cmp::Ordering;

use super::ArrivalState;
use super::display::DisplayTime;

const MINUTES_PER_DAY: i64 = 24 * 60;
/// Two clock times further apart than this straddle midnight.
const WRAPAROUND_MINUTES: i64 = 18 * 60;

/// Ordering for single-format output: "Due" rows, then countdowns by
/// minutes, then clock times, then cancelled rows.
pub(crate) fn single_format(
    a: (DisplayTime, ArrivalState),
    b: (DisplayTime, ArrivalState),
) -> Ordering {
    match (a.0, b.0) {
        (DisplayTime::Countdown(x), DisplayTime::Countdown(y)) => x
            .cmp(&y)
            .then_with(|| state_rank(a.1).cmp(&state_rank(b.1))),
        (DisplayTime::Clock { .. }, DisplayTime::Clock { .. }) => {
            clock_with_wraparound(minutes_of_day(a.0), minutes_of_day(b.0))
        }
        (x, y) => display_rank(x).cmp(&display_rank(y)),
    }
}

/// Ordering for mixed-format output: by sort value, then by route key,
/// numerically when both keys are numbers.
pub(crate) fn mixed_format(a: (i64, &str), b: (i64, &str)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| route_key(a.1, b.1))
}

/// Sort value for mixed format: "Due" first, cancelled last, everything else
/// by minutes until departure.
pub(crate) fn mixed_sort_value(display: DisplayTime, minutes_until: i64) -> i64 {
    match display {
        DisplayTime::Hidden => i64::MAX,
        DisplayTime::Due => -1,
        _ => minutes_until,
    }
}

fn route_key(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn display_rank(display: DisplayTime) -> u8 {
    match display {
        DisplayTime::Due => 0,
        DisplayTime::Countdown(_) => 1,
        DisplayTime::Clock { .. } => 2,
        DisplayTime::Hidden => 3,
    }
}

/// Tie-break between equal countdowns.
fn state_rank(state: ArrivalState) -> u8 {
    match state {
        ArrivalState::Ok => 0,
        ArrivalState::Early => 1,
        ArrivalState::Late => 2,
        ArrivalState::Cancelled => 3,
    }
}

fn minutes_of_day(display: DisplayTime) -> i64 {
    match display {
        DisplayTime::Clock { hour, minute } => (hour * 60 + minute) as i64 % MINUTES_PER_DAY,
        _ => 0,
    }
}

fn clock_with_wraparound(a: i64, b: i64) -> Ordering {
    if (a - b).abs() > WRAPAROUND_MINUTES {
        b.cmp(&a)
    } else {
        a.cmp(&b)
    }
}

/// Stable insertion sort. Neither comparator above is guaranteed transitive
/// (midnight wraparound, mixed numeric/text route keys), so this never relies
/// on a total order and always terminates.
pub(crate) fn stable_sort_by<T>(items: &mut [T], mut compare: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
