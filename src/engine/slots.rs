use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;
use crate::models::partner::OpeningHours;

pub const SLOT_MINUTES: u32 = 15;

const ASAP_LABEL: &str = "ASAP";

/// A selectable delivery/pickup time: the earliest possible moment, or a
/// quarter-hour wall-clock label for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeSlot {
    Asap,
    At(NaiveTime),
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSlot::Asap => f.write_str(ASAP_LABEL),
            TimeSlot::At(time) => write!(f, "{}", time.format("%H:%M")),
        }
    }
}

impl FromStr for TimeSlot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ASAP_LABEL) {
            return Ok(TimeSlot::Asap);
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(TimeSlot::At)
            .map_err(|err| AppError::Internal(format!("invalid time slot {s:?}: {err}")))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOptions {
    pub slots: Vec<TimeSlot>,
    pub selected: TimeSlot,
    /// The instant `ASAP` stands for, when the partner is open for orders.
    pub earliest: Option<NaiveDateTime>,
}

impl SlotOptions {
    pub fn asap_only() -> Self {
        Self {
            slots: vec![TimeSlot::Asap],
            selected: TimeSlot::Asap,
            earliest: None,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().map(ToString::to_string).collect()
    }
}

/// Weekday index with Monday = 0 .. Sunday = 6.
pub fn day_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}

/// Maps a Sunday-first weekday number (Sunday = 0) onto the Monday-first index.
pub fn remap_sunday_first(native: u8) -> u8 {
    if native == 0 { 6 } else { native - 1 }
}

pub fn hours_for_day(hours: &[OpeningHours], day: u8) -> Option<&OpeningHours> {
    hours.iter().find(|h| h.day_of_week == day)
}

pub fn hours_for_today(hours: &[OpeningHours], now: NaiveDateTime) -> Option<&OpeningHours> {
    hours_for_day(hours, day_index(now.weekday()))
}

/// Rounds up to the next quarter hour. Instants already on a boundary minute
/// only lose their seconds.
pub fn round_up_to_slot(instant: NaiveDateTime) -> NaiveDateTime {
    let truncated = instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant);

    let remainder = truncated.minute() % SLOT_MINUTES;
    if remainder == 0 {
        truncated
    } else {
        truncated + Duration::minutes(i64::from(SLOT_MINUTES - remainder))
    }
}

/// `today` is the partner's opening window for the current weekday, if any.
/// `ASAP` always comes first and is always the default selection.
pub fn compute_slots(
    now: NaiveDateTime,
    today: Option<&OpeningHours>,
    min_prep_minutes: i64,
) -> SlotOptions {
    let Some(hours) = today else {
        return SlotOptions::asap_only();
    };

    let date = now.date();
    let opens = date.and_time(hours.opens_at);
    let closes = date.and_time(hours.closes_at);

    if now >= closes {
        return SlotOptions::asap_only();
    }

    let start = (now + Duration::minutes(min_prep_minutes)).max(opens);
    let start = round_up_to_slot(start);

    if start > closes {
        return SlotOptions::asap_only();
    }

    let step = Duration::minutes(i64::from(SLOT_MINUTES));
    let mut slots = vec![TimeSlot::Asap];
    let mut slot = start + step;
    while slot <= closes {
        slots.push(TimeSlot::At(slot.time()));
        slot += step;
    }

    SlotOptions {
        slots,
        selected: TimeSlot::Asap,
        earliest: Some(start),
    }
}

pub fn is_open_at(hours: &[OpeningHours], now: NaiveDateTime) -> bool {
    hours_for_today(hours, now)
        .map(|h| {
            let time = now.time();
            time >= h.opens_at && time < h.closes_at
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        // 2025-06-02 is a Monday.
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn hours(day: u8, open: (u32, u32), close: (u32, u32)) -> OpeningHours {
        OpeningHours {
            day_of_week: day,
            opens_at: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            closes_at: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
        }
    }

    #[test]
    fn rounding_moves_to_next_quarter() {
        assert_eq!(round_up_to_slot(at(11, 7, 30)), at(11, 15, 0));
        assert_eq!(round_up_to_slot(at(11, 50, 0)), at(12, 0, 0));
        assert_eq!(round_up_to_slot(at(11, 45, 59)), at(11, 45, 0));
    }

    #[test]
    fn weekday_remap_is_monday_first() {
        assert_eq!(remap_sunday_first(0), 6);
        assert_eq!(remap_sunday_first(1), 0);
        assert_eq!(remap_sunday_first(6), 5);
        assert_eq!(day_index(Weekday::Mon), 0);
        assert_eq!(day_index(Weekday::Sun), 6);
    }

    #[test]
    fn builds_quarter_hour_slots_until_closing() {
        let today = hours(0, (10, 0), (13, 0));
        let options = compute_slots(at(11, 7, 0), Some(&today), 30);

        assert_eq!(options.earliest, Some(at(11, 45, 0)));
        assert_eq!(options.selected, TimeSlot::Asap);
        assert_eq!(
            options.labels(),
            vec!["ASAP", "12:00", "12:15", "12:30", "12:45", "13:00"]
        );
    }

    #[test]
    fn start_is_clamped_to_opening_time() {
        let today = hours(0, (16, 0), (17, 0));
        let options = compute_slots(at(9, 0, 0), Some(&today), 30);

        assert_eq!(options.earliest, Some(at(16, 0, 0)));
        assert_eq!(
            options.labels(),
            vec!["ASAP", "16:15", "16:30", "16:45", "17:00"]
        );
    }

    #[test]
    fn closed_or_missing_day_is_asap_only() {
        let today = hours(0, (10, 0), (13, 0));

        assert_eq!(compute_slots(at(13, 0, 0), Some(&today), 30), SlotOptions::asap_only());
        assert_eq!(compute_slots(at(14, 0, 0), Some(&today), 30), SlotOptions::asap_only());
        assert_eq!(compute_slots(at(11, 0, 0), None, 30), SlotOptions::asap_only());

        let week = vec![hours(3, (10, 0), (13, 0))];
        assert!(hours_for_today(&week, at(11, 0, 0)).is_none());
    }

    #[test]
    fn earliest_after_closing_is_asap_only() {
        let today = hours(0, (10, 0), (13, 0));
        let options = compute_slots(at(12, 40, 0), Some(&today), 30);
        assert_eq!(options, SlotOptions::asap_only());
    }

    #[test]
    fn earliest_exactly_at_closing_has_no_extra_slots() {
        let today = hours(0, (10, 0), (13, 0));
        let options = compute_slots(at(12, 30, 0), Some(&today), 30);
        assert_eq!(options.labels(), vec!["ASAP"]);
        assert_eq!(options.earliest, Some(at(13, 0, 0)));
    }

    #[test]
    fn slots_are_strictly_increasing_quarters_within_hours() {
        let today = hours(0, (9, 30), (22, 0));
        let closes = at(22, 0, 0);
        let mut now = at(0, 0, 0);

        while now < closes {
            for prep in [0, 10, 30, 45] {
                let options = compute_slots(now, Some(&today), prep);
                let Some(earliest) = options.earliest else {
                    assert_eq!(options.labels(), vec!["ASAP"]);
                    continue;
                };

                let mut previous = earliest;
                for slot in &options.slots[1..] {
                    let TimeSlot::At(time) = slot else {
                        panic!("ASAP must only appear first");
                    };
                    let current = now.date().and_time(*time);
                    assert_eq!(current - previous, Duration::minutes(15));
                    assert!(current <= closes);
                    previous = current;
                }
            }
            now += Duration::minutes(7);
        }
    }

    #[test]
    fn open_status_follows_todays_window() {
        let week = vec![hours(0, (10, 0), (13, 0))];
        assert!(is_open_at(&week, at(10, 0, 0)));
        assert!(!is_open_at(&week, at(13, 0, 0)));
        assert!(!is_open_at(&week, at(9, 59, 0)));
    }

    #[test]
    fn time_slot_round_trips_labels() {
        assert_eq!("ASAP".parse::<TimeSlot>().unwrap(), TimeSlot::Asap);
        let slot: TimeSlot = "09:45".parse().unwrap();
        assert_eq!(slot.to_string(), "09:45");
        assert!("9h45".parse::<TimeSlot>().is_err());
    }
}
