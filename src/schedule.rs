//! Weekly opening schedule
//!
//! A venue publishes, for each day of the week, the list of intervals during
//! which it serves. An interval may run past midnight when it is explicitly
//! marked as doing so; its closing time then falls on the following day.

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::HoursError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Days in storage order (index = days from Monday)
pub const DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Lowercase English day name, as used in schedule files and error messages
pub fn day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parse a strict `HH:MM` wall-clock time.
///
/// Exactly two digits, a colon, two digits. `24:00`, `9:00` and `09:00:00`
/// are all rejected.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, HoursError> {
    let b = s.as_bytes();
    let well_shaped = b.len() == 5
        && b[2] == b':'
        && [b[0], b[1], b[3], b[4]].iter().all(|c| c.is_ascii_digit());
    if !well_shaped {
        return Err(HoursError::schedule(format!(
            "'{}' is not a HH:MM time",
            s.escape_debug()
        )));
    }

    let hour = u32::from(b[0] - b'0') * 10 + u32::from(b[1] - b'0');
    let minute = u32::from(b[3] - b'0') * 10 + u32::from(b[4] - b'0');
    if hour > 23 || minute > 59 {
        return Err(HoursError::schedule(format!("'{}' is out of range", s)));
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| HoursError::schedule(format!("'{}' is out of range", s)))
}

/// Format a time as `HH:MM`
pub fn format_hhmm(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Serde adapter for `HH:MM` strings
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hhmm(&s).map_err(de::Error::custom)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A contiguous opening period that starts on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Interval {
    /// Inclusive start
    #[serde(with = "hhmm")]
    pub opens_at: NaiveTime,
    /// Exclusive end; on the next day when `crosses_midnight` is set
    #[serde(with = "hhmm")]
    pub closes_at: NaiveTime,
    #[serde(default, skip_serializing_if = "is_false")]
    pub crosses_midnight: bool,
}

impl Interval {
    /// Same-day interval from `HH:MM` strings
    pub fn parse(opens_at: &str, closes_at: &str) -> Result<Self, HoursError> {
        let interval = Self {
            opens_at: parse_hhmm(opens_at)?,
            closes_at: parse_hhmm(closes_at)?,
            crosses_midnight: false,
        };
        interval.validate()?;
        Ok(interval)
    }

    /// Interval whose closing time is on the following day
    pub fn overnight(opens_at: &str, closes_at: &str) -> Result<Self, HoursError> {
        let interval = Self {
            opens_at: parse_hhmm(opens_at)?,
            closes_at: parse_hhmm(closes_at)?,
            crosses_midnight: true,
        };
        interval.validate()?;
        Ok(interval)
    }

    /// Start and end in minutes from the start of the opening day.
    /// The end exceeds `MINUTES_PER_DAY` for overnight intervals.
    pub fn span_minutes(&self) -> (u32, u32) {
        let start = minutes_of(self.opens_at);
        let end = minutes_of(self.closes_at);
        if self.crosses_midnight {
            (start, end + MINUTES_PER_DAY)
        } else {
            (start, end)
        }
    }

    /// Minutes the interval reaches into the following day (0 for same-day intervals)
    pub fn spill_minutes(&self) -> u32 {
        let (_, end) = self.span_minutes();
        end.saturating_sub(MINUTES_PER_DAY)
    }

    pub fn validate(&self) -> Result<(), HoursError> {
        for t in [self.opens_at, self.closes_at] {
            if t.second() != 0 || t.nanosecond() != 0 {
                return Err(HoursError::schedule(format!(
                    "{} has seconds; times must be whole minutes",
                    t
                )));
            }
        }

        if self.crosses_midnight {
            // Equal times mean a full 24 hours
            if self.closes_at > self.opens_at {
                return Err(HoursError::schedule(format!(
                    "{} would stay open longer than a day",
                    self
                )));
            }
        } else if self.closes_at <= self.opens_at {
            return Err(HoursError::schedule(format!(
                "{} closes before it opens; mark it as crossing midnight if intended",
                self
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            format_hhmm(self.opens_at),
            format_hhmm(self.closes_at)
        )?;
        if self.crosses_midnight {
            write!(f, " (+1)")?;
        }
        Ok(())
    }
}

fn minutes_of(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// First day of the week, used when listing a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    /// The seven days in display order
    pub fn days(self) -> impl Iterator<Item = Weekday> {
        let first = match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        };
        (0..7).scan(first, |day, _| {
            let current = *day;
            *day = day.succ();
            Some(current)
        })
    }
}

/// Opening intervals for each day of the week, Monday first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawWeek", into = "RawWeek")]
pub struct WeeklySchedule {
    days: [Vec<Interval>; 7],
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`WeeklySchedule::set_day`]
    pub fn with_day(mut self, day: Weekday, intervals: Vec<Interval>) -> Self {
        self.set_day(day, intervals);
        self
    }

    /// Replace a day's intervals. They are stored sorted by opening time.
    pub fn set_day(&mut self, day: Weekday, mut intervals: Vec<Interval>) {
        intervals.sort_by_key(|i| i.opens_at);
        self.days[day.num_days_from_monday() as usize] = intervals;
    }

    pub fn day(&self, day: Weekday) -> &[Interval] {
        &self.days[day.num_days_from_monday() as usize]
    }

    /// True when no day has any interval (permanently closed)
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }

    /// Parse and validate a schedule from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, HoursError> {
        let schedule: Self =
            serde_json::from_str(json).map_err(|e| HoursError::schedule(e.to_string()))?;
        schedule.validate()?;
        Ok(schedule)
    }

    /// Reject malformed intervals and any overlap, including an overnight
    /// interval running into the next day's first interval.
    pub fn validate(&self) -> Result<(), HoursError> {
        for day in DAYS {
            let mut intervals = self.day(day).to_vec();
            for interval in &intervals {
                interval
                    .validate()
                    .map_err(|e| prefix_day(day, e))?;
            }

            intervals.sort_by_key(|i| i.opens_at);
            for pair in intervals.windows(2) {
                let (_, prev_end) = pair[0].span_minutes();
                let (next_start, _) = pair[1].span_minutes();
                if next_start < prev_end {
                    return Err(HoursError::schedule(format!(
                        "{}: {} overlaps {}",
                        day_key(day),
                        pair[0],
                        pair[1]
                    )));
                }
            }

            let spill = intervals.iter().map(Interval::spill_minutes).max().unwrap_or(0);
            if spill == 0 {
                continue;
            }
            let next_day = day.succ();
            if let Some(first) = self.day(next_day).iter().min_by_key(|i| i.opens_at) {
                let (start, _) = first.span_minutes();
                if start < spill {
                    return Err(HoursError::schedule(format!(
                        "{} overnight hours overlap {} {}",
                        day_key(day),
                        day_key(next_day),
                        first
                    )));
                }
            }
        }
        Ok(())
    }
}

fn prefix_day(day: Weekday, err: HoursError) -> HoursError {
    match err {
        HoursError::InvalidSchedule(msg) => {
            HoursError::InvalidSchedule(format!("{}: {}", day_key(day), msg))
        }
        other => other,
    }
}

/// File representation: one optional list per named day
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawWeek {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    monday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tuesday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    wednesday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    thursday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    friday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    saturday: Vec<Interval>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sunday: Vec<Interval>,
}

impl From<RawWeek> for WeeklySchedule {
    fn from(raw: RawWeek) -> Self {
        WeeklySchedule::new()
            .with_day(Weekday::Mon, raw.monday)
            .with_day(Weekday::Tue, raw.tuesday)
            .with_day(Weekday::Wed, raw.wednesday)
            .with_day(Weekday::Thu, raw.thursday)
            .with_day(Weekday::Fri, raw.friday)
            .with_day(Weekday::Sat, raw.saturday)
            .with_day(Weekday::Sun, raw.sunday)
    }
}

impl From<WeeklySchedule> for RawWeek {
    fn from(schedule: WeeklySchedule) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = schedule.days;
        RawWeek {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// parse_hhmm never panics on arbitrary input
        #[test]
        fn parse_hhmm_never_panics(s in ".{0,12}") {
            let _ = parse_hhmm(&s);
        }

        /// Every valid time formats back to the same string
        #[test]
        fn hhmm_format_parse_agree(hour in 0u32..24, minute in 0u32..60) {
            let s = format!("{:02}:{:02}", hour, minute);
            let t = parse_hhmm(&s).unwrap();
            prop_assert_eq!(format_hhmm(t), s);
        }

        /// Disjoint sorted intervals always validate
        #[test]
        fn disjoint_intervals_validate(a in 0u32..6, b in 6u32..12, c in 12u32..18, d in 18u32..24) {
            let mk = |h1: u32, h2: u32| Interval {
                opens_at: NaiveTime::from_hms_opt(h1, 0, 0).unwrap(),
                closes_at: NaiveTime::from_hms_opt(h2, 0, 0).unwrap(),
                crosses_midnight: false,
            };
            prop_assume!(a < b && c < d);
            let s = WeeklySchedule::new().with_day(Weekday::Thu, vec![mk(c, d), mk(a, b)]);
            prop_assert!(s.validate().is_ok());
        }
    }
}

/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(7)]
    fn parse_hhmm_never_panics() {
        let bytes: [u8; 5] = kani::any();
        if let Ok(s) = std::str::from_utf8(&bytes) {
            let _ = parse_hhmm(s);
        }
    }

    #[kani::proof]
    fn parsed_time_in_range() {
        let bytes: [u8; 5] = kani::any();
        if let Ok(s) = std::str::from_utf8(&bytes) {
            if let Ok(t) = parse_hhmm(s) {
                kani::assert(t.hour() < 24, "hour must be < 24");
                kani::assert(t.minute() < 60, "minute must be < 60");
                kani::assert(t.second() == 0, "seconds must be zero");
            }
        }
    }
}
