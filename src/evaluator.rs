//! Opening-hours evaluation
//!
//! Decides whether a venue is open at an instant and when that will next
//! change. Pure: no clock access, no I/O, no state kept between calls, so the
//! same `(schedule, now, timezone)` always yields the same result.
//!
//! Every interval of the schedule is projected, for the days around `now`, to
//! an absolute `[start, end)` period in UTC through the venue's IANA zone.
//! Working on absolute instants keeps the wall-clock meaning of the schedule
//! intact across DST changes:
//!
//! - a wall-clock time skipped by a forward change is moved forward by the
//!   length of the gap
//! - a wall-clock time repeated by a backward change resolves to its first
//!   occurrence

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::HoursError;
use crate::message::{Locale, RelativeDay, Status};
use crate::schedule::WeeklySchedule;

/// How far ahead (in days) to look for the next opening
pub const SEARCH_DAYS_AHEAD: i64 = 8;

/// An open period running longer than this never closes (a weekly pattern
/// with a gap would repeat that gap within a week)
const ALWAYS_OPEN_AFTER_DAYS: i64 = 7;

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub is_open: bool,
    pub status: Status,
    pub status_message: String,
    /// Next instant at which `is_open` flips; `None` when it never does
    pub next_transition: Option<DateTime<Utc>>,
}

/// Open period in absolute time, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Period {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Parse an IANA zone identifier
pub fn parse_timezone(name: &str) -> Result<Tz, HoursError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| HoursError::InvalidTimezone(name.to_string()))
}

/// Evaluate with English status text. See [`HoursEvaluator::evaluate`].
pub fn evaluate(
    schedule: &WeeklySchedule,
    now: DateTime<Utc>,
    timezone: &str,
) -> Result<EvaluationResult, HoursError> {
    HoursEvaluator::default().evaluate(schedule, now, timezone)
}

/// Opening-hours evaluator; carries only the language of the status text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoursEvaluator {
    locale: Locale,
}

impl HoursEvaluator {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Evaluate `schedule` at `now` in the zone named `timezone`.
    ///
    /// The zone and the schedule are both checked before anything is
    /// computed; an invalid one yields an error and no partial result.
    pub fn evaluate(
        &self,
        schedule: &WeeklySchedule,
        now: DateTime<Utc>,
        timezone: &str,
    ) -> Result<EvaluationResult, HoursError> {
        let tz = parse_timezone(timezone)?;
        self.evaluate_in(schedule, now, tz)
    }

    /// Same as [`HoursEvaluator::evaluate`] with an already parsed zone
    pub fn evaluate_in(
        &self,
        schedule: &WeeklySchedule,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<EvaluationResult, HoursError> {
        schedule.validate()?;

        let today = now.with_timezone(&tz).date_naive();
        let periods = open_periods(schedule, today, tz);

        let (status, next_transition) =
            match periods.iter().find(|p| p.start <= now && now < p.end) {
                Some(open) if open.end - now > Duration::days(ALWAYS_OPEN_AFTER_DAYS) => {
                    (Status::AlwaysOpen, None)
                }
                Some(open) => {
                    let (mut day, at) = local_day_and_time(today, open.end, tz);
                    if day == RelativeDay::Tomorrow && open.end - now < Duration::days(1) {
                        day = RelativeDay::Tonight;
                    }
                    (Status::Closes { day, at }, Some(open.end))
                }
                None => match periods.iter().find(|p| p.start > now) {
                    Some(next) => {
                        let (day, at) = local_day_and_time(today, next.start, tz);
                        (Status::Opens { day, at }, Some(next.start))
                    }
                    None => (Status::Closed, None),
                },
            };

        Ok(EvaluationResult {
            is_open: status.is_open(),
            status_message: status.render(self.locale),
            status,
            next_transition,
        })
    }
}

/// Absolute open periods for every interval starting between yesterday and
/// `SEARCH_DAYS_AHEAD` days from `today`, sorted and with touching periods
/// merged so each one ends at a real open/closed flip.
fn open_periods(schedule: &WeeklySchedule, today: NaiveDate, tz: Tz) -> Vec<Period> {
    let mut periods = Vec::new();

    for offset in -1..=SEARCH_DAYS_AHEAD {
        let Some(date) = today.checked_add_signed(Duration::days(offset)) else {
            continue;
        };
        for interval in schedule.day(date.weekday()) {
            let close_date = if interval.crosses_midnight {
                match date.succ_opt() {
                    Some(d) => d,
                    None => continue,
                }
            } else {
                date
            };

            let start = resolve_local(tz, date.and_time(interval.opens_at));
            let end = resolve_local(tz, close_date.and_time(interval.closes_at));
            // Moving a start out of a DST gap can push it past the end
            if start < end {
                periods.push(Period { start, end });
            }
        }
    }

    periods.sort_by_key(|p| p.start);

    let mut merged: Vec<Period> = Vec::with_capacity(periods.len());
    for period in periods {
        match merged.last_mut() {
            Some(last) if period.start <= last.end => {
                last.end = last.end.max(period.end);
            }
            _ => merged.push(period),
        }
    }
    merged
}

/// Map a local wall-clock time to the instant it denotes in `tz`
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Skipped time: apply the offset in force before the gap
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1)));
            let offset = i64::from(before.fix().local_minus_utc());
            Utc.from_utc_datetime(&(local - Duration::seconds(offset)))
        }
    }
}

fn local_day_and_time(today: NaiveDate, at: DateTime<Utc>, tz: Tz) -> (RelativeDay, chrono::NaiveTime) {
    let local = at.with_timezone(&tz);
    let day = match (local.date_naive() - today).num_days() {
        0 => RelativeDay::Today,
        1 => RelativeDay::Tomorrow,
        _ => RelativeDay::Weekday(local.weekday()),
    };
    (day, local.time())
}
