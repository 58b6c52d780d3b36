//! Status wording
//!
//! The evaluator decides *what* to tell a customer ([`Status`]); this module
//! decides *how* to say it in each supported language.

use chrono::{NaiveTime, Timelike, Weekday};
use serde::Serialize;
use std::str::FromStr;

use crate::schedule::{format_hhmm, hhmm, WeekStart, WeeklySchedule};

/// Language used for status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    Spanish,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Ok(Locale::English),
            "es" | "es-ar" | "es-es" | "es-mx" | "spanish" | "español" => Ok(Locale::Spanish),
            other => Err(format!("unsupported locale '{}' (expected 'en' or 'es')", other)),
        }
    }
}

/// Day of a transition relative to the evaluation day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelativeDay {
    Today,
    /// Past midnight but less than a day away; a closing time that ends the
    /// current night
    Tonight,
    Tomorrow,
    Weekday(Weekday),
}

/// What the customer needs to know about the venue right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Status {
    /// Open; closes at the given local time
    Closes {
        day: RelativeDay,
        #[serde(with = "hhmm")]
        at: NaiveTime,
    },
    /// Open with no closing within the coming week
    AlwaysOpen,
    /// Closed; opens at the given local time
    Opens {
        day: RelativeDay,
        #[serde(with = "hhmm")]
        at: NaiveTime,
    },
    /// Closed with no opening anywhere in the schedule
    Closed,
}

impl Status {
    pub fn is_open(&self) -> bool {
        matches!(self, Status::Closes { .. } | Status::AlwaysOpen)
    }

    pub fn render(&self, locale: Locale) -> String {
        match locale {
            Locale::English => self.render_en(),
            Locale::Spanish => self.render_es(),
        }
    }

    fn render_en(&self) -> String {
        match *self {
            Status::Closes {
                day: RelativeDay::Today | RelativeDay::Tonight,
                at,
            } => format!("Closes at {}", format_hhmm(at)),
            Status::Closes {
                day: RelativeDay::Tomorrow,
                at,
            } => format!("Closes tomorrow at {}", format_hhmm(at)),
            Status::Closes {
                day: RelativeDay::Weekday(d),
                at,
            } => format!("Closes {} at {}", weekday_en(d), format_hhmm(at)),
            Status::AlwaysOpen => "Open 24 hours".to_string(),
            Status::Opens {
                day: RelativeDay::Today,
                at,
            } => format!("Opens today at {}", format_hhmm(at)),
            Status::Opens {
                day: RelativeDay::Tonight,
                at,
            } => format!("Opens tonight at {}", format_hhmm(at)),
            Status::Opens {
                day: RelativeDay::Tomorrow,
                at,
            } => format!("Opens tomorrow at {}", format_hhmm(at)),
            Status::Opens {
                day: RelativeDay::Weekday(d),
                at,
            } => format!("Opens {} at {}", weekday_en(d), format_hhmm(at)),
            Status::Closed => "Closed".to_string(),
        }
    }

    fn render_es(&self) -> String {
        match *self {
            Status::Closes {
                day: RelativeDay::Today | RelativeDay::Tonight,
                at,
            } => format!("Cierra {}", a_las(at)),
            Status::Closes {
                day: RelativeDay::Tomorrow,
                at,
            } => format!("Cierra mañana {}", a_las(at)),
            Status::Closes {
                day: RelativeDay::Weekday(d),
                at,
            } => format!("Cierra el {} {}", weekday_es(d), a_las(at)),
            Status::AlwaysOpen => "Abierto las 24 horas".to_string(),
            Status::Opens {
                day: RelativeDay::Today,
                at,
            } => format!("Abre hoy {}", a_las(at)),
            Status::Opens {
                day: RelativeDay::Tonight,
                at,
            } => format!("Abre esta noche {}", a_las(at)),
            Status::Opens {
                day: RelativeDay::Tomorrow,
                at,
            } => format!("Abre mañana {}", a_las(at)),
            Status::Opens {
                day: RelativeDay::Weekday(d),
                at,
            } => format!("Abre el {} {}", weekday_es(d), a_las(at)),
            Status::Closed => "Cerrado".to_string(),
        }
    }
}

/// "a la 01:00" is singular in Spanish
fn a_las(at: NaiveTime) -> String {
    if at.hour() == 1 {
        format!("a la {}", format_hhmm(at))
    } else {
        format!("a las {}", format_hhmm(at))
    }
}

pub fn weekday_en(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn weekday_es(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// One line per day, e.g. `Wednesday: 09:00-14:00, 18:00-23:00`
pub fn weekly_summary(schedule: &WeeklySchedule, week_start: WeekStart, locale: Locale) -> Vec<String> {
    week_start
        .days()
        .map(|day| {
            let name = match locale {
                Locale::English => weekday_en(day).to_string(),
                Locale::Spanish => capitalize(weekday_es(day)),
            };
            let intervals = schedule.day(day);
            let hours = if intervals.is_empty() {
                match locale {
                    Locale::English => "Closed".to_string(),
                    Locale::Spanish => "Cerrado".to_string(),
                }
            } else {
                intervals
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("{}: {}", name, hours)
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
