//! Venue (tenant) configuration store
//!
//! A venue file carries everything the evaluator needs for one tenant:
//!
//! ```json
//! {
//!   "name": "La Cartita",
//!   "timezone": "America/Argentina/Buenos_Aires",
//!   "weekStart": "monday",
//!   "schedule": { "monday": [{ "opensAt": "12:00", "closesAt": "15:00" }] }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HoursError;
use crate::evaluator::{parse_timezone, EvaluationResult, HoursEvaluator};
use crate::schedule::{WeekStart, WeeklySchedule};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Venue {
    pub name: String,
    /// IANA zone identifier, e.g. `Europe/Madrid`
    pub timezone: String,
    #[serde(default)]
    pub week_start: WeekStart,
    #[serde(default)]
    pub schedule: WeeklySchedule,
}

impl Venue {
    /// Parse a venue and check its zone and schedule up front
    pub fn from_json(json: &str) -> Result<Self> {
        let venue: Venue = serde_json::from_str(json).context("Venue file is not valid JSON")?;
        venue.check()?;
        Ok(venue)
    }

    /// Zone and schedule problems, as the evaluator would report them
    pub fn check(&self) -> std::result::Result<(), HoursError> {
        parse_timezone(&self.timezone)?;
        self.schedule.validate()
    }

    pub fn evaluate(
        &self,
        evaluator: &HoursEvaluator,
        now: DateTime<Utc>,
    ) -> std::result::Result<EvaluationResult, HoursError> {
        evaluator.evaluate(&self.schedule, now, &self.timezone)
    }
}

/// Venue file on disk, re-read on every load so edits apply without a restart
#[derive(Debug, Clone)]
pub struct VenueFile {
    path: PathBuf,
}

impl VenueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Venue> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read venue file: {:?}", self.path))?;
        Venue::from_json(&json).with_context(|| format!("Invalid venue file: {:?}", self.path))
    }
}
