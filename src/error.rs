//! Error types for opening-hours evaluation

use thiserror::Error;

/// Errors surfaced by schedule parsing, validation and evaluation.
///
/// Neither is fatal to the host process: the caller decides how to present
/// a venue whose status cannot be computed (usually by hiding the badge).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HoursError {
    /// Malformed time, inverted interval or overlapping intervals
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Zone identifier not found in the IANA database
    #[error("invalid timezone: '{0}'")]
    InvalidTimezone(String),
}

impl HoursError {
    pub(crate) fn schedule(msg: impl Into<String>) -> Self {
        HoursError::InvalidSchedule(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_schedule() {
        let err = HoursError::schedule("monday: 25:00 is not a valid time");
        assert_eq!(
            err.to_string(),
            "invalid schedule: monday: 25:00 is not a valid time"
        );
    }

    #[test]
    fn test_display_invalid_timezone() {
        let err = HoursError::InvalidTimezone("Mars/Olympus".to_string());
        assert_eq!(err.to_string(), "invalid timezone: 'Mars/Olympus'");
    }
}
