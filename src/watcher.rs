/// Live status watcher
/// Re-evaluates the venue exactly when its status is due to flip, rather than
/// polling, and publishes every result to the shared status board.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::evaluator::{EvaluationResult, HoursEvaluator};
use crate::message::weekly_summary;
use crate::status::{StatusBoard, VenueStatus};
use crate::venue::VenueFile;

/// Re-check interval when no transition is coming (permanently closed,
/// always open, or a failed evaluation)
pub const DEFAULT_IDLE_RECHECK: Duration = Duration::from_secs(3600);

/// Floor for the idle re-check
pub const MIN_IDLE_RECHECK: Duration = Duration::from_secs(1);

/// How long to sleep before the next evaluation.
///
/// Wakes exactly at `next_transition`; the evaluator treats that instant as
/// already flipped (opening inclusive, closing exclusive).
pub fn wait_until_transition(
    now: DateTime<Utc>,
    next_transition: Option<DateTime<Utc>>,
    idle: Duration,
) -> Duration {
    match next_transition {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO),
        None => idle,
    }
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

/// Load the venue, evaluate at `now` and publish the outcome.
///
/// Returns the result so the caller can schedule its next wake-up; errors are
/// logged and published, never propagated.
pub fn check_once(
    store: &VenueFile,
    evaluator: &HoursEvaluator,
    board: &StatusBoard,
    now: DateTime<Utc>,
) -> Option<EvaluationResult> {
    let venue = match store.load() {
        Ok(venue) => venue,
        Err(e) => {
            error!("Failed to load venue: {:#}", e);
            board.publish_error(format!("{:#}", e));
            return None;
        }
    };

    match venue.evaluate(evaluator, now) {
        Ok(result) => {
            let weekly = weekly_summary(&venue.schedule, venue.week_start, evaluator.locale());
            board.publish(
                VenueStatus {
                    venue: venue.name.clone(),
                    timezone: venue.timezone.clone(),
                    result: result.clone(),
                    evaluated_at: now,
                },
                weekly,
            );
            Some(result)
        }
        Err(e) => {
            error!("Failed to evaluate hours for {}: {}", venue.name, e);
            board.publish_error(e.to_string());
            None
        }
    }
}

/// Run the watcher loop until cancelled
pub async fn run_status_watch(
    store: VenueFile,
    evaluator: HoursEvaluator,
    board: Arc<StatusBoard>,
    idle_recheck: Duration,
    cancel_token: CancellationToken,
) {
    let idle_recheck = idle_recheck.max(MIN_IDLE_RECHECK);
    info!("Status watcher started for {:?}", store.path());
    let mut last_open: Option<bool> = None;

    loop {
        let now = Utc::now();
        let result = check_once(&store, &evaluator, &board, now);

        let wait = match &result {
            Some(r) => {
                if last_open != Some(r.is_open) {
                    info!(
                        "Venue is now {}: {}",
                        if r.is_open { "OPEN" } else { "CLOSED" },
                        r.status_message
                    );
                } else {
                    debug!("Status unchanged: {}", r.status_message);
                }
                last_open = Some(r.is_open);
                wait_until_transition(now, r.next_transition, idle_recheck)
            }
            None => {
                warn!("No status available; retrying in {}", format_duration(idle_recheck));
                last_open = None;
                idle_recheck
            }
        };

        if let Some(at) = result.as_ref().and_then(|r| r.next_transition) {
            info!("Next check at {} (in {})", at, format_duration(wait));
        }

        tokio::select! {
            _ = sleep(wait) => {}
            _ = cancel_token.cancelled() => {
                info!("Status watcher shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Locale;
    use crate::venue::test_support::write_temp;
    use chrono::TimeZone;

    const VENUE: &str = r#"{
        "name": "La Cartita",
        "timezone": "UTC",
        "schedule": {
            "wednesday": [
                {"opensAt": "09:00", "closesAt": "14:00"},
                {"opensAt": "18:00", "closesAt": "23:00"}
            ]
        }
    }"#;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
    }

    // === format_duration tests ===

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(format_duration(Duration::from_secs(3660)), "1h 1m");
        assert_eq!(format_duration(Duration::from_secs(1800)), "30m");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m");
    }

    #[test]
    fn test_format_duration_edge_cases() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(86_400 + 7200 + 60)), "1d 2h 1m");
    }

    // === wait_until_transition tests ===

    #[test]
    fn test_wait_until_transition() {
        let wait = wait_until_transition(at(3, 15, 0), Some(at(3, 18, 0)), DEFAULT_IDLE_RECHECK);
        assert_eq!(wait, Duration::from_secs(3 * 3600));
    }

    #[test]
    fn test_wait_for_past_transition_is_zero() {
        let wait = wait_until_transition(at(3, 18, 1), Some(at(3, 18, 0)), DEFAULT_IDLE_RECHECK);
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn test_wait_without_transition_is_idle() {
        let idle = Duration::from_secs(42);
        assert_eq!(wait_until_transition(at(3, 15, 0), None, idle), idle);
    }

    // === check_once tests ===

    #[test]
    fn test_check_once_publishes() {
        let path = write_temp(VENUE);
        let board = StatusBoard::new();
        let result = check_once(&VenueFile::new(&path), &HoursEvaluator::default(), &board, at(3, 15, 0))
            .expect("venue evaluates");

        assert!(!result.is_open);
        assert_eq!(result.next_transition, Some(at(3, 18, 0)));

        let current = board.current().expect("status published");
        assert_eq!(current.venue, "La Cartita");
        assert_eq!(current.result, result);
        assert_eq!(board.weekly().len(), 7);
        assert_eq!(board.counters().evaluations_ok, 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_check_once_uses_locale() {
        let path = write_temp(VENUE);
        let board = StatusBoard::new();
        let evaluator = HoursEvaluator::new(Locale::Spanish);
        let result = check_once(&VenueFile::new(&path), &evaluator, &board, at(3, 10, 0)).unwrap();
        assert_eq!(result.status_message, "Cierra a las 14:00");
        assert!(board.weekly()[2].starts_with("Miércoles"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_check_once_bad_file() {
        let path = write_temp(r#"{"name": "x", "timezone": "Mars/Olympus"}"#);
        let board = StatusBoard::new();
        assert!(check_once(&VenueFile::new(&path), &HoursEvaluator::default(), &board, at(3, 10, 0)).is_none());
        assert!(board.current().is_none());
        assert_eq!(board.counters().evaluations_failed, 1);
        assert!(board.last_error().unwrap().contains("Mars/Olympus"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_check_once_picks_up_edits() {
        let path = write_temp(VENUE);
        let store = VenueFile::new(&path);
        let board = StatusBoard::new();
        let evaluator = HoursEvaluator::default();

        assert!(!check_once(&store, &evaluator, &board, at(3, 15, 0)).unwrap().is_open);

        std::fs::write(
            &path,
            r#"{"name": "La Cartita", "timezone": "UTC",
                "schedule": {"wednesday": [{"opensAt": "09:00", "closesAt": "23:00"}]}}"#,
        )
        .unwrap();
        assert!(check_once(&store, &evaluator, &board, at(3, 15, 0)).unwrap().is_open);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_watch_publishes_and_stops() {
        let path = write_temp(VENUE);
        let board = Arc::new(StatusBoard::new());
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_status_watch(
            VenueFile::new(&path),
            HoursEvaluator::default(),
            board.clone(),
            DEFAULT_IDLE_RECHECK,
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(board.current().is_some());

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("Watcher should stop within timeout")
            .expect("Watcher should complete without panic");
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_watch_zero_idle_does_not_spin() {
        // Permanently closed: no transition, so every wait is the idle one
        let path = write_temp(r#"{"name": "La Cartita", "timezone": "UTC"}"#);
        let board = Arc::new(StatusBoard::new());
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_status_watch(
            VenueFile::new(&path),
            HoursEvaluator::default(),
            board.clone(),
            Duration::ZERO,
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_token.cancel();
        handle.await.unwrap();

        assert_eq!(board.counters().evaluations_ok, 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_watch_checks_once_when_already_cancelled() {
        let path = write_temp(VENUE);
        let board = Arc::new(StatusBoard::new());
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        tokio_test::block_on(run_status_watch(
            VenueFile::new(&path),
            HoursEvaluator::default(),
            board.clone(),
            DEFAULT_IDLE_RECHECK,
            cancel_token,
        ));

        assert_eq!(board.counters().evaluations_ok, 1);
        std::fs::remove_file(path).ok();
    }
}
