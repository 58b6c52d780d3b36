//! Cartita - venue opening hours and live status
//!
//! The core is [`evaluator`]: a pure function deciding whether a venue is
//! open at an instant, when that changes next, and what to tell customers.
//! The remaining modules are the service around it: venue store, status
//! watcher, status HTTP server with role-gated routes, and configuration.

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod message;
pub mod schedule;
pub mod status;
pub mod venue;
pub mod watcher;

pub use error::HoursError;
pub use evaluator::{evaluate, EvaluationResult, HoursEvaluator};
pub use message::{Locale, RelativeDay, Status};
pub use schedule::{Interval, WeekStart, WeeklySchedule};
