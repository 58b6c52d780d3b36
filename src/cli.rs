//! Command-line argument parsing for Cartita

use chrono::{DateTime, Utc};

/// Parse command line arguments
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub once: bool,
    pub at: Option<DateTime<Utc>>,
    pub week: bool,
    pub validate: bool,
    pub help: bool,
}

pub fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse an argument vector (first element is the program name)
pub fn parse_args_from(args: &[String]) -> Result<Args, String> {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => result.once = true,
            "--week" => result.week = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--at" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--at requires an RFC 3339 timestamp".to_string())?;
                let at = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| format!("--at '{}': {}", value, e))?;
                result.at = Some(at.with_timezone(&Utc));
                result.once = true; // Evaluating a fixed instant implies a single run
                i += 1;
            }
            other => return Err(format!("unknown argument '{}' (see --help)", other)),
        }
        i += 1;
    }

    Ok(result)
}

pub fn print_help() {
    println!("Cartita - venue opening hours and live status\n");
    println!("USAGE:");
    println!("    cartita [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once                  Evaluate the current status once and exit");
    println!("    --at <RFC3339>          Evaluate at a given instant, e.g. 2024-01-03T15:00:00Z (implies --once)");
    println!("    --week                  Print the weekly schedule and exit");
    println!("    --validate              Validate configuration and venue file, then exit");
    println!("    --help, -h              Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    CARTITA_VENUE_FILE          Venue JSON (name, timezone, weekStart, schedule)");
    println!("    CARTITA_LOCALE              Status language: en (default) or es");
    println!("    CARTITA_STATUS_PORT         Serve /status, /health, /metrics, /schedule on this port");
    println!("    CARTITA_STAFF_TOKEN         Bearer token for staff-only endpoints");
    println!("    CARTITA_IDLE_RECHECK_SECS   Re-check interval when no change is due (default 3600)");
}
