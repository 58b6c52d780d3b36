use anyhow::{bail, Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::message::Locale;
use crate::venue::VenueFile;
use crate::watcher::DEFAULT_IDLE_RECHECK;

#[derive(Debug, Clone)]
pub struct Config {
    // Venue definition (name, timezone, weekly schedule)
    pub venue_file: PathBuf,

    // Language of status messages
    pub locale: Locale,

    // Status HTTP server port (optional, disabled if not set)
    // When set, exposes /status, /health, /metrics and /schedule
    pub status_port: Option<u16>,

    // Bearer token for staff-only endpoints (optional)
    pub staff_token: Option<String>,

    // Re-check interval when no status change is coming
    pub idle_recheck: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            venue_file: get("CARTITA_VENUE_FILE")
                .filter(|s| !s.trim().is_empty())
                .context("CARTITA_VENUE_FILE not set")?
                .into(),

            locale: match get("CARTITA_LOCALE") {
                Some(s) => s
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("CARTITA_LOCALE must be 'en' or 'es'")?,
                None => Locale::default(),
            },

            status_port: get("CARTITA_STATUS_PORT")
                .map(|s| s.parse::<u16>())
                .transpose()
                .context("CARTITA_STATUS_PORT must be a valid port number")?,

            staff_token: get("CARTITA_STAFF_TOKEN").filter(|s| !s.is_empty()),

            // Zero would make the watcher spin when no transition is coming
            idle_recheck: match get("CARTITA_IDLE_RECHECK_SECS").and_then(|s| s.parse::<u64>().ok()) {
                Some(0) => bail!("CARTITA_IDLE_RECHECK_SECS must be greater than 0"),
                Some(secs) => Duration::from_secs(secs),
                None => DEFAULT_IDLE_RECHECK,
            },
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    pub fn venue_store(&self) -> VenueFile {
        VenueFile::new(&self.venue_file)
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !Path::new(&self.venue_file).exists() {
            errors.push(format!(
                "Venue file not found at {:?}.",
                self.venue_file
            ));
        } else if let Err(e) = self.venue_store().load() {
            errors.push(format!("{:#}", e));
        }

        if self.status_port == Some(0) {
            errors.push("CARTITA_STATUS_PORT cannot be 0.".to_string());
        }

        if self.status_port.is_some() && self.staff_token.is_none() {
            errors.push(
                "CARTITA_STAFF_TOKEN must be set when the status server is enabled (/schedule is staff-only)."
                    .to_string(),
            );
        }

        if let Some(token) = &self.staff_token {
            if token.len() < 16 {
                errors.push("CARTITA_STAFF_TOKEN is too short (min 16 characters).".to_string());
            }
        }

        if self.idle_recheck.is_zero() {
            errors.push("CARTITA_IDLE_RECHECK_SECS must be greater than 0.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::test_support::write_temp;

    fn minimal_valid_env() -> HashMap<&'static str, &'static str> {
        let mut m = HashMap::new();
        m.insert("CARTITA_VENUE_FILE", "./venue.json");
        m
    }

    #[test]
    fn test_valid_minimal_config() {
        let env = minimal_valid_env();
        let config = Config::from_map(&env).expect("should parse valid config");

        assert_eq!(config.venue_file, PathBuf::from("./venue.json"));
        assert_eq!(config.locale, Locale::English); // default
        assert_eq!(config.status_port, None); // disabled by default
        assert_eq!(config.staff_token, None);
        assert_eq!(config.idle_recheck, DEFAULT_IDLE_RECHECK);
    }

    #[test]
    fn test_missing_venue_file() {
        let mut env = minimal_valid_env();
        env.remove("CARTITA_VENUE_FILE");
        let err = Config::from_map(&env).unwrap_err().to_string();
        assert!(err.contains("CARTITA_VENUE_FILE"), "error should mention CARTITA_VENUE_FILE: {}", err);
    }

    #[test]
    fn test_empty_venue_file() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_VENUE_FILE", "  ");
        assert!(Config::from_map(&env).is_err());
    }

    #[test]
    fn test_locale() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_LOCALE", "es");
        assert_eq!(Config::from_map(&env).unwrap().locale, Locale::Spanish);

        env.insert("CARTITA_LOCALE", "klingon");
        let err = format!("{:#}", Config::from_map(&env).unwrap_err());
        assert!(err.contains("CARTITA_LOCALE"), "{}", err);
    }

    #[test]
    fn test_status_port() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_STATUS_PORT", "8080");
        assert_eq!(Config::from_map(&env).unwrap().status_port, Some(8080));
    }

    #[test]
    fn test_invalid_status_port() {
        for bad in ["not_a_number", "99999", "-1", ""] {
            let mut env = minimal_valid_env();
            env.insert("CARTITA_STATUS_PORT", bad);
            let err = Config::from_map(&env).unwrap_err().to_string();
            assert!(err.contains("CARTITA_STATUS_PORT"), "{}: {}", bad, err);
        }
    }

    #[test]
    fn test_empty_staff_token_is_none() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_STAFF_TOKEN", "");
        assert_eq!(Config::from_map(&env).unwrap().staff_token, None);
    }

    #[test]
    fn test_idle_recheck_invalid_uses_default() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_IDLE_RECHECK_SECS", "soon");
        assert_eq!(Config::from_map(&env).unwrap().idle_recheck, DEFAULT_IDLE_RECHECK);

        env.insert("CARTITA_IDLE_RECHECK_SECS", "600");
        assert_eq!(Config::from_map(&env).unwrap().idle_recheck, Duration::from_secs(600));
    }

    #[test]
    fn test_idle_recheck_zero_rejected() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_IDLE_RECHECK_SECS", "0");
        let err = Config::from_map(&env).unwrap_err().to_string();
        assert!(err.contains("CARTITA_IDLE_RECHECK_SECS"), "{}", err);
    }

    #[test]
    fn test_validation_missing_venue_file() {
        let mut env = minimal_valid_env();
        env.insert("CARTITA_VENUE_FILE", "/nonexistent/venue.json");
        let config = Config::from_map(&env).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Venue file not found"), "{}", err);
    }

    #[test]
    fn test_validation_invalid_venue() {
        let path = write_temp(r#"{"name": "x", "timezone": "UTC", "schedule": {"monday": [
            {"opensAt": "09:00", "closesAt": "14:00"}, {"opensAt": "13:00", "closesAt": "18:00"}]}}"#);
        let config = Config {
            venue_file: path.clone(),
            locale: Locale::English,
            status_port: None,
            staff_token: None,
            idle_recheck: DEFAULT_IDLE_RECHECK,
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("overlaps"), "{}", err);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_validation_server_needs_token() {
        let path = write_temp(r#"{"name": "x", "timezone": "UTC"}"#);
        let mut config = Config {
            venue_file: path.clone(),
            locale: Locale::English,
            status_port: Some(8080),
            staff_token: None,
            idle_recheck: DEFAULT_IDLE_RECHECK,
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("CARTITA_STAFF_TOKEN"), "{}", err);

        config.staff_token = Some("short".to_string());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("too short"), "{}", err);

        config.staff_token = Some("a-long-enough-staff-token".to_string());
        assert!(config.validate().is_ok());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = Config {
            venue_file: "/nonexistent/venue.json".into(),
            locale: Locale::English,
            status_port: Some(0),
            staff_token: None,
            idle_recheck: Duration::ZERO,
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Venue file not found"));
        assert!(err.contains("cannot be 0"));
        assert!(err.contains("CARTITA_IDLE_RECHECK_SECS"));
    }
}
