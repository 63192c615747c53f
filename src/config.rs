//! Configuration management

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OSRM table service base URL; empty string selects the offline
    /// haversine estimator (tests, air-gapped runs).
    pub osrm_base_url: String,

    /// Listen address for the HTTP server
    pub bind_addr: String,

    /// Engine constants, resolved once and passed by reference
    pub constants: Constants,
}

/// Engine constants. Resolved from the environment at startup and treated as
/// immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Constants {
    /// Drop penalty charged for leaving an order unserved in a solve round
    pub miss_penalty: i64,

    /// Divisor applied once per whole day an order's due time lies ahead
    pub miss_penalty_reducer: i64,

    /// Turnaround pause between consecutive trips of one rider, seconds
    pub wait_time_at_warehouse: i64,

    /// Cost per second of arriving after an order's expected time
    pub late_delivery_penalty_per_sec: i64,

    /// Earliest clock any rider may work, seconds since midnight
    pub global_start_time: i64,

    /// Latest clock any trip may still be under way, seconds since midnight
    pub global_end_time: i64,

    /// Hard ceiling on a single depot-to-depot loop, seconds
    pub max_trip_time: i64,

    /// Default total solve budget when the request carries no `runtime`
    pub default_time_limit: i64,

    /// Budget for one rider's current-trip re-solve during pickup insertion
    pub trip_replan_time_limit: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let osrm_base_url = std::env::var("OSRM_BASE_URL")
            .unwrap_or_else(|_| "http://router.project-osrm.org".to_string());

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let constants = Constants::from_env()?;

        Ok(Self { osrm_base_url, bind_addr, constants })
    }
}

impl Constants {
    pub fn from_env() -> Result<Self> {
        let constants = Self {
            miss_penalty: env_i64("MISS_PENALTY", 2_000_000)?,
            miss_penalty_reducer: env_i64("MISS_PENALTY_REDUCER", 20)?,
            wait_time_at_warehouse: env_seconds("WAIT_TIME_AT_WAREHOUSE", 0)?,
            late_delivery_penalty_per_sec: env_i64("LATE_DELIVERY_PENALTY_PER_SEC", 10)?,
            global_start_time: env_seconds("GLOBAL_START_TIME", 9 * 3600)?,
            global_end_time: env_seconds("GLOBAL_END_TIME", 21 * 3600)?,
            max_trip_time: env_seconds("MAX_TRIP_TIME", 5 * 3600 + 30 * 60)?,
            default_time_limit: env_seconds("DEFAULT_TIME_LIMIT", 300)?,
            trip_replan_time_limit: env_seconds("TRIP_REPLAN_TIME_LIMIT", 5)?,
        };

        if constants.miss_penalty_reducer < 2 {
            anyhow::bail!("MISS_PENALTY_REDUCER must be at least 2");
        }
        if constants.global_end_time <= constants.global_start_time {
            anyhow::bail!("GLOBAL_END_TIME must be after GLOBAL_START_TIME");
        }

        Ok(constants)
    }
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            miss_penalty: 2_000_000,
            miss_penalty_reducer: 20,
            wait_time_at_warehouse: 0,
            late_delivery_penalty_per_sec: 10,
            global_start_time: 9 * 3600,
            global_end_time: 21 * 3600,
            max_trip_time: 5 * 3600 + 30 * 60,
            default_time_limit: 300,
            trip_replan_time_limit: 5,
        }
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{} must be an integer, got {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Seconds-valued settings accept either a plain integer ("19800") or a
/// clock string ("05:30").
fn env_seconds(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(raw) => {
            parse_seconds(&raw).with_context(|| format!("{} must be seconds or HH:MM, got {:?}", key, raw))
        }
        Err(_) => Ok(default),
    }
}

fn parse_seconds(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<i64>() {
        return Ok(seconds);
    }
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))?;
    Ok(time.num_seconds_from_midnight() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_defaults() {
        let constants = Constants::default();
        assert_eq!(constants.miss_penalty, 2_000_000);
        assert_eq!(constants.miss_penalty_reducer, 20);
        assert_eq!(constants.global_start_time, 32_400);
        assert_eq!(constants.global_end_time, 75_600);
        assert_eq!(constants.max_trip_time, 19_800);
        assert_eq!(constants.default_time_limit, 300);
    }

    #[test]
    fn test_parse_seconds_plain_integer() {
        assert_eq!(parse_seconds("19800").unwrap(), 19_800);
        assert_eq!(parse_seconds(" 0 ").unwrap(), 0);
    }

    #[test]
    fn test_parse_seconds_clock_string() {
        assert_eq!(parse_seconds("09:00").unwrap(), 32_400);
        assert_eq!(parse_seconds("05:30").unwrap(), 19_800);
        assert_eq!(parse_seconds("21:00:00").unwrap(), 75_600);
    }

    #[test]
    fn test_parse_seconds_rejects_garbage() {
        assert!(parse_seconds("nine").is_err());
    }
}
