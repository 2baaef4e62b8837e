//! Application configuration loading from config.toml and the environment.
//!
//! `config.toml` is optional; every field has a default. Environment variables (usually
//! loaded from `.env`) override whatever the file says.

use super::booking::{BookingPolicy, DEFAULT_BOOKING_WINDOW_DAYS, DEFAULT_MAX_CONCURRENT};
use super::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// Defaults applied when the settings row is created, and the salon timezone
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub max_concurrent_appointments: i32,
    pub booking_window_days: i32,
    /// Salon offset from UTC in minutes (e.g. 480 for UTC+8)
    pub utc_offset_minutes: i32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_appointments: DEFAULT_MAX_CONCURRENT,
            booking_window_days: DEFAULT_BOOKING_WINDOW_DAYS,
            utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    /// Builds the booking policy, clamping out-of-range values.
    pub fn booking_policy(&self) -> Result<BookingPolicy> {
        BookingPolicy::new(
            self.booking.max_concurrent_appointments,
            self.booking.booking_window_days,
            self.booking.utc_offset_minutes,
        )
    }

    /// Applies environment overrides, reading variables through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("BIND_ADDR") {
            self.server.bind_addr = value;
        }
        if let Some(value) = lookup("DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = lookup("DEFAULT_MAX_CONCURRENT_APPOINTMENTS") {
            self.booking.max_concurrent_appointments =
                parse_int("DEFAULT_MAX_CONCURRENT_APPOINTMENTS", &value)?;
        }
        if let Some(value) = lookup("DEFAULT_BOOKING_WINDOW_DAYS") {
            self.booking.booking_window_days = parse_int("DEFAULT_BOOKING_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = lookup("SALON_UTC_OFFSET_MINUTES") {
            self.booking.utc_offset_minutes = parse_int("SALON_UTC_OFFSET_MINUTES", &value)?;
        }
        Ok(())
    }
}

fn parse_int(key: &str, value: &str) -> Result<i32> {
    value.trim().parse().map_err(|e| Error::Config {
        message: format!("{key} must be an integer, got {value:?}: {e}"),
    })
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the full application configuration.
///
/// Reads the file named by `SALON_CONFIG` (default `./config.toml`) when it exists, then
/// applies environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("SALON_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    let mut config = if Path::new(&path).exists() {
        info!("Loading configuration from {}", path);
        load_config(&path)?
    } else {
        debug!("No configuration file at {}, using defaults", path);
        AppConfig::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}
