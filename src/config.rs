//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SETTLE_PERIOD_SECS` (optional): settlement cycle period, defaults to 5
/// - `SETTLE_INITIAL_DELAY_SECS` (optional): delay before the first cycle, defaults to 10
/// - `SETTLE_MAX_IN_FLIGHT` (optional): per-cycle concurrency cap, defaults to 16
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_settle_period_secs")]
    pub settle_period_secs: u64,

    #[serde(default = "default_settle_initial_delay_secs")]
    pub settle_initial_delay_secs: u64,

    #[serde(default = "default_settle_max_in_flight")]
    pub settle_max_in_flight: usize,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_settle_period_secs() -> u64 {
    5
}

fn default_settle_initial_delay_secs() -> u64 {
    10
}

fn default_settle_max_in_flight() -> usize {
    16
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_everything_but_the_database_url() {
        let config: Config = envy::from_iter(vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/settlement".to_string(),
        )])
        .unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.settle_period_secs, 5);
        assert_eq!(config.settle_initial_delay_secs, 10);
        assert_eq!(config.settle_max_in_flight, 16);
    }
}
