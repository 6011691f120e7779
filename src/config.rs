use std::env;

use crate::error::AppError;
use crate::state::MatchingLimits;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub offer_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            default_radius_km: parse_or_default("DEFAULT_SEARCH_RADIUS_KM", 5.0)?,
            max_radius_km: parse_or_default("MAX_SEARCH_RADIUS_KM", 25.0)?,
            offer_timeout_secs: parse_or_default("OFFER_TIMEOUT_SECS", 30)?,
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 5)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        };

        if config.default_radius_km <= 0.0 || config.max_radius_km < config.default_radius_km {
            return Err(AppError::Internal(format!(
                "invalid search radii: default {} km, max {} km",
                config.default_radius_km, config.max_radius_km
            )));
        }

        Ok(config)
    }

    pub fn matching_limits(&self) -> MatchingLimits {
        MatchingLimits {
            default_radius_km: self.default_radius_km,
            max_radius_km: self.max_radius_km,
            offer_timeout_secs: self.offer_timeout_secs,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
