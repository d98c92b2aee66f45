use std::env;

use crate::error::AppError;
use crate::models::optimization::Tolerances;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    Haversine,
    Osrm,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "haversine" => Ok(ProviderKind::Haversine),
            "osrm" => Ok(ProviderKind::Osrm),
            other => Err(format!("unknown distance provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub distance_provider: ProviderKind,
    pub osrm_base_url: String,
    pub osrm_profile: String,
    pub provider_timeout_secs: u64,
    pub provider_max_attempts: u32,
    pub provider_backoff_base_ms: u64,
    pub haversine_speed_kmh: f64,
    pub haversine_road_coefficient: f64,
    pub tolerances: Tolerances,
    pub reoptimize_threshold_minutes: i64,
    pub deviation_sweep_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            distance_provider: ProviderKind::Haversine,
            osrm_base_url: "http://localhost:5000".to_string(),
            osrm_profile: "car".to_string(),
            provider_timeout_secs: 10,
            provider_max_attempts: 3,
            provider_backoff_base_ms: 2000,
            haversine_speed_kmh: 40.0,
            haversine_road_coefficient: 1.3,
            tolerances: Tolerances::default(),
            reoptimize_threshold_minutes: 30,
            deviation_sweep_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            distance_provider: parse_or_default("DISTANCE_PROVIDER", defaults.distance_provider)?,
            osrm_base_url: env::var("OSRM_BASE_URL").unwrap_or(defaults.osrm_base_url),
            osrm_profile: env::var("OSRM_PROFILE").unwrap_or(defaults.osrm_profile),
            provider_timeout_secs: parse_or_default(
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
            provider_max_attempts: parse_or_default(
                "PROVIDER_MAX_ATTEMPTS",
                defaults.provider_max_attempts,
            )?,
            provider_backoff_base_ms: parse_or_default(
                "PROVIDER_BACKOFF_BASE_MS",
                defaults.provider_backoff_base_ms,
            )?,
            haversine_speed_kmh: parse_or_default("HAVERSINE_SPEED_KMH", defaults.haversine_speed_kmh)?,
            haversine_road_coefficient: parse_or_default(
                "HAVERSINE_ROAD_COEFFICIENT",
                defaults.haversine_road_coefficient,
            )?,
            tolerances: Tolerances {
                high: parse_or_default("TOLERANCE_HIGH_MINUTES", defaults.tolerances.high)?,
                normal: parse_or_default("TOLERANCE_NORMAL_MINUTES", defaults.tolerances.normal)?,
                low: parse_or_default("TOLERANCE_LOW_MINUTES", defaults.tolerances.low)?,
            },
            reoptimize_threshold_minutes: parse_or_default(
                "REOPTIMIZE_THRESHOLD_MINUTES",
                defaults.reoptimize_threshold_minutes,
            )?,
            deviation_sweep_secs: parse_or_default("DEVIATION_SWEEP_SECS", defaults.deviation_sweep_secs)?,
        };
        config.tolerances.validate()?;

        Ok(config)
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

#[cfg(test)]
mod tests {
    use super::ProviderKind;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OSRM".parse::<ProviderKind>(), Ok(ProviderKind::Osrm));
        assert_eq!(" haversine ".parse::<ProviderKind>(), Ok(ProviderKind::Haversine));
        assert!("google".parse::<ProviderKind>().is_err());
    }
}
