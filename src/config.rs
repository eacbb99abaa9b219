use std::env;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_SEARCH_RADII_KM: [f64; 5] = [1.0, 2.0, 3.0, 5.0, 10.0];
pub const DEFAULT_OFFER_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub order_queue_size: usize,
    pub event_buffer_size: usize,
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Policy knobs of a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Strictly ascending search radii in kilometers.
    pub search_radii_km: Vec<f64>,
    pub offer_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            search_radii_km: DEFAULT_SEARCH_RADII_KM.to_vec(),
            offer_timeout: Duration::from_secs(DEFAULT_OFFER_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let search_radii_km = match env::var("SEARCH_RADII_KM") {
            Ok(raw) => parse_radii(&raw)?,
            Err(_) => DEFAULT_SEARCH_RADII_KM.to_vec(),
        };
        let offer_timeout_secs: u64 =
            parse_or_default("OFFER_TIMEOUT_SECS", DEFAULT_OFFER_TIMEOUT_SECS)?;
        if offer_timeout_secs == 0 {
            return Err(AppError::Internal(
                "invalid OFFER_TIMEOUT_SECS: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Compact,
            },
            order_queue_size: parse_or_default("ORDER_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch: DispatchSettings {
                search_radii_km,
                offer_timeout: Duration::from_secs(offer_timeout_secs),
            },
        })
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

pub fn parse_radii(raw: &str) -> Result<Vec<f64>, AppError> {
    let radii = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|err| AppError::Internal(format!("invalid SEARCH_RADII_KM: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if radii.is_empty() {
        return Err(AppError::Internal(
            "invalid SEARCH_RADII_KM: at least one radius is required".to_string(),
        ));
    }
    if radii.iter().any(|r| !r.is_finite() || *r <= 0.0) {
        return Err(AppError::Internal(
            "invalid SEARCH_RADII_KM: radii must be positive".to_string(),
        ));
    }
    if radii.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(AppError::Internal(
            "invalid SEARCH_RADII_KM: radii must be strictly ascending".to_string(),
        ));
    }

    Ok(radii)
}
