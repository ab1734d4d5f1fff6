use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::state::DispatchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub claim_radius_km: f64,
    pub proof_storage_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let claim_radius_km: f64 = parse_or_default("CLAIM_RADIUS_KM", 50.0)?;
        if !(claim_radius_km.is_finite() && claim_radius_km > 0.0) {
            return Err(AppError::Internal(format!(
                "invalid CLAIM_RADIUS_KM: {claim_radius_km} must be positive"
            )));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            claim_radius_km,
            proof_storage_dir: env::var("PROOF_STORAGE_DIR")
                .ok()
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            event_buffer_size: self.event_buffer_size,
            default_claim_radius_km: self.claim_radius_km,
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
