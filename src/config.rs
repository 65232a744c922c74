use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub data_dir: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub flow: FlowSettings,
    pub pick_timeout: Duration,
    pub sweep_interval: Duration,
    pub event_buffer_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub gig_payment_delay: Duration,
    pub shop_payment_delay: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            gig_payment_delay: Duration::from_millis(1800),
            shop_payment_delay: Duration::from_millis(2000),
        }
    }
}

impl FlowSettings {
    pub fn instant() -> Self {
        Self {
            gig_payment_delay: Duration::ZERO,
            shop_payment_delay: Duration::ZERO,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact or json"
                )));
            }
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 8001)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            data_dir: lookup("DATA_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            cors_origins,
            flow: FlowSettings {
                gig_payment_delay: Duration::from_millis(parse_or_default(
                    &lookup,
                    "GIG_PAYMENT_DELAY_MS",
                    1800,
                )?),
                shop_payment_delay: Duration::from_millis(parse_or_default(
                    &lookup,
                    "SHOP_PAYMENT_DELAY_MS",
                    2000,
                )?),
            },
            pick_timeout: Duration::from_secs(parse_or_default(&lookup, "PICK_TIMEOUT_SECS", 120)?),
            sweep_interval: Duration::from_secs(parse_or_default(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                30,
            )?),
            event_buffer_size: parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 256)?,
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
