use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.mmr-development.dk/v1/";
pub const DEFAULT_WS_BASE_URL: &str = "wss://api.mmr-development.dk/";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub default_min_prep_minutes: u32,
    pub live_poll_secs: u64,
    pub fallback_poll_secs: u64,
    pub store_path: PathBuf,
    pub country: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: 15,
            default_min_prep_minutes: 30,
            live_poll_secs: 60,
            fallback_poll_secs: 30,
            store_path: PathBuf::from("delivery-client.json"),
            country: "Denmark".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            ws_base_url: env::var("WS_BASE_URL").unwrap_or(defaults.ws_base_url),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            request_timeout_secs: parse_or_default(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            default_min_prep_minutes: parse_or_default(
                "DEFAULT_MIN_PREP_MINUTES",
                defaults.default_min_prep_minutes,
            )?,
            live_poll_secs: parse_or_default("LIVE_POLL_SECS", defaults.live_poll_secs)?,
            fallback_poll_secs: parse_or_default("FALLBACK_POLL_SECS", defaults.fallback_poll_secs)?,
            store_path: env::var("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            country: env::var("COUNTRY").unwrap_or(defaults.country),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn live_poll_interval(&self) -> Duration {
        Duration::from_secs(self.live_poll_secs)
    }

    pub fn fallback_poll_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_secs)
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
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
