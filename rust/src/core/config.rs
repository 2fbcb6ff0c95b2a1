use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub(crate) const CONFIG_FILE_NAME: &str = "parley_config.json";
const API_URL_ENV: &str = "PARLEY_API_URL";
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

pub(crate) const DEFAULT_PRESENCE_REVALIDATE_SECS: u64 = 30;
pub(crate) const DEFAULT_ACTIVITY_DEBOUNCE_MS: u64 = 2_500;
pub(crate) const DEFAULT_ECHO_TTL_MS: u64 = 5_000;
pub(crate) const DEFAULT_READ_RECEIPT_DEBOUNCE_MS: u64 = 300;
pub(crate) const DEFAULT_TYPING_TTL_MS: u64 = 5_000;
pub(crate) const DEFAULT_HEARTBEAT_MAX_RETRIES: u32 = 2;
pub(crate) const DEFAULT_HEARTBEAT_RETRY_BASE_MS: u64 = 1_000;

/// Every timer knob is capped at one day. Larger values are clamped.
const MAX_TIMER_SECS: u64 = 24 * 60 * 60;
const MAX_TIMER_MS: u64 = MAX_TIMER_SECS * 1_000;
const MAX_HEARTBEAT_RETRIES: u32 = 10;

fn capped_ms(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default).min(MAX_TIMER_MS))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) api_base_url: Option<String>,
    pub(crate) presence_threshold_secs: Option<u64>,
    pub(crate) presence_revalidate_secs: Option<u64>,
    pub(crate) activity_debounce_ms: Option<u64>,
    pub(crate) echo_ttl_ms: Option<u64>,
    pub(crate) read_receipt_debounce_ms: Option<u64>,
    pub(crate) typing_ttl_ms: Option<u64>,
    pub(crate) heartbeat_max_retries: Option<u32>,
    pub(crate) heartbeat_retry_base_ms: Option<u64>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            AppConfig::default()
        }
    }
}

/// The config payload used when no config file exists.
pub(crate) fn default_app_config_json() -> String {
    let v = serde_json::json!({
        "api_base_url": DEFAULT_API_BASE_URL,
        "presence_threshold_secs": parley_sync::DEFAULT_PRESENCE_THRESHOLD_SECS,
        "presence_revalidate_secs": DEFAULT_PRESENCE_REVALIDATE_SECS,
        "activity_debounce_ms": DEFAULT_ACTIVITY_DEBOUNCE_MS,
        "echo_ttl_ms": DEFAULT_ECHO_TTL_MS,
        "read_receipt_debounce_ms": DEFAULT_READ_RECEIPT_DEBOUNCE_MS,
        "typing_ttl_ms": DEFAULT_TYPING_TTL_MS,
        "heartbeat_max_retries": DEFAULT_HEARTBEAT_MAX_RETRIES,
        "heartbeat_retry_base_ms": DEFAULT_HEARTBEAT_RETRY_BASE_MS,
    });
    serde_json::to_string_pretty(&v).unwrap_or_else(|_| "{}".to_string())
}

impl AppConfig {
    /// `PARLEY_API_URL` wins over the file.
    pub(crate) fn api_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.api_base_url
                    .as_ref()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub(crate) fn presence_threshold(&self) -> chrono::Duration {
        self.presence_threshold_secs
            .and_then(|s| i64::try_from(s.min(MAX_TIMER_SECS)).ok())
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(parley_sync::default_presence_threshold)
    }

    pub(crate) fn presence_revalidate(&self) -> Duration {
        Duration::from_secs(
            self.presence_revalidate_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_PRESENCE_REVALIDATE_SECS)
                .min(MAX_TIMER_SECS),
        )
    }

    pub(crate) fn activity_debounce(&self) -> Duration {
        capped_ms(self.activity_debounce_ms, DEFAULT_ACTIVITY_DEBOUNCE_MS)
    }

    pub(crate) fn echo_ttl(&self) -> Duration {
        capped_ms(self.echo_ttl_ms, DEFAULT_ECHO_TTL_MS)
    }

    pub(crate) fn read_receipt_debounce(&self) -> Duration {
        capped_ms(self.read_receipt_debounce_ms, DEFAULT_READ_RECEIPT_DEBOUNCE_MS)
    }

    pub(crate) fn typing_ttl(&self) -> Duration {
        capped_ms(self.typing_ttl_ms, DEFAULT_TYPING_TTL_MS)
    }

    pub(crate) fn heartbeat_retry(&self) -> super::presence::RetryPolicy {
        super::presence::RetryPolicy {
            max_retries: self
                .heartbeat_max_retries
                .unwrap_or(DEFAULT_HEARTBEAT_MAX_RETRIES)
                .min(MAX_HEARTBEAT_RETRIES),
            base_delay: capped_ms(self.heartbeat_retry_base_ms, DEFAULT_HEARTBEAT_RETRY_BASE_MS),
        }
    }
}
