//! Process configuration from environment variables.

use std::time::Duration;

use tracing::warn;

use notifier_core::{Error, Result};

/// What this service is, for probes and startup logs.
pub const APP_DESCRIPTION: &str =
    "Entrypoint for concept publish notifications from the Smartlogic Semaphore system";

const DEFAULT_SMARTLOGIC_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HEALTH_CACHE_TIME: Duration = Duration::from_secs(60);

/// Full runtime configuration.
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | `APP_SYSTEM_CODE` | `smartlogic-notifier` | identity for probes |
/// | `APP_NAME` | `Smartlogic Notifier` | display name |
/// | `APP_PORT` | `8080` | TCP listen port |
/// | `LOG_LEVEL` | `info` | log verbosity |
/// | `KAFKA_ADDRESSES` | `localhost:9092` | comma-separated broker list |
/// | `KAFKA_TOPIC` | `SmartlogicConcept` | publish topic |
/// | `SMARTLOGIC_BASE_URL` | required | Smartlogic base URL |
/// | `SMARTLOGIC_MODEL` | required | taxonomy model name |
/// | `SMARTLOGIC_API_KEY` | required | credential |
/// | `SMARTLOGIC_TIMEOUT` | `30s` | per-request timeout |
/// | `SMARTLOGIC_HEALTHCHECK_CONCEPT` | required | sentinel concept id |
/// | `CONCEPT_URI_PREFIX` | `http://www.ft.com/thing/` | IRI prefix for fetches |
/// | `HEALTHCHECK_SUCCESS_CACHE_TIME` | `1m` | health refresh period |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_system_code: String,
    pub app_name: String,
    pub port: u16,
    pub log_level: String,
    pub kafka_addresses: String,
    pub kafka_topic: String,
    pub smartlogic_base_url: String,
    pub smartlogic_model: String,
    pub smartlogic_api_key: String,
    pub smartlogic_timeout: Duration,
    pub smartlogic_healthcheck_concept: String,
    pub concept_uri_prefix: String,
    pub health_cache_time: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup, so tests can inject variables
    /// without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = optional(&lookup, "APP_PORT", "8080")
            .parse::<u16>()
            .map_err(|_| Error::Config("APP_PORT must be a port number".to_string()))?;

        Ok(Self {
            app_system_code: optional(&lookup, "APP_SYSTEM_CODE", "smartlogic-notifier"),
            app_name: optional(&lookup, "APP_NAME", "Smartlogic Notifier"),
            port,
            log_level: optional(&lookup, "LOG_LEVEL", "info"),
            kafka_addresses: optional(&lookup, "KAFKA_ADDRESSES", "localhost:9092"),
            kafka_topic: optional(&lookup, "KAFKA_TOPIC", "SmartlogicConcept"),
            smartlogic_base_url: required(&lookup, "SMARTLOGIC_BASE_URL")?,
            smartlogic_model: required(&lookup, "SMARTLOGIC_MODEL")?,
            smartlogic_api_key: required(&lookup, "SMARTLOGIC_API_KEY")?,
            smartlogic_timeout: duration(
                &lookup,
                "SMARTLOGIC_TIMEOUT",
                DEFAULT_SMARTLOGIC_TIMEOUT,
            ),
            smartlogic_healthcheck_concept: required(&lookup, "SMARTLOGIC_HEALTHCHECK_CONCEPT")?,
            concept_uri_prefix: optional(&lookup, "CONCEPT_URI_PREFIX", "http://www.ft.com/thing/"),
            health_cache_time: duration(
                &lookup,
                "HEALTHCHECK_SUCCESS_CACHE_TIME",
                DEFAULT_HEALTH_CACHE_TIME,
            ),
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} is required", name)))
}

fn duration(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Duration {
    match lookup(name).filter(|v| !v.is_empty()) {
        Some(value) => match humantime::parse_duration(&value) {
            Ok(d) => d,
            Err(_) => {
                warn!("Duration {} for {} could not be parsed", value, name);
                default
            }
        },
        None => default,
    }
}
