//! Cached upstream health plus live bus connectivity.
//!
//! Probe endpoints never talk to Smartlogic directly: a background loop
//! fetches a sentinel concept on a fixed cadence and caches the outcome.
//! The Kafka check is live on every probe; the producer's metadata probe is
//! cheap enough that caching it buys nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::error;

use notifier_core::{Error, Result};

use super::notifier::ConceptNotifier;

const BUSINESS_IMPACT: &str =
    "Editorial updates of concepts in Smartlogic will not be ingested into UPP";
const PANIC_GUIDE_URL: &str = "https://runbooks.in.ft.com/smartlogic-notifier";

const SMARTLOGIC_CHECK_FAILED: &str = "latest Smartlogic connectivity check is unsuccessful";

/// Identity and cadence of the health surface.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub app_system_code: String,
    pub app_name: String,
    pub description: String,
    pub smartlogic_model: String,
    pub smartlogic_model_concept: String,
    pub success_cache_time: Duration,
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.app_system_code.is_empty() {
            return Err(Error::Config("property app_system_code is required".into()));
        }
        if self.app_name.is_empty() {
            return Err(Error::Config("property app_name is required".into()));
        }
        if self.description.is_empty() {
            return Err(Error::Config("property description is required".into()));
        }
        if self.smartlogic_model.is_empty() {
            return Err(Error::Config("property smartlogic_model is required".into()));
        }
        if self.smartlogic_model_concept.is_empty() {
            return Err(Error::Config(
                "property smartlogic_model_concept is required".into(),
            ));
        }
        if self.success_cache_time.is_zero() {
            return Err(Error::Config("property success_cache_time is required".into()));
        }
        Ok(())
    }
}

/// One check entry of the `__health` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    pub panic_guide: String,
    pub check_output: String,
    pub last_updated: String,
}

/// The `__health` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub schema_version: u8,
    pub system_code: String,
    pub name: String,
    pub description: String,
    pub checks: Vec<CheckResult>,
    pub ok: bool,
}

/// Serves gtg and health checks off the cached upstream flag.
pub struct HealthService {
    config: HealthConfig,
    notifier: Arc<dyn ConceptNotifier>,
    check_success_cache: RwLock<bool>,
}

impl HealthService {
    /// Validates the config; does not start the cache refresh loop.
    pub fn new(notifier: Arc<dyn ConceptNotifier>, config: HealthConfig) -> Result<Arc<Self>> {
        config
            .validate()
            .map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
        Ok(Arc::new(Self {
            config,
            notifier,
            check_success_cache: RwLock::new(false),
        }))
    }

    /// Start the background refresh: one check immediately, then one per
    /// cache period.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.config.success_cache_time);
            loop {
                interval.tick().await;
                if let Err(e) = service.update_smartlogic_success_cache().await {
                    error!(error = %e, "could not perform latest Smartlogic connectivity check");
                }
            }
        })
    }

    /// Fetch the sentinel concept and record the outcome.
    async fn update_smartlogic_success_cache(&self) -> Result<()> {
        match self
            .notifier
            .get_concept(&self.config.smartlogic_model_concept)
            .await
        {
            Ok(_) => {
                *self.check_success_cache.write().await = true;
                Ok(())
            }
            Err(e) => {
                error!(
                    uuid = %self.config.smartlogic_model_concept,
                    error = %e,
                    "health check concept couldn't be retrieved"
                );
                *self.check_success_cache.write().await = false;
                Err(e)
            }
        }
    }

    /// Cached Smartlogic check; never touches the network.
    async fn smartlogic_connectivity_check(&self) -> std::result::Result<String, String> {
        if *self.check_success_cache.read().await {
            Ok(String::new())
        } else {
            error!("{}", SMARTLOGIC_CHECK_FAILED);
            Err(SMARTLOGIC_CHECK_FAILED.to_string())
        }
    }

    /// Live Kafka check.
    async fn kafka_connectivity_check(&self) -> std::result::Result<String, String> {
        match self.notifier.check_kafka_connectivity().await {
            Ok(()) => Ok("Successfully connected to Kafka".to_string()),
            Err(e) => {
                error!(error = %e, "Error verifying open connection to Kafka");
                Err("Error connecting with Kafka".to_string())
            }
        }
    }

    /// The `__health` document; always served with HTTP 200.
    pub async fn health_report(&self) -> HealthReport {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let kafka = self.kafka_connectivity_check().await;
        let smartlogic = self.smartlogic_connectivity_check().await;

        let checks = vec![
            CheckResult {
                name: "Check connectivity to Kafka".to_string(),
                ok: kafka.is_ok(),
                severity: 3,
                business_impact: BUSINESS_IMPACT.to_string(),
                technical_summary:
                    "Cannot connect to Kafka. Verify that Kafka is healthy in this cluster."
                        .to_string(),
                panic_guide: PANIC_GUIDE_URL.to_string(),
                check_output: kafka.clone().unwrap_or_else(|msg| msg),
                last_updated: now.clone(),
            },
            CheckResult {
                name: format!(
                    "Check connectivity to Smartlogic model {}",
                    self.config.smartlogic_model
                ),
                ok: smartlogic.is_ok(),
                severity: 3,
                business_impact: BUSINESS_IMPACT.to_string(),
                technical_summary:
                    "Check that Smartlogic is healthy and the API is accessible. If it is, restart this service."
                        .to_string(),
                panic_guide: PANIC_GUIDE_URL.to_string(),
                check_output: smartlogic.clone().unwrap_or_else(|msg| msg),
                last_updated: now,
            },
        ];

        HealthReport {
            schema_version: 1,
            system_code: self.config.app_system_code.clone(),
            name: self.config.app_name.clone(),
            description: self.config.description.clone(),
            ok: checks.iter().all(|c| c.ok),
            checks,
        }
    }

    /// Good-to-go: every check must pass; the first failure's message is
    /// the 503 body.
    pub async fn gtg(&self) -> std::result::Result<(), String> {
        self.kafka_connectivity_check().await.map(|_| ())?;
        self.smartlogic_connectivity_check().await.map(|_| ())
    }
}
