//! smartlogic-notifier entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notifier_api::config::{AppConfig, APP_DESCRIPTION};
use notifier_api::handlers::{router, AppState};
use notifier_api::services::{
    coalescer, ConceptNotifier, HealthConfig, HealthService, IntervalTicker, NotifierService,
    DEFAULT_TICK_PERIOD,
};
use notifier_kafka::{KafkaConfig, KafkaProducer};
use notifier_smartlogic::{SmartlogicClient, SmartlogicConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_logging(&config.log_level);

    info!("[Startup] {} is starting", config.app_system_code);
    info!(
        "System code: {}, App Name: {}, Port: {}",
        config.app_system_code, config.app_name, config.port
    );

    let kafka = KafkaProducer::new(KafkaConfig {
        brokers: config.kafka_addresses.clone(),
        topic: config.kafka_topic.clone(),
    })
    .context("Error creating the Kafka producer")?;

    let smartlogic = SmartlogicClient::new(
        SmartlogicConfig::new(
            &config.smartlogic_base_url,
            &config.smartlogic_model,
            &config.smartlogic_api_key,
        )
        .with_concept_uri_prefix(&config.concept_uri_prefix)
        .with_timeout(config.smartlogic_timeout),
    )
    .await
    .context(
        "Error generating access token when connecting to Smartlogic. \
         If this continues to fail, please check the configuration.",
    )?;

    let notifier: Arc<dyn ConceptNotifier> =
        Arc::new(NotifierService::new(Arc::new(kafka), Arc::new(smartlogic)));

    let health = HealthService::new(
        notifier.clone(),
        HealthConfig {
            app_system_code: config.app_system_code.clone(),
            app_name: config.app_name.clone(),
            description: APP_DESCRIPTION.to_string(),
            smartlogic_model: config.smartlogic_model.clone(),
            smartlogic_model_concept: config.smartlogic_healthcheck_concept.clone(),
            success_cache_time: config.health_cache_time,
        },
    )?;
    info!(
        "Caching successful health for {}",
        humantime::format_duration(config.health_cache_time)
    );
    let health_task = health.start();

    let (dispatcher, dispatch_task) =
        coalescer::start(notifier.clone(), IntervalTicker::new(DEFAULT_TICK_PERIOD));

    let state = AppState {
        notifier,
        coalescer: dispatcher.clone(),
        health,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight notify cycle finish before exiting.
    dispatcher.shutdown().await;
    let _ = dispatch_task.await;
    health_task.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(configured: &str) {
    let level = configured.parse::<tracing::Level>().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            level.map(|l| l.to_string()).unwrap_or_else(|| "info".to_string()),
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if level.is_none() {
        warn!("Log level {} could not be parsed, defaulting to info", configured);
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    info!("Shutdown signal received");
}
