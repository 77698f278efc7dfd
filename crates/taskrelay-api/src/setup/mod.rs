//! Application setup and initialization
//!
//! All components are constructed here and handed their collaborators explicitly.
//! Startup order: validate config, install telemetry, build the transport, provision
//! the queue, then start the listener and build the router. The HTTP server is only
//! started by the caller once this returns, so no task is published into a queue that
//! provisioning has not seen yet.

pub mod routes;
pub mod server;
pub mod transport;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use taskrelay_core::{Config, Tracer, TransportKind};
use taskrelay_infra::TelemetryConfig;
use taskrelay_worker::{
    ListenerConfig, LoggingTaskHandler, MessageConsumer, QueueListener, QueueProvisioner,
    QueueTransport, TaskHandler, TaskPublisher,
};

/// A fully wired application, ready to serve.
pub struct App {
    pub state: Arc<AppState>,
    pub router: Router,
    pub listener: QueueListener,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    taskrelay_infra::init_telemetry(&TelemetryConfig::from(&config))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        queue = %config.queue_name,
        transport = %config.queue_transport,
        "Configuration loaded and validated successfully"
    );

    let transport = transport::setup_transport(&config).await?;

    build_app(
        config,
        transport,
        Tracer::default(),
        Arc::new(LoggingTaskHandler),
    )
    .await
}

/// Wire the pipeline around an already constructed transport.
///
/// Provisioning is awaited before the listener starts polling.
pub async fn build_app(
    config: Config,
    transport: Arc<dyn QueueTransport>,
    tracer: Tracer,
    handler: Arc<dyn TaskHandler>,
) -> Result<App> {
    let queue = config.queue_name.clone();

    // The in-memory transport has no external owner, so its queue is always provisioned.
    let provision =
        config.auto_create_queue() || config.queue_transport == TransportKind::Memory;
    let outcome = QueueProvisioner::new(transport.clone(), provision)
        .run(&queue)
        .await;
    tracing::info!(queue = %queue, outcome = %outcome, "Queue provisioning finished");

    let publisher = TaskPublisher::new(transport.clone(), tracer.clone(), queue.clone());
    let consumer = Arc::new(MessageConsumer::new(
        queue,
        tracer.clone(),
        config.trace_propagation,
        handler,
    ));
    let listener = QueueListener::start(
        transport.clone(),
        consumer,
        ListenerConfig::from(&config),
    );

    let state = Arc::new(AppState {
        config,
        tracer,
        publisher,
        transport,
    });

    let router = routes::setup_routes(state.clone());

    Ok(App {
        state,
        router,
        listener,
    })
}
