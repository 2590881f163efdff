use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gcp_auth::TokenProvider;
use secret_store::GoogleSecretManagerFactory;

use rotation_worker::config::WorkerConfig;
use rotation_worker::constants::{ENV, LOCAL_ENV, SERVICE};
use rotation_worker::handlers::gandi::GandiConfig;
use rotation_worker::handlers::StaticRegistry;
use rotation_worker::metrics::RotationMetrics;
use rotation_worker::pipeline::RotationPipeline;
use rotation_worker::pubsub::Subscriber;
use rotation_worker::server;
use rotation_worker::shutdown::shutdown_signal_token;
use rotation_worker::worker::Worker;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Setup tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let env = std::env::var(ENV).unwrap_or_else(|_| LOCAL_ENV.to_string());

    let registry = tracing_subscriber::registry().with(filter);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);

    if env == LOCAL_ENV {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .pretty();
        registry.with(json_layer).with(pretty_layer).init();
    } else {
        registry.with(json_layer).init();
    }

    tracing::info!(service = SERVICE, env = %env, "tracing initialized");

    // Malformed or unreadable configuration is fatal at startup
    let config = WorkerConfig::load()?;
    tracing::info!(
        host = %config.host,
        project = %config.gcp_project_id,
        subscription = %config.pubsub_subscription,
        handler_label_key = %config.handler_label_key,
        max_concurrency = config.max_concurrency,
        pull_batch_size = config.pull_batch_size,
        "configuration loaded"
    );

    let auth = Arc::new(TokenProvider::from_env()?);
    let metrics = Arc::new(RotationMetrics::new());

    // One HTTP client shared by the provider handlers; each event still gets
    // its own handler instance and its own secret store client.
    let provider_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let handler_registry = Arc::new(StaticRegistry::new(provider_http, GandiConfig::from_env()));
    let store_factory = Arc::new(GoogleSecretManagerFactory::new(auth.clone()));

    let pipeline = Arc::new(RotationPipeline::new(
        store_factory,
        handler_registry,
        metrics.clone(),
        config.handler_label_key.clone(),
    ));

    let subscriber = Arc::new(Subscriber::new(auth, config.subscription_path())?);
    let worker = Worker::new(
        subscriber,
        pipeline,
        config.max_concurrency,
        config.pull_batch_size,
    );

    let shutdown = shutdown_signal_token();

    // Operational endpoints (liveness, readiness, metrics)
    let ops_host = config.host.clone();
    let ops_metrics = metrics.clone();
    let ops_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(&ops_host, ops_metrics, ops_shutdown.clone()).await {
            tracing::error!(error = %e, "operational server exited");
            ops_shutdown.cancel();
        }
    });

    tracing::info!(
        subscription = %config.subscription_path(),
        "listening for rotation notifications"
    );
    worker.run(shutdown).await?;

    tracing::info!("worker stopped");
    Ok(())
}
