//! Endpoint Sync Handler binary - handles one lifecycle event or consumes a stream of them

use anyhow::{bail, Context};
use endpoint_sync_handler::accelerator::build_http_client;
use endpoint_sync_handler::config::Mode;
use endpoint_sync_handler::{
    Cli, Config, DryRunEndpointGroupClient, EndpointGroupClient, EventDispatcher,
    HttpEndpointGroupClient, HttpLifecycleClient, LifecycleClient, LifecycleEventConsumer,
    LogOnlyLifecycleClient, Metrics, ReconciliationController,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_json: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_cli();
    init_tracing(cli.config.log_json);

    let config = &cli.config;
    info!("Starting Endpoint Sync Handler");
    info!("Configuration:");
    info!("  Endpoint group: {}", config.endpoint_group_arn);
    info!("  Accelerator endpoint: {}", config.accelerator_endpoint);
    info!("  Dry-run: {}", config.dry_run);

    let metrics = Metrics;
    let dispatcher = build_dispatcher(config, metrics.clone())?;

    match cli.mode {
        Mode::Handle { event } => handle_one(&dispatcher, event).await,
        Mode::Consume(consumer_config) => {
            let consumer = LifecycleEventConsumer::new(consumer_config, dispatcher, metrics);
            match consumer.run().await {
                Ok(()) => {
                    info!("Lifecycle event consumer exited normally");
                    Ok(())
                }
                Err(e) => {
                    error!("Lifecycle event consumer failed: {}", e);
                    Err(e)
                }
            }
        }
    }
}

/// Wire the controller to its collaborators based on configuration
fn build_dispatcher(config: &Config, metrics: Metrics) -> anyhow::Result<EventDispatcher> {
    let reconciliation = config.reconciliation();
    info!(
        endpoint_weight = reconciliation.endpoint_weight,
        client_ip_preservation = reconciliation.client_ip_preservation,
        "Reconciliation settings"
    );

    let http = build_http_client(config.request_timeout_secs)?;
    let accelerator =
        HttpEndpointGroupClient::with_client(config.accelerator_endpoint.clone(), http.clone());
    let endpoint_groups: Arc<dyn EndpointGroupClient> = if config.dry_run {
        info!("Using dry-run endpoint group client");
        Arc::new(DryRunEndpointGroupClient::new(accelerator))
    } else {
        Arc::new(accelerator)
    };

    let lifecycle: Arc<dyn LifecycleClient> = match &config.autoscaling_endpoint {
        Some(endpoint) if config.has_autoscaling_endpoint() => {
            info!("Using HTTP lifecycle client with endpoint: {}", endpoint);
            Arc::new(HttpLifecycleClient::with_client(endpoint.clone(), http))
        }
        _ => {
            info!("Using log-only lifecycle client");
            Arc::new(LogOnlyLifecycleClient)
        }
    };

    let controller = ReconciliationController::new(
        Arc::new(reconciliation),
        endpoint_groups,
        lifecycle,
        metrics.clone(),
    );
    Ok(EventDispatcher::new(controller, metrics))
}

/// Handle one envelope from a file or stdin
async fn handle_one(dispatcher: &EventDispatcher, event: Option<PathBuf>) -> anyhow::Result<()> {
    let payload = match &event {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read event from stdin")?;
            buf
        }
    };

    let dispatch = dispatcher.dispatch_bytes(&payload).await;
    if !dispatch.is_success() {
        bail!("Event was not reconciled");
    }

    info!("Event handled");
    Ok(())
}
