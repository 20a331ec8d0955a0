use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stream_gateway::aggregator::AggregationEngine;
use stream_gateway::api::{ApiServer, AppState, TrustedProxies};
use stream_gateway::auth::{AuthService, LoginAttemptGovernor};
use stream_gateway::config::GatewayConfig;
use stream_gateway::logging;
use stream_gateway::metrics::MetricsCollector;
use stream_gateway::resolver::TmdbResolver;
use stream_providers::provider::create_client_builder;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let (config, source) = GatewayConfig::load().context("failed to load configuration")?;

    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;
    tracing::info!(%source, "Configuration loaded");

    let cancel_token = CancellationToken::new();
    if let Some(dir) = &config.log_dir {
        logging::start_retention_cleanup(dir.clone(), cancel_token.clone());
    }

    let registry = config.build_registry()?;
    if registry.is_empty() {
        tracing::warn!("No providers configured; every lookup will be empty");
    }

    let resolver_client = create_client_builder(Some(config.provider_timeout())).build()?;
    let resolver = TmdbResolver::new(resolver_client, config.tmdb.clone());

    let engine = AggregationEngine::new(
        Arc::new(registry),
        Arc::new(resolver),
        Arc::new(MetricsCollector::new()),
    )
    .with_default_providers(config.default_providers.clone())
    .with_filters(config.filters.clone())
    .with_relay(config.relay.clone());

    let governor = Arc::new(LoginAttemptGovernor::new());
    governor.start_purge_task(cancel_token.clone());

    let auth = AuthService::from_config(&config.auth, Arc::clone(&governor))?;
    if auth.session_required() {
        tracing::info!("Stream routes require a session");
    }
    auth.sessions()
        .start_purge_task(Duration::from_secs(300), cancel_token.clone());

    let trusted_proxies = TrustedProxies::parse(&config.server.trusted_proxies)?;
    if config.relay.enabled && config.relay.allow_private_targets {
        tracing::warn!("Relay may fetch loopback and private-network targets");
    }

    let state =
        AppState::new(Arc::new(engine), Arc::new(auth)).with_trusted_proxies(trusted_proxies);
    let server = ApiServer::new(config.server.clone(), state).with_cancel_token(cancel_token.clone());

    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stream-gateway starting");
    server.run().await?;

    cancel_token.cancel();
    tracing::info!("stream-gateway stopped");
    Ok(())
}
