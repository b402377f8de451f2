mod auth;
mod aws;
mod error;
mod http_client;
mod model;
mod platform;
mod store;
mod web;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use auth::FlowOrchestrator;
use auth::retry::BackoffPolicy;
use aws::{FederationService, RoleHistory};
use model::arg::Args;
use model::config::Config;
use platform::{BrowserNavigator, OsRandom};
use store::{FileStore, KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    // Build proxy configuration
    let proxy_config = config.proxy_url.as_ref().map(|url| {
        let mut proxy = http_client::ProxyConfig::new(url);
        if let (Some(username), Some(password)) = (&config.proxy_username, &config.proxy_password) {
            proxy = proxy.with_auth(username, password);
        }
        proxy
    });

    if proxy_config.is_some() {
        tracing::info!("HTTP proxy configured: {}", config.proxy_url.as_ref().unwrap());
    }

    let http = http_client::build_client(proxy_config.as_ref(), 30).unwrap_or_else(|e| {
        tracing::error!("Failed to build HTTP client: {}", e);
        std::process::exit(1);
    });

    // Open the durable store
    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        tracing::info!("Ephemeral mode: state is not persisted");
        Arc::new(MemoryStore::new())
    } else {
        let store_path = args.store.unwrap_or_else(|| config.store_path.clone());
        Arc::new(FileStore::open(&store_path).unwrap_or_else(|e| {
            tracing::error!("Failed to open store {}: {}", store_path, e);
            std::process::exit(1);
        }))
    };

    // Build the flow orchestrator and run discovery. Missing configuration
    // or unusable provider metadata is fatal here, before serving anything.
    let orchestrator = Arc::new(FlowOrchestrator::new(
        config.clone(),
        http.clone(),
        store.clone(),
        Arc::new(OsRandom),
        Arc::new(BrowserNavigator),
    ));
    orchestrator.initialize().await.unwrap_or_else(|e| {
        tracing::error!("Initialization failed: {}", e);
        std::process::exit(1);
    });
    tracing::info!("Discovered OIDC endpoints for {}", config.authority);

    // AWS federation service with the shared role history
    let history = Arc::new(RoleHistory::new(store.clone(), config.history_max));
    let federation = Arc::new(FederationService::new(
        config.clone(),
        http.clone(),
        history,
    ));

    let refresh_policy = BackoffPolicy {
        max_attempts: config.refresh_max_attempts,
        base_delay: Duration::from_millis(config.refresh_base_delay_ms),
        ..BackoffPolicy::default()
    };

    let app = web::create_router(web::AppState {
        orchestrator: orchestrator.clone(),
        federation,
        refresh_policy,
    });

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting federation service: http://{}", addr);
    tracing::info!("Available APIs:");
    tracing::info!("  GET  /auth/login");
    tracing::info!("  GET  /auth/callback");
    tracing::info!("  GET  /auth/status");
    tracing::info!("  POST /auth/logout");
    tracing::info!("  POST /auth/refresh");
    tracing::info!("  POST /console/open");
    tracing::info!("  GET  /console/history");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    // With --open, hand the browser to the provider right away; the
    // callback lands on the server we are about to run.
    if args.open {
        if let Err(e) = orchestrator.login() {
            tracing::error!("Failed to start login flow: {}", e);
        }
    }

    axum::serve(listener, app).await.unwrap();
}
