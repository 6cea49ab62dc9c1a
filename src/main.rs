use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use linkpulse::analytics::{sample, EventStore, IngestService};
use linkpulse::api;
use linkpulse::config::Config;
use linkpulse::cursor::CursorSigner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Seed the event store
    let now = Utc::now();
    let mut store = EventStore::new();
    if config.sample.seed_events {
        for event in sample::seed_events(now) {
            store.log_event(event);
        }
    }
    if config.sample.synthetic_events > 0 {
        let span = Duration::days(config.sample.span_days);
        for event in sample::synthesize(config.sample.synthetic_events, now, span) {
            store.log_event(event);
        }
    }
    info!("Event store seeded with {} events", store.len());

    let ingest = IngestService::spawn(store, config.ingest.buffer_size);
    let cursors = CursorSigner::new(config.pagination.cursor_hmac_secret.as_deref());

    let api_router = api::create_api_router(ingest.clone(), cursors);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - Metrics available at http://{}/api/metrics", api_addr);

    axum::serve(api_listener, api_router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    ingest.shutdown().await;

    Ok(())
}
