mod config;
mod db;
mod errors;
mod fanout;
mod handlers;
mod live;
mod metrics;
mod model;
mod mqtt;
mod payload;
mod rest;
mod router;
mod store;
mod validate;
mod ws;

use axum::{routing::get, Router};
use config::Config;
use handlers::Ingestor;
use live::LiveRegistry;
use router::MessageRouter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();

    info!("Starting tracker");
    info!("MQTT broker: {}:{}", config.mqtt_broker, config.mqtt_port);
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.database_host());

    if let Err(e) = metrics::init_metrics() {
        error!("Failed to register metrics: {}", e);
        std::process::exit(1);
    }

    let pool = match db::make_pool(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(db::PgStore::new(pool));

    info!(
        "Inbound queue: {}, event queue: {}, live client buffer: {}",
        config.inbound_queue_capacity, config.event_queue_capacity, config.live_client_buffer
    );
    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_capacity);
    let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity);

    let registry = Arc::new(LiveRegistry::new());
    let fanout_handle = tokio::spawn(fanout::run_fanout(event_rx, registry.clone()));

    let (client, eventloop) = mqtt::connect(&config);
    let mqtt_handle = tokio::spawn(mqtt::run_mqtt(eventloop, client.clone(), inbound_tx));

    let ingestor = Ingestor::new(store.clone(), store.clone(), event_tx);
    let message_router = MessageRouter::new(ingestor, Arc::new(client.clone()));
    let dispatcher_handle = tokio::spawn(router::run_dispatcher(inbound_rx, message_router));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(rest::AppState {
            devices: store.clone(),
            telemetry: store,
        }))
        .merge(ws::create_router(registry, config.live_client_buffer));

    let listener = match tokio::net::TcpListener::bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = mqtt_handle => {
            error!("MQTT task terminated");
        }
        _ = dispatcher_handle => {
            error!("Dispatcher task terminated");
        }
        _ = fanout_handle => {
            error!("Fan-out task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if let Err(e) = client.disconnect().await {
        error!("Failed to disconnect from MQTT broker: {}", e);
    }
    info!("Shutting down");
}

async fn metrics_handler() -> Result<String, rest::AppError> {
    Ok(metrics::gather_metrics()?)
}
