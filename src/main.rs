mod config;
mod error;
mod game;
mod network;
mod protocol;
mod session;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use session::registry::SessionRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let registry = SessionRegistry::new(config.rules.clone());

    let http = match TcpListener::bind(&config.http_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP API on {}: {}", config.http_addr, e);
            return;
        }
    };
    let ws = match TcpListener::bind(&config.ws_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind game server on {}: {}", config.ws_addr, e);
            return;
        }
    };

    info!("Game server listening on ws://{}/ws/{{code}}", config.ws_addr);
    tokio::spawn(network::http_api::serve(http, registry.clone()));
    network::server::serve(ws, registry).await;
}
