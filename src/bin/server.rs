use log::{error, info, warn};
use std::net::SocketAddr;

use cocampus_auth::config::ServerConfig;
use cocampus_auth::core::server::AppState;
use cocampus_auth::handlers::api_routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Load config from environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, api=/api/{}, access_ttl={:?}, refresh_ttl={:?}",
        config.host, config.port, config.api_version, config.access_token_ttl, config.refresh_token_ttl
    );
    if config.development_mode {
        warn!("Development mode is on: error responses include internal detail");
    }

    let state = match AppState::in_memory(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };
    warn!("Using in-memory stores; all accounts are lost on restart");

    let routes = api_routes(state);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting CoCampus auth server on {}", addr);
    warp::serve(routes).run(addr).await;
}
