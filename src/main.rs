use std::net::SocketAddr;

use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod health;
mod metrics;
mod projects;
mod state;
mod store;
mod users;

#[cfg(test)]
mod test_support;

use crate::config::AppConfig;
use crate::state::AppState;

fn load_env_file() {
    match std::env::var("HACKHUB_CONFIG") {
        Ok(path) => {
            if let Err(e) = dotenvy::from_filename(&path) {
                eprintln!("could not read config file {path}: {e}");
            }
        }
        Err(_) => {
            dotenvy::dotenv().ok();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "hackhub=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("invalid configuration")?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid APP_HOST/APP_PORT")?;

    let metrics = crate::metrics::init_metrics()?;
    let state = AppState::init(config, metrics)
        .await
        .context("failed to initialise the store")?;

    app::serve(app::build_app(state), addr).await
}
