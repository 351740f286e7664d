mod command;
mod config;
mod cooldown;
mod dice;
mod dispatcher;
mod error;
mod handlers;
mod llm;
mod load_balancer;
mod metrics;
mod models;
mod onebot;
mod relay;
mod responder;
mod state;
#[cfg(test)]
mod testing;
mod worker;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, PokeConfig, Settings};
use crate::dice::Dice;
use crate::dispatcher::Dispatcher;
use crate::handlers::{event_handler, health_handler, metrics_handler};
use crate::llm::{Completion, OllamaClient};
use crate::load_balancer::{LoadBalancer, health_checker};
use crate::onebot::{ChatApi, OneBotClient};
use crate::relay::Relay;
use crate::state::AppState;
use crate::worker::event_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();

    let poke_config = PokeConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    let settings = Arc::new(Settings::from_config(poke_config));

    if let Err(e) = tokio::fs::create_dir_all(&settings.gallery_path).await {
        warn!("Could not create gallery {}: {}", settings.gallery_path.display(), e);
    }

    let client = reqwest::Client::new();
    let load_balancer = Arc::new(LoadBalancer::new(&args.backends)?);
    let api: Arc<dyn ChatApi> = Arc::new(OneBotClient::new(
        client.clone(),
        &args.onebot_api,
        args.access_token.clone(),
    ));
    let llm: Arc<dyn Completion> = Arc::new(OllamaClient::new(
        client.clone(),
        load_balancer.clone(),
        &args.model,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        settings.clone(),
        api,
        llm,
        Arc::new(Dice::from_os_rng()),
    )?);
    let relay = Arc::new(Relay::new(client.clone(), &args.forward_urls));

    // spawn the background tasks
    tokio::spawn(health_checker(
        load_balancer.clone(),
        client.clone(),
        Duration::from_secs(args.health_interval.max(1)),
    ));

    let (event_tx, event_rx) = mpsc::channel::<Value>(args.queue_size.max(1));
    tokio::spawn(event_worker(
        event_rx,
        event_tx.downgrade(),
        dispatcher.clone(),
        relay.clone(),
    ));

    let state = Arc::new(AppState {
        event_tx,
        dispatcher,
        load_balancer,
        relay,
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("pokepro listening on http://localhost:{}/onebot", args.port);
    info!("OneBot API at {}", args.onebot_api);
    info!("Response weights: {:?}", settings.weights);
    info!("Cooldown: {:?}, follow-poke probability: {}", settings.cooldown, settings.follow_poke_prob);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(event_handler))
        .route("/onebot", post(event_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
