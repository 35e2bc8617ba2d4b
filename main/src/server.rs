use std::sync::Arc;

use anyhow::Context;
use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::utils::{
    config::get_config,
    secrets::{EnvSecrets, SecretSource},
};
use retrieval_pipeline::{AgentHandle, DefaultAgentFactory};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Get config
    let config = get_config()?;

    // Set up tracing
    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init()
        .ok();

    // Missing credentials are fatal before the port opens
    config.validate_for_server()?;

    let secrets: Arc<dyn SecretSource> = Arc::new(EnvSecrets::from_config(&config));
    let agent = Arc::new(AgentHandle::new(Arc::new(DefaultAgentFactory::new(
        config.clone(),
        Arc::clone(&secrets),
    ))));

    // Build the agent up front so a bad collection or key stops start-up
    agent
        .get_or_init()
        .await
        .context("initializing agent at start-up")?;

    let api_state = ApiState::new(&config, secrets.as_ref(), agent).await?;

    // Create Axum router
    let app = Router::new()
        .merge(api_routes(&api_state))
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let serve_address = format!("{}:{}", config.http_host, config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(&serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
