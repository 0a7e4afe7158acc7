use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use sitegen::cli::Args;
use sitegen::config::Config;
use sitegen::provider::{OllamaClient, Provider};
use sitegen::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    cfg.apply_env()?;
    args.apply(&mut cfg);
    cfg.validate()?;

    sitegen::log::init(cfg.debug);
    let cfg = Arc::new(cfg);

    let client = Arc::new(OllamaClient::new(cfg.clone())?);
    if cfg.mock {
        tracing::warn!("mock mode enabled, Ollama will not be contacted");
    } else if let Err(e) = client.initialize().await {
        tracing::error!("starting without a ready inference server: {}", e);
    }

    let listener = TcpListener::bind(cfg.bind_addr())
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr()))?;
    server::serve(listener, AppState::new(cfg.clone(), client)).await.context("server error")?;
    Ok(())
}
