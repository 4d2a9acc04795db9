use anyhow::{Context, Result};
use bitemporal_master::{IdStrategy, MasterConfig, MasterRegistry, SystemClock, web};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bitemporal-master")]
#[command(about = "Serves bitemporal document masters over HTTP")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// `sequential` or `uuid`
    #[arg(long, default_value = "sequential")]
    id_strategy: String,

    #[arg(long)]
    enforce_unique_keys: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let strategy: IdStrategy = cli.id_strategy.parse().context("invalid --id-strategy")?;
    let config = MasterConfig::default()
        .id_strategy(strategy)
        .enforce_unique_keys(cli.enforce_unique_keys);

    let registry = Arc::new(MasterRegistry::new(&config, Arc::new(SystemClock)).context("building masters")?);
    let app = web::router(Arc::clone(&registry));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving HTTP")?;

    registry.shutdown();
    Ok(())
}
