use anyhow::Result;
use clap::Parser;
use server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Root directory of the persisted index
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Records per shard directory; must match the ingestor
    #[arg(long, default_value_t = 1000)]
    shard_size: u64,
    /// Maximum recommendations returned per query
    #[arg(long, default_value_t = 3)]
    max_shown: usize,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let state = AppState {
        topics_dir: args.data_dir.join("topics"),
        specials_dir: args.data_dir.join("specials"),
        shard_size: args.shard_size,
        max_shown: args.max_shown,
    };
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
