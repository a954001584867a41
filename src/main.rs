use clap::Parser;
use tracing_subscriber::EnvFilter;

use sora_sync::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match sora_sync::run(cli).await {
        Ok(_) => std::process::exit(0),
        Err(_) => std::process::exit(1),
    }
}
