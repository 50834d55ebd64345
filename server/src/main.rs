use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use jewel_search::SearchEngine;
use jewel_server::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind,
        static_dir = %config.static_dir().display(),
        embedding_url = %config.search.oracle.embedding_url,
        "Starting jewel-server"
    );

    let builder = SearchEngine::builder(config.search.clone());
    jewel_server::run(config, builder).await?;
    Ok(())
}
