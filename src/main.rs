// src/main.rs — harvester entry point

use clap::Parser;

use catalog_harvester::cli::{self, Cli, Commands};
use catalog_harvester::infra::config::Config;
use catalog_harvester::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / HARVESTER_LOG)
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            filter,
            categories,
            page_size,
        } => cli::run::run_harvest(&config, filter.as_deref(), categories, page_size).await,
        Commands::Product { asins } => cli::run::run_products(&config, &asins).await,
        Commands::Config => cli::run::show_config(&config),
    }
}
