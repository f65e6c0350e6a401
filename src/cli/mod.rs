// src/cli/mod.rs — CLI definition (clap derive)

pub mod components;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Quota-aware catalog discovery and detail harvester",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover items per category, fetch details, persist results
    Run {
        /// JSON file with the discovery filter (defaults to an empty filter)
        #[arg(long)]
        filter: Option<PathBuf>,
        /// Category to scan; repeatable. Defaults to pipeline.categories
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Discovery page size (defaults to pipeline.discovery_page_size)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Fetch details for specific item keys
    Product {
        #[arg(required = true)]
        asins: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_categories() {
        let cli = Cli::try_parse_from([
            "harvester",
            "run",
            "--category",
            "1055398",
            "--category",
            "3760901",
            "--page-size",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                filter,
                categories,
                page_size,
            } => {
                assert!(filter.is_none());
                assert_eq!(categories, vec!["1055398", "3760901"]);
                assert_eq!(page_size, Some(20));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_product_requires_asin() {
        assert!(Cli::try_parse_from(["harvester", "product"]).is_err());
        let cli = Cli::try_parse_from(["harvester", "--config", "h.toml", "product", "B01", "B02"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("h.toml")));
        assert!(matches!(cli.command, Commands::Product { ref asins } if asins.len() == 2));
    }
}
