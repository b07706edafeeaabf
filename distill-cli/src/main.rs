mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use distill::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "distill")]
#[command(about = "Distill CLI - search many collections with one query")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.distill/config.toml)
    #[arg(short, long, global = true, env = "DISTILL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a query and print its structure
    Parse {
        /// Raw query string
        query: String,

        /// Also show fieldsets and backend queries for each selected collection
        #[arg(long)]
        explain: bool,
    },

    /// List registered collections
    Collections,

    /// Search every matching collection
    Search {
        /// Raw query string
        query: String,

        /// Page number (1-based)
        #[arg(long)]
        page: Option<usize>,

        /// Results per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Print Prometheus metrics for the search to stderr
        #[arg(long)]
        metrics: bool,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f == "json")
        .unwrap_or(config.logging.format == "json");

    // Logs go to stderr so stdout stays valid JSON
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_create(&config_path)?;
    init_logging(&config);
    tracing::debug!("Using config {}", config_path.display());

    match cli.command {
        Commands::Parse { query, explain } => {
            commands::run_parse(&config, &query, explain).await?;
        }
        Commands::Collections => {
            commands::run_collections(&config)?;
        }
        Commands::Search {
            query,
            page,
            page_size,
            metrics,
        } => {
            commands::run_search(&config, &query, page, page_size, metrics).await?;
        }
    }

    Ok(())
}
