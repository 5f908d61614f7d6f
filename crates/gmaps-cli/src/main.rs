mod scrape;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gmaps-cli")]
#[command(about = "Scrape Google Maps search results into JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search Maps and print place details as JSON
    Scrape {
        /// Search phrase, e.g. "Bäckerei in Köln"
        #[arg(long, short)]
        query: String,
        /// Stop after this many places
        #[arg(long)]
        max_places: Option<usize>,
        /// Interface language tag (e.g. de, en-GB)
        #[arg(long)]
        lang: Option<String>,
        /// Show the browser window instead of running headless
        #[arg(long)]
        headed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = gmaps_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scrape {
            query,
            max_places,
            lang,
            headed,
        } => {
            let request = gmaps_core::ScrapeRequest {
                query,
                max_places,
                lang,
                headless: !headed,
            };
            scrape::run(&config, &request).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
