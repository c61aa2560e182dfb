//! TeaserCrawl: polite shallow crawler publishing page teasers to a search index

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use teasercrawl::{
    config::{CrawlerConfig, LogFormat, LoggingConfig},
    index::{JsonLinesIndex, TeaserIndex},
    scraping::ScrapingCoordinator,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "teasercrawl")]
#[command(about = "Crawl a site's start pages and index page teasers")]
#[command(version)]
struct Cli {
    /// Site configuration file
    #[arg(short, long, default_value = "site.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl for the configured site
    Crawl {
        /// Write indexed documents as JSON lines to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CrawlerConfig::load(&cli.config)?;
    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Crawl { output } => crawl(config, output).await,
        Commands::CheckConfig => check_config(&config),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Logs go to stderr so stdout stays free for documents.
fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.raised_by(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

async fn crawl(config: CrawlerConfig, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            info!("Writing documents to {}", path.display());
            run_with_index(config, JsonLinesIndex::new(BufWriter::new(file))).await
        }
        None => run_with_index(config, JsonLinesIndex::new(std::io::stdout())).await,
    }
}

async fn run_with_index<W>(config: CrawlerConfig, index: JsonLinesIndex<W>) -> Result<()>
where
    W: Write + Send + 'static,
{
    let index: Arc<dyn TeaserIndex> = Arc::new(index);
    let coordinator = ScrapingCoordinator::with_reqwest(config, index)?;
    let summary = coordinator.run_site().await?;

    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn check_config(config: &CrawlerConfig) -> Result<()> {
    println!("Configuration OK");
    println!("  Site: {}", config.site_id);
    for start in &config.start_points {
        println!("  Start point: {} (depth {})", start.url, start.extraction_depth);
    }
    println!("  Max teasers: {}", config.max_teaser);
    println!("  Concurrency per host: {}", config.concurrency_per_host);
    println!(
        "  Robots.txt: {}",
        if config.respect_robots_txt {
            config.robots_url.as_deref().unwrap_or("no robots URL configured")
        } else {
            "ignored"
        }
    );
    println!("  Scoring: {}", if config.scoring.enabled { "enabled" } else { "disabled" });
    Ok(())
}
