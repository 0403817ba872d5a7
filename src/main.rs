mod cache;
mod config;
mod models;
mod normalize;
mod pipeline;
mod scraper;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::models::SourceKind;
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "vnfeed", about = "Vietnamese news & price ingestion pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Latest headlines for a configured news source
    Headlines {
        /// Source id (see `vnfeed sources`)
        #[arg(short, long, default_value = "dantri-world")]
        source: String,
    },

    /// Search headlines by free-text query
    Search { query: String },

    /// ~200-word plain-text summary of an article URL
    Summary { url: String },

    /// Normalized price table for a configured priced source
    Prices {
        /// Source id (see `vnfeed sources`)
        #[arg(short, long, default_value = "webgia-fuel")]
        source: String,

        /// Keep only records whose region contains this text
        #[arg(short, long)]
        region: Option<String>,
    },

    /// List configured sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "vnfeed=info,warn",
        1 => "vnfeed=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::new(config)?;

    match cli.command {
        Command::Headlines { source } => {
            let _t = utils::Stopwatch::for_command("headlines");
            let titles = pipeline.get_headlines(&source).await;
            println!("{}", serde_json::to_string_pretty(&titles)?);
        }

        Command::Search { query } => {
            let _t = utils::Stopwatch::for_command("search");
            let titles = pipeline.search_headlines(&query).await;
            println!("{}", serde_json::to_string_pretty(&titles)?);
        }

        Command::Summary { url } => {
            let _t = utils::Stopwatch::for_command("summary");
            println!("{}", pipeline.get_article_summary(&url).await);
        }

        Command::Prices { source, region } => {
            let _t = utils::Stopwatch::for_command("prices");
            let mut table = pipeline.get_priced_table(&source).await;
            if let Some(region) = region {
                table = table.retain_region(&region);
            }
            println!("{}", serde_json::to_string_pretty(&table)?);
        }

        Command::Sources => {
            println!("{} sources:", pipeline.sources().len());
            for s in pipeline.sources() {
                let kind = match s.kind {
                    SourceKind::HeadlineList => "headline-list",
                    SourceKind::PricedTable => "priced-table",
                    SourceKind::JsonApi => "json-api",
                };
                let cached = if s.cache { " [cached]" } else { "" };
                println!("  {:14} {:14} {}{}", s.id, kind, s.url, cached);
            }
        }
    }

    Ok(())
}
