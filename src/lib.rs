pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod etl;
pub mod recommend;
pub mod scrape;
pub mod storage;
pub mod table;

use anyhow::{Context, Result};
use clap::Parser;
use clients::imdb::{ImdbClient, RetryPolicy};
pub use config::Config;
use etl::{MetadataEtl, ReviewsEtl};
use recommend::{FeatureMatrix, ItemKnnRecommender};
use scrape::DelayBounds;
use scrape::ids::IdCollector;
use scrape::metadata::MetadataCollector;
use scrape::reviews::ReviewCollector;
use serde_json::Value;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Commands::Collect { command } => match command {
            cli::CollectCommands::Ids => cmd_collect_ids(&config).await,
            cli::CollectCommands::Metadata => cmd_collect_metadata(&config).await,
            cli::CollectCommands::Reviews => cmd_collect_reviews(&config).await,
        },

        cli::Commands::Etl { command } => match command {
            cli::EtlCommands::Metadata => {
                MetadataEtl::new(storage_from(&config)).run()?;
                Ok(())
            }
            cli::EtlCommands::Reviews => {
                ReviewsEtl::new(storage_from(&config)).run()?;
                Ok(())
            }
        },

        cli::Commands::Recommend { titles, top_n } => cmd_recommend(&config, &titles, top_n),

        cli::Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, nothing to do.");
            }
            Ok(())
        }
    }
}

fn storage_from(config: &Config) -> Storage {
    Storage::new(&config.storage.data_dir, &config.storage.metadata_file)
}

fn client_from(config: &Config) -> Result<ImdbClient> {
    ImdbClient::new(
        &config.http.user_agent,
        RetryPolicy {
            attempts: config.http.retry_attempts,
            min_backoff_ms: config.http.retry_min_delay_ms,
            max_backoff_ms: config.http.retry_max_delay_ms,
        },
    )
}

async fn cmd_collect_ids(config: &Config) -> Result<()> {
    let client = client_from(config)?;
    let storage = storage_from(config);
    let collector = IdCollector::new(&client, &storage, &config.scraper)?;
    collector.collect().await
}

async fn cmd_collect_metadata(config: &Config) -> Result<()> {
    let client = client_from(config)?;
    let storage = storage_from(config);
    let delay = DelayBounds {
        min_ms: config.scraper.min_delay_ms,
        max_ms: config.scraper.max_delay_ms,
    };
    let collector = MetadataCollector::new(
        client,
        storage,
        delay,
        config.scraper.batch_size,
        config.scraper.chunk_size,
    );

    if collector.is_all_metadata_collected()? {
        info!("All metadata is already collected");
        return Ok(());
    }
    let stats = collector.collect().await?;
    info!(
        "Session done: {} collected, {} skipped, {} failed",
        stats.collected, stats.skipped, stats.failed
    );
    Ok(())
}

async fn cmd_collect_reviews(config: &Config) -> Result<()> {
    let client = client_from(config)?;
    let storage = storage_from(config);
    let collector = ReviewCollector::new(&client, &storage, &config.scraper)?;

    if collector.is_all_reviews_collected()? {
        info!("All reviews are already collected");
        return Ok(());
    }
    collector.collect().await
}

fn cmd_recommend(config: &Config, titles: &[String], top_n: Option<usize>) -> Result<()> {
    let storage = storage_from(config);
    let main_path = storage.output_dir().join("main.csv");
    let mut table = storage
        .read_csv(&main_path)
        .context("Run `filmarr etl metadata` first to build the normalized tables")?;

    // List-valued cells come back from CSV as serialized JSON.
    for row in table.rows_mut() {
        for col in &config.recommender.feature_columns {
            let parsed = match row.get(col.as_str()) {
                Some(Value::String(cell)) => serde_json::from_str::<Value>(cell).ok(),
                _ => None,
            };
            if let Some(parsed @ Value::Array(_)) = parsed {
                row.insert(col.clone(), parsed);
            }
        }
    }

    let features = FeatureMatrix::from_table(&table, &config.recommender.feature_columns)?;
    let top_n = top_n.unwrap_or(config.recommender.top_n);
    let model = ItemKnnRecommender::fit(&features, top_n);

    let ranked = model.recommend(titles)?;
    if ranked.is_empty() {
        println!("No recommendations found.");
        return Ok(());
    }

    println!("Recommendations for {}:", titles.join(", "));
    println!("{:-<50}", "");
    for (i, (title, score)) in ranked.iter().enumerate() {
        println!("{:>3}. {} ({score:.3})", i + 1, title);
    }
    Ok(())
}
