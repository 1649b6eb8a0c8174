//! Metadata collection loop with flag-based resume and batched checkpoints.

use crate::clients::imdb::ImdbClient;
use crate::scrape::{DelayBounds, page};
use crate::storage::{MetadataIndex, Storage};
use anyhow::Result;
use scraper::Html;
use serde_json::{Value, json};
use tracing::{info, warn};

pub const COLLECTED_FLAG: &str = "metadata_collected_flg";

/// Seam for fetching one title page, so the driver can be exercised in tests
/// without any network.
#[async_trait::async_trait]
pub trait TitlePageFetcher: Send + Sync {
    async fn fetch_title_page(&self, title_id: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl TitlePageFetcher for ImdbClient {
    async fn fetch_title_page(&self, title_id: &str) -> Result<String> {
        self.get_text(&Self::title_url(title_id)).await
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Entities collected this session.
    pub collected: usize,
    /// Entities skipped because their flag was already set.
    pub skipped: usize,
    /// Entities that failed and stay pending.
    pub failed: usize,
}

pub struct MetadataCollector<F> {
    fetcher: F,
    storage: Storage,
    delay: DelayBounds,
    /// Checkpoint the index after this many new successes.
    batch_size: usize,
    /// Stop the session after this many new successes in total.
    chunk_size: usize,
}

/// An entity is done once its collected flag is set; truthy 0/1 values from
/// older index files count as well.
#[must_use]
pub fn is_collected(record: &Value) -> bool {
    match record.get(COLLECTED_FLAG) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

/// Entities still awaiting collection, in index order.
#[must_use]
pub fn pending_ids(index: &MetadataIndex) -> Vec<String> {
    index
        .iter()
        .filter(|(_, record)| !is_collected(record))
        .map(|(id, _)| id.clone())
        .collect()
}

/// Parses one fetched page into the raw field record. Kept synchronous so
/// the parsed DOM never lives across an await point.
fn parse_title_fields(html: &str) -> crate::table::Record {
    let doc = Html::parse_document(html);
    page::collect_title_details(&doc)
}

impl<F: TitlePageFetcher> MetadataCollector<F> {
    pub fn new(
        fetcher: F,
        storage: Storage,
        delay: DelayBounds,
        batch_size: usize,
        chunk_size: usize,
    ) -> Self {
        Self {
            fetcher,
            storage,
            delay,
            batch_size: batch_size.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Seeds the metadata index from the per-genre id files when no index
    /// exists yet.
    pub fn bootstrap_index(&self) -> Result<MetadataIndex> {
        if self.storage.metadata_path().exists() {
            return self.storage.read_metadata_index();
        }
        let mut index = MetadataIndex::new();
        for id in self.storage.read_all_genre_ids()? {
            index.insert(id, json!({}));
        }
        self.storage.write_metadata_index(&index)?;
        info!("Bootstrapped metadata index with {} titles", index.len());
        Ok(index)
    }

    /// Logs how much of the index is already collected; true when nothing
    /// is left to do.
    pub fn is_all_metadata_collected(&self) -> Result<bool> {
        let index = self.storage.read_metadata_index()?;
        let collected = index.values().filter(|r| is_collected(r)).count();
        info!(
            "Movie metadata is already collected for {collected} out of {} titles",
            index.len()
        );
        Ok(collected == index.len())
    }

    /// One collection session. Entities whose flag is set are skipped with
    /// no network call; failures are logged and left pending; the index is
    /// rewritten after every `batch_size` successes and once at the end.
    pub async fn collect(&self) -> Result<CollectStats> {
        info!("Collecting metadata...");
        let mut index = self.bootstrap_index()?;
        let title_ids: Vec<String> = index.keys().cloned().collect();

        let mut stats = CollectStats::default();
        let mut batch_counter = 0;
        let mut session_counter = 0;

        for title_id in &title_ids {
            if index.get(title_id).is_some_and(is_collected) {
                stats.skipped += 1;
                continue;
            }

            match self.fetcher.fetch_title_page(title_id).await {
                Ok(html) => {
                    let mut fields = parse_title_fields(&html);
                    fields.insert(COLLECTED_FLAG.to_string(), json!(true));
                    merge_fields(&mut index, title_id, fields);

                    batch_counter += 1;
                    stats.collected += 1;
                    info!("Collected metadata for title {title_id}");
                }
                Err(err) => {
                    stats.failed += 1;
                    warn!("Exception while parsing {title_id}: {err:#}");
                }
            }

            self.delay.wait().await;

            if batch_counter >= self.batch_size {
                session_counter += batch_counter;
                batch_counter = 0;
                self.storage.write_metadata_index(&index)?;
                info!("Updated metadata file with {} titles", self.batch_size);

                // Session budget for externally imposed run-time limits.
                if session_counter >= self.chunk_size {
                    info!("Stop parsing due to requests limit");
                    return Ok(stats);
                }
            }
        }

        self.storage.write_metadata_index(&index)?;
        Ok(stats)
    }
}

fn merge_fields(index: &mut MetadataIndex, title_id: &str, fields: crate::table::Record) {
    let entry = index
        .entry(title_id.to_string())
        .or_insert_with(|| json!({}));
    if let Value::Object(existing) = entry {
        existing.extend(fields);
    } else {
        *entry = Value::Object(fields);
    }
}
