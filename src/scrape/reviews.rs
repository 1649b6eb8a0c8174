//! Review collection: pagination-key loop per title, one raw CSV per title,
//! per-title checkpoints on the shared metadata index.

use crate::clients::imdb::ImdbClient;
use crate::config::ScraperConfig;
use crate::scrape::{DelayBounds, page};
use crate::storage::Storage;
use crate::table::{Record, Table};
use anyhow::{Result, bail};
use scraper::Html;
use serde_json::{Value, json};
use tracing::{info, warn};

pub const REVIEWS_FLAG: &str = "reviews_collected_flg";

fn start_url(title_id: &str) -> String {
    format!(
        "https://www.imdb.com{title_id}reviews?sort=helpfulnessScore&dir=desc&ratingFilter=0"
    )
}

fn load_more_url(title_id: &str) -> String {
    format!(
        "https://www.imdb.com{title_id}reviews/_ajax/?sort=helpfulnessScore&dir=desc&ratingFilter=0"
    )
}

/// Extracts the short title id from its raw href form, e.g.
/// `/title/tt0468569/` -> `tt0468569`.
#[must_use]
pub fn short_title_id(title_id: &str) -> String {
    title_id
        .split('/')
        .filter(|part| !part.is_empty())
        .next_back()
        .unwrap_or(title_id)
        .to_string()
}

struct PageOutcome {
    reviews: Vec<Record>,
    next_key: Option<String>,
}

/// Parses one loaded review page; synchronous so the DOM stays out of the
/// async loop.
fn parse_review_page(html: &str, title_id: &str) -> PageOutcome {
    let doc = Html::parse_document(html);
    PageOutcome {
        reviews: page::collect_page_reviews(&doc, title_id),
        next_key: page::pagination_key(&doc),
    }
}

fn parse_reviews_num(html: &str) -> u32 {
    page::find_reviews_num(&Html::parse_document(html))
}

pub struct ReviewCollector<'a> {
    client: &'a ImdbClient,
    storage: &'a Storage,
    delay: DelayBounds,
    chunk_size: usize,
    n_reviews: Option<u32>,
    pct_reviews: Option<f64>,
}

impl<'a> ReviewCollector<'a> {
    pub fn new(client: &'a ImdbClient, storage: &'a Storage, config: &ScraperConfig) -> Result<Self> {
        match (config.n_reviews, config.pct_reviews) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => bail!("Exactly one of n_reviews and pct_reviews must be set in config"),
        }
        if let Some(pct) = config.pct_reviews {
            if !(0.0..=100.0).contains(&pct) {
                bail!("pct_reviews must lie in the interval [0, 100]");
            }
        }

        Ok(Self {
            client,
            storage,
            delay: DelayBounds {
                min_ms: config.min_delay_ms,
                max_ms: config.max_delay_ms,
            },
            chunk_size: config.chunk_size.max(1),
            n_reviews: config.n_reviews,
            pct_reviews: config.pct_reviews,
        })
    }

    fn review_cap(&self, total: u32) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        match (self.n_reviews, self.pct_reviews) {
            (Some(n), _) => n as usize,
            (None, Some(pct)) => (f64::from(total) * pct / 100.0) as usize,
            (None, None) => total as usize,
        }
    }

    /// Walks the load-more pagination of one title until the key runs out
    /// or the configured cap is reached.
    pub async fn collect_title_reviews(&self, title_id: &str) -> Result<Vec<Record>> {
        let html = self.client.get_text(&start_url(title_id)).await?;
        let cap = self.review_cap(parse_reviews_num(&html));

        let mut all_reviews = Vec::new();
        let mut outcome = parse_review_page(&html, title_id);
        loop {
            self.delay.wait().await;
            info!(
                "Collected {} reviews for title ID {title_id}",
                outcome.reviews.len()
            );
            all_reviews.extend(outcome.reviews);

            if all_reviews.len() > cap {
                break;
            }
            let Some(key) = outcome.next_key.take() else {
                break;
            };

            let next = self
                .client
                .get_text_with_params(
                    &load_more_url(title_id),
                    &[("ref_", "undefined"), ("paginationKey", key.as_str())],
                )
                .await?;
            outcome = parse_review_page(&next, title_id);
        }
        Ok(all_reviews)
    }

    pub fn is_all_reviews_collected(&self) -> Result<bool> {
        let index = self.storage.read_metadata_index()?;
        let collected = index.values().filter(|r| flag_is_set_for(r)).count();
        info!(
            "Movie reviews are already collected for {collected} out of {} titles",
            index.len()
        );
        Ok(collected == index.len())
    }

    /// One collection session over all pending titles. Each finished title
    /// writes its own CSV and immediately checkpoints the index; reviews
    /// take long enough per title that batching checkpoints is not worth a
    /// redo window.
    pub async fn collect(&self) -> Result<()> {
        info!("Collecting reviews...");
        let mut index = self.storage.read_metadata_index()?;

        // Older index files predate the reviews flag.
        if !index.values().any(|r| r.get(REVIEWS_FLAG).is_some()) {
            for record in index.values_mut() {
                if let Value::Object(fields) = record {
                    fields.insert(REVIEWS_FLAG.to_string(), json!(false));
                }
            }
            self.storage.write_metadata_index(&index)?;
        }

        let title_ids: Vec<String> = index.keys().cloned().collect();
        let mut counter = 0;
        for title_id in &title_ids {
            if index.get(title_id).is_some_and(flag_is_set_for) {
                continue;
            }

            match self.collect_title_reviews(title_id).await {
                Ok(reviews) => {
                    let short_id = short_title_id(title_id);
                    if !reviews.is_empty() {
                        let table = Table::from_rows(reviews.clone());
                        self.storage.write_csv(
                            &self.storage.reviews_dir(),
                            &format!("{short_id}.csv"),
                            &table,
                        )?;
                    }

                    if let Some(Value::Object(fields)) = index.get_mut(title_id) {
                        fields.insert(REVIEWS_FLAG.to_string(), json!(true));
                    }
                    self.storage.write_metadata_index(&index)?;

                    counter += 1;
                    info!(
                        "Total collected {} reviews for title ID {short_id}",
                        reviews.len()
                    );
                }
                Err(err) => {
                    warn!("Exception while collecting reviews for {title_id}: {err:#}");
                }
            }

            if counter >= self.chunk_size {
                info!("Stop parsing due to requests limit");
                break;
            }
        }
        Ok(())
    }
}

fn flag_is_set_for(record: &Value) -> bool {
    match record.get(REVIEWS_FLAG) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}
