//! Collects title identifiers from paginated genre search listings.

use crate::clients::imdb::ImdbClient;
use crate::config::ScraperConfig;
use crate::scrape::DelayBounds;
use crate::storage::Storage;
use anyhow::{Result, bail};
use scraper::{Html, Selector};
use tracing::{info, warn};

/// Movie counts per genre, collected manually from the genre index as of
/// December 2021. Used to bound pagination and to resolve percentage-based
/// sample sizes.
pub const MOVIE_COUNT_BY_GENRE: [(&str, u32); 21] = [
    ("action", 49_210),
    ("adventure", 24_075),
    ("animation", 7_479),
    ("biography", 7_519),
    ("comedy", 98_571),
    ("crime", 33_263),
    ("drama", 209_137),
    ("family", 15_800),
    ("fantasy", 15_831),
    ("film-noir", 818),
    ("history", 8_345),
    ("horror", 33_292),
    ("music", 6_883),
    ("musical", 10_226),
    ("mystery", 17_137),
    ("romance", 48_572),
    ("sci-fi", 15_326),
    ("sport", 4_824),
    ("thriller", 49_018),
    ("war", 9_499),
    ("western", 8_880),
];

/// Listing page size; ranks advance in steps of this.
const STEP: u32 = 50;

fn search_url(genre: &str, start_rank: u32) -> String {
    format!(
        "https://www.imdb.com/search/title/?title_type=feature&genres={}&sort=num_votes,desc&start={}&explore=genres&ref_=adv_nxt",
        urlencoding::encode(genre),
        start_rank
    )
}

fn genre_count(genre: &str) -> Option<u32> {
    MOVIE_COUNT_BY_GENRE
        .iter()
        .find(|(name, _)| *name == genre)
        .map(|(_, count)| *count)
}

pub struct IdCollector<'a> {
    client: &'a ImdbClient,
    storage: &'a Storage,
    delay: DelayBounds,
    genres: Vec<String>,
    sample_sizes: Vec<u32>,
}

impl<'a> IdCollector<'a> {
    /// Validates the configured genre list against the known census and
    /// resolves per-genre sample sizes. Exactly one of `n_titles` and
    /// `pct_titles` must be configured.
    pub fn new(client: &'a ImdbClient, storage: &'a Storage, config: &ScraperConfig) -> Result<Self> {
        let genres: Vec<String> = if config.genres.iter().any(|g| g == "all") {
            MOVIE_COUNT_BY_GENRE
                .iter()
                .map(|(name, _)| (*name).to_string())
                .collect()
        } else {
            let (known, unknown): (Vec<String>, Vec<String>) = config
                .genres
                .iter()
                .cloned()
                .partition(|g| genre_count(g).is_some());
            if !unknown.is_empty() {
                warn!("No {} in possible genres", unknown.join(", "));
            }
            if known.is_empty() {
                bail!("No valid genres were passed");
            }
            known
        };

        let sample_sizes = match (config.n_titles, config.pct_titles) {
            (Some(n), None) => genres
                .iter()
                .map(|g| n.min(genre_count(g).unwrap_or(n)))
                .collect(),
            (None, Some(pct)) => {
                if !(0.0..=100.0).contains(&pct) {
                    bail!("pct_titles must lie in the interval [0, 100]");
                }
                genres
                    .iter()
                    .map(|g| {
                        let total = f64::from(genre_count(g).unwrap_or(0));
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            (pct / 100.0 * total) as u32
                        }
                    })
                    .collect()
            }
            _ => bail!("Exactly one of n_titles and pct_titles must be set in config"),
        };

        Ok(Self {
            client,
            storage,
            delay: DelayBounds {
                min_ms: config.min_delay_ms,
                max_ms: config.max_delay_ms,
            },
            genres,
            sample_sizes,
        })
    }

    /// Title hrefs of one listing page.
    #[must_use]
    pub fn collect_movie_ids(html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let selector =
            Selector::parse("h3.lister-item-header a").expect("Invalid selector defined in code");
        doc.select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .map(ToString::to_string)
            .collect()
    }

    async fn collect_rank_ids(&self, genre: &str, rank: u32) -> Vec<String> {
        let url = search_url(genre, rank);
        match self.client.get_text(&url).await {
            Ok(html) => {
                let ids = Self::collect_movie_ids(&html);
                info!(
                    "Collected {} identifiers in genre {}, rank {}-{}",
                    ids.len(),
                    genre.to_uppercase(),
                    rank,
                    rank + STEP
                );
                ids
            }
            Err(err) => {
                warn!(
                    "Exception in genre {}, rank {}-{}: {err:#}",
                    genre.to_uppercase(),
                    rank,
                    rank + STEP
                );
                Vec::new()
            }
        }
    }

    /// Pages through every configured genre and writes one id file each.
    pub async fn collect(&self) -> Result<()> {
        info!("Collecting identifiers...");
        for (genre, &sample_size) in self.genres.iter().zip(&self.sample_sizes) {
            let mut genre_ids = Vec::new();
            let mut rank = 1;
            while rank <= sample_size {
                genre_ids.extend(self.collect_rank_ids(genre, rank).await);
                self.delay.wait().await;
                rank += STEP;
            }

            self.storage.write_genre_ids(genre, &genre_ids)?;
            info!(
                "Collected {} identifiers in {} genre in total",
                genre_ids.len(),
                genre.to_uppercase()
            );
        }
        Ok(())
    }
}
