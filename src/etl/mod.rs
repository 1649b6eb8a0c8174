//! ETL jobs over the raw scraped tables: extract from storage, thread the
//! batch through a fixed transform pipeline, load the typed tables back out
//! as CSV.

pub mod fanout;
pub mod metadata;
pub mod numeric;
pub mod pipeline;
pub mod reviews;
pub mod text;

use crate::storage::Storage;
use anyhow::{Context, Result};
use pipeline::Pipeline;
use tracing::{debug, info};

/// Normalizes the raw metadata index into the main table plus the four
/// child association tables.
pub struct MetadataEtl {
    storage: Storage,
}

impl MetadataEtl {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// The canonical transform order. Each step consumes its source column,
    /// so re-running the pipeline on normalized output fails on the first
    /// step with a missing-column error; the pipeline is non-idempotent by
    /// design.
    #[must_use]
    pub fn pipeline() -> Pipeline {
        Pipeline::new()
            .step("split aggregate rating column", metadata::split_aggregate_rating_col)
            .step("split review summary", metadata::split_review_summary)
            .step("extract original title", metadata::extract_original_title)
            .step("extract tagline", metadata::extract_tagline)
            .step("extract details", metadata::extract_movie_details)
            .step("extract boxoffice", metadata::extract_boxoffice)
            .step("extract runtime", metadata::extract_runtime)
    }

    pub fn run(&self) -> Result<()> {
        let raw = self
            .storage
            .read_metadata_table()
            .context("Failed to load raw metadata")?;
        info!("Transforming metadata for {} titles", raw.len());

        let pipeline = Self::pipeline();
        debug!("{}", pipeline.schema());

        let transformed = pipeline.compose(raw)?;
        let tables = fanout::normalize(transformed)?;

        let out = self.storage.output_dir();
        self.storage.write_csv(&out, "main.csv", &tables.main)?;
        self.storage
            .write_csv(&out, "imdb_recommendations.csv", &tables.recommendations)?;
        self.storage.write_csv(&out, "actors.csv", &tables.actors)?;
        self.storage
            .write_csv(&out, "country_of_origin.csv", &tables.countries)?;
        self.storage
            .write_csv(&out, "production_company.csv", &tables.companies)?;

        info!(
            "Wrote normalized tables to {} ({} titles, {} actor rows)",
            out.display(),
            tables.main.len(),
            tables.actors.len()
        );
        Ok(())
    }
}

/// Normalizes the per-title raw review files into one typed reviews table.
pub struct ReviewsEtl {
    storage: Storage,
}

impl ReviewsEtl {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn pipeline() -> Pipeline {
        Pipeline::new()
            .step("split helpfulness column", reviews::split_helpfulness_col)
            .step("correct review author", reviews::correct_review_author)
            .step("correct review title", reviews::cut_off_review_title_newline)
            .step("convert to datetime", reviews::convert_to_date)
    }

    pub fn run(&self) -> Result<()> {
        let files = self.storage.review_files()?;
        info!("Transforming reviews from {} files", files.len());

        let mut raw = crate::table::Table::new();
        for path in &files {
            let table = self
                .storage
                .read_csv(path)
                .with_context(|| format!("Failed to read raw reviews: {}", path.display()))?;
            for row in table.into_rows() {
                raw.push(row);
            }
        }

        let transformed = Self::pipeline().compose(raw)?;
        let out = self.storage.output_dir();
        let path = self.storage.write_csv(&out, "reviews.csv", &transformed)?;
        info!(
            "Wrote {} normalized reviews to {}",
            transformed.len(),
            path.display()
        );
        Ok(())
    }
}
