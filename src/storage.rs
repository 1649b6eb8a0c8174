//! File-backed storage for the scraped index, raw tables and normalized
//! output.
//!
//! Everything is whole-file: the metadata index is read once, mutated in
//! memory and rewritten wholesale on each checkpoint. Single-writer is
//! assumed; there is no locking and no row-level persistence.

use crate::table::{Record, Table};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Metadata index: one record per entity, keyed by `title_id`. Key order is
/// preserved, so scrape iteration order is stable across sessions.
pub type MetadataIndex = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    metadata_file: String,
}

impl Storage {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, metadata_file: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            metadata_file: metadata_file.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_file)
    }

    #[must_use]
    pub fn ids_dir(&self) -> PathBuf {
        self.data_dir.join("ids")
    }

    #[must_use]
    pub fn reviews_dir(&self) -> PathBuf {
        self.data_dir.join("reviews")
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("normalized")
    }

    pub fn read_metadata_index(&self) -> Result<MetadataIndex> {
        let path = self.metadata_path();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read metadata index: {}", path.display()))?;
        let index: MetadataIndex = serde_json::from_str(&content)
            .with_context(|| format!("Malformed metadata index: {}", path.display()))?;
        Ok(index)
    }

    /// Checkpoint: rewrites the whole index file. A crash between
    /// checkpoints simply redoes the uncommitted entities next run.
    pub fn write_metadata_index(&self, index: &MetadataIndex) -> Result<()> {
        let path = self.metadata_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(index)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write metadata index: {}", path.display()))?;
        Ok(())
    }

    /// Views the index as a table, injecting the key as a `title_id` column.
    pub fn read_metadata_table(&self) -> Result<Table> {
        let index = self.read_metadata_index()?;
        let mut table = Table::new();
        for (title_id, value) in index {
            let mut row = Record::new();
            row.insert("title_id".to_string(), Value::String(title_id));
            if let Value::Object(fields) = value {
                row.extend(fields);
            }
            table.push(row);
        }
        Ok(table)
    }

    pub fn write_genre_ids(&self, genre: &str, ids: &[String]) -> Result<()> {
        let dir = self.ids_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{genre}.json"));
        fs::write(&path, serde_json::to_string(ids)?)
            .with_context(|| format!("Failed to write id file: {}", path.display()))?;
        info!("Saved {} identifiers to {}", ids.len(), path.display());
        Ok(())
    }

    /// Union of all per-genre id files, deduplicated, in file order.
    pub fn read_all_genre_ids(&self) -> Result<Vec<String>> {
        let dir = self.ids_dir();
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read id directory: {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();

        let mut ids = Vec::new();
        for path in entries {
            let content = fs::read_to_string(&path)?;
            let genre_ids: Vec<String> = serde_json::from_str(&content)
                .with_context(|| format!("Malformed id file: {}", path.display()))?;
            for id in genre_ids {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    pub fn write_csv(&self, dir: &Path, name: &str, table: &Table) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        let columns = table.columns();

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create csv: {}", path.display()))?;
        writer.write_record(&columns)?;
        for row in table.rows() {
            let record: Vec<String> = columns
                .iter()
                .map(|col| csv_cell(row.get(col)))
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Reads a CSV back as a table of string-typed cells; empty cells become
    /// null. Transforms re-type the columns they care about.
    pub fn read_csv(&self, path: &Path) -> Result<Table> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open csv: {}", path.display()))?;
        let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();

        let mut table = Table::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Record::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                row.insert(header.clone(), value);
            }
            table.push(row);
        }
        Ok(table)
    }

    pub fn review_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.reviews_dir();
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read reviews directory: {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_storage() -> Storage {
        let dir = std::env::temp_dir().join(format!("filmarr-storage-{}", uuid::Uuid::new_v4()));
        Storage::new(dir, "metadata.json")
    }

    #[test]
    fn test_index_roundtrip_and_table_view() {
        let storage = temp_storage();
        let mut index = MetadataIndex::new();
        index.insert(
            "/title/tt0468569/".to_string(),
            json!({"original_title": "The Dark Knight"}),
        );
        storage.write_metadata_index(&index).unwrap();

        let table = storage.read_metadata_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0]["title_id"], json!("/title/tt0468569/"));
        assert_eq!(table.rows()[0]["original_title"], json!("The Dark Knight"));
    }

    #[test]
    fn test_csv_roundtrip_nulls_and_numbers() {
        let storage = temp_storage();
        let mut row = Record::new();
        row.insert("title_id".to_string(), json!("tt1"));
        row.insert("rating".to_string(), json!(8.9));
        row.insert("budget".to_string(), Value::Null);
        let table = Table::from_rows(vec![row]);

        let path = storage
            .write_csv(&storage.output_dir(), "main.csv", &table)
            .unwrap();
        let back = storage.read_csv(&path).unwrap();

        assert_eq!(back.rows()[0]["title_id"], json!("tt1"));
        assert_eq!(back.rows()[0]["rating"], json!("8.9"));
        assert!(back.rows()[0]["budget"].is_null());
    }

    #[test]
    fn test_genre_id_union_dedupes() {
        let storage = temp_storage();
        storage
            .write_genre_ids("action", &["/title/tt1/".into(), "/title/tt2/".into()])
            .unwrap();
        storage
            .write_genre_ids("drama", &["/title/tt2/".into(), "/title/tt3/".into()])
            .unwrap();

        let ids = storage.read_all_genre_ids().unwrap();
        assert_eq!(ids, vec!["/title/tt1/", "/title/tt2/", "/title/tt3/"]);
    }
}
