use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub storage: StorageConfig,

    pub http: HttpConfig,

    pub scraper: ScraperConfig,

    pub recommender: RecommenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend. Only "local" is supported.
    pub mode: String,

    /// Root directory for raw and normalized data files.
    pub data_dir: String,

    /// Name of the metadata index file inside `data_dir`.
    pub metadata_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: "local".to_string(),
            data_dir: "data".to_string(),
            metadata_file: "movie_metadata.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Attempts per request before giving up (default: 5)
    pub retry_attempts: u32,

    /// Backoff bounds between retries of one request, in milliseconds.
    pub retry_min_delay_ms: u64,

    pub retry_max_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/110.0".to_string(),
            retry_attempts: 5,
            retry_min_delay_ms: 1000,
            retry_max_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Genres to sample ids from; "all" expands to every known genre.
    pub genres: Vec<String>,

    /// Absolute title sample size per genre. Exactly one of `n_titles`
    /// and `pct_titles` must be set.
    pub n_titles: Option<u32>,

    /// Percentage of each genre's movie count to sample, in [0, 100].
    pub pct_titles: Option<f64>,

    /// Absolute review cap per title. Exactly one of `n_reviews` and
    /// `pct_reviews` must be set.
    pub n_reviews: Option<u32>,

    /// Percentage of each title's review count to collect, in [0, 100].
    pub pct_reviews: Option<f64>,

    /// Jittered inter-request delay bounds in milliseconds.
    pub min_delay_ms: u64,

    pub max_delay_ms: u64,

    /// Rewrite the metadata index after this many new titles.
    pub batch_size: usize,

    /// Stop a session after this many new titles.
    pub chunk_size: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            genres: vec!["all".to_string()],
            n_titles: Some(500),
            pct_titles: None,
            n_reviews: Some(100),
            pct_reviews: None,
            min_delay_ms: 900,
            max_delay_ms: 2100,
            batch_size: 10,
            chunk_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Number of recommendations to produce.
    pub top_n: usize,

    /// Columns of the normalized main table to one-hot encode.
    pub feature_columns: Vec<String>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            feature_columns: vec!["genres".to_string()],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("filmarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".filmarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.mode != "local" {
            anyhow::bail!(
                "Unsupported storage mode '{}': only \"local\" is available",
                self.storage.mode
            );
        }

        if self.storage.data_dir.is_empty() {
            anyhow::bail!("storage.data_dir cannot be empty");
        }

        if self.http.retry_min_delay_ms > self.http.retry_max_delay_ms {
            anyhow::bail!("http.retry_min_delay_ms must not exceed http.retry_max_delay_ms");
        }

        if self.scraper.min_delay_ms > self.scraper.max_delay_ms {
            anyhow::bail!("scraper.min_delay_ms must not exceed scraper.max_delay_ms");
        }

        if self.recommender.top_n == 0 {
            anyhow::bail!("recommender.top_n must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.mode, "local");
        assert_eq!(config.scraper.n_titles, Some(500));
        assert_eq!(config.scraper.pct_titles, None);
        assert_eq!(config.recommender.top_n, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[scraper]"));
        assert!(toml_str.contains("[recommender]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [scraper]
            genres = ["crime", "drama"]
            chunk_size = 25
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scraper.genres, vec!["crime", "drama"]);
        assert_eq!(config.scraper.chunk_size, 25);

        assert_eq!(config.storage.data_dir, "data");
    }

    #[test]
    fn test_validate_rejects_remote_storage_mode() {
        let mut config = Config::default();
        config.storage.mode = "s3".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delay_bounds() {
        let mut config = Config::default();
        config.scraper.min_delay_ms = 5000;
        config.scraper.max_delay_ms = 1000;
        assert!(config.validate().is_err());
    }
}
