//! Content-based recommendations from hand-crafted one-hot features.

use crate::table::{Table, str_cell};
use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// One-hot feature matrix over the normalized main table. Array columns
/// (like `genres`) contribute one feature per distinct value; scalar string
/// columns one feature per distinct cell value.
pub struct FeatureMatrix {
    titles: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn from_table(table: &Table, feature_columns: &[String]) -> Result<Self> {
        for col in feature_columns {
            if !table.has_column(col) {
                bail!("No \"{col}\" column in metadata table");
            }
        }

        let mut vocabulary: Vec<(String, String)> = Vec::new();
        let mut row_terms: Vec<Vec<(String, String)>> = Vec::new();
        let mut titles = Vec::new();

        for row in table.rows() {
            let title = str_cell(row, "title_id")
                .or_else(|| str_cell(row, "original_title"))
                .unwrap_or_default()
                .to_string();
            titles.push(title);

            let mut terms = Vec::new();
            for col in feature_columns {
                match row.get(col.as_str()) {
                    Some(Value::Array(values)) => {
                        for value in values {
                            if let Some(s) = value.as_str() {
                                terms.push((col.clone(), s.to_string()));
                            }
                        }
                    }
                    Some(Value::String(s)) => terms.push((col.clone(), s.clone())),
                    _ => {}
                }
            }
            for term in &terms {
                if !vocabulary.contains(term) {
                    vocabulary.push(term.clone());
                }
            }
            row_terms.push(terms);
        }

        debug!(
            "Built feature vocabulary of {} terms over {} titles",
            vocabulary.len(),
            titles.len()
        );

        let rows = row_terms
            .into_iter()
            .map(|terms| {
                vocabulary
                    .iter()
                    .map(|term| if terms.contains(term) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();

        Ok(Self { titles, rows })
    }

    #[must_use]
    pub fn titles(&self) -> &[String] {
        &self.titles
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Item-KNN over the cosine-similarity matrix of the feature rows.
pub struct ItemKnnRecommender {
    titles: Vec<String>,
    similarity: Vec<Vec<f64>>,
    top_n: usize,
}

impl ItemKnnRecommender {
    #[must_use]
    pub fn fit(features: &FeatureMatrix, top_n: usize) -> Self {
        let n = features.rows.len();
        let mut similarity = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let sim = cosine_similarity(&features.rows[i], &features.rows[j]);
                similarity[i][j] = sim;
                similarity[j][i] = sim;
            }
        }
        Self {
            titles: features.titles.clone(),
            similarity,
            top_n: top_n.max(1),
        }
    }

    fn title_index(&self, title: &str) -> Option<usize> {
        self.titles.iter().position(|t| t == title)
    }

    /// Top-N candidates over a set of liked titles: per candidate the best
    /// similarity against any liked title wins, liked titles themselves are
    /// excluded, unknown liked titles are an error.
    pub fn recommend(&self, liked: &[String]) -> Result<Vec<(String, f64)>> {
        let mut liked_indices = Vec::with_capacity(liked.len());
        for title in liked {
            let Some(index) = self.title_index(title) else {
                bail!("Unknown title: {title}");
            };
            liked_indices.push(index);
        }

        let mut relevance: HashMap<usize, f64> = HashMap::new();
        for &liked_index in &liked_indices {
            // Per liked title only its nearest top_n neighbours compete.
            let mut neighbours: Vec<(usize, f64)> = self.similarity[liked_index]
                .iter()
                .copied()
                .enumerate()
                .filter(|(candidate, _)| !liked_indices.contains(candidate))
                .collect();
            neighbours.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (candidate, sim) in neighbours.into_iter().take(self.top_n) {
                let entry = relevance.entry(candidate).or_insert(0.0);
                if sim > *entry {
                    *entry = sim;
                }
            }
        }

        let mut ranked: Vec<(String, f64)> = relevance
            .into_iter()
            .map(|(index, sim)| (self.titles[index].clone(), sim))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.top_n);
        Ok(ranked)
    }
}
