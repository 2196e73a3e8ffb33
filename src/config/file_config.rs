use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub recommender: Option<RecommenderConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RecommenderConfig {
    pub default_top_k: Option<usize>,
    pub boost_value: Option<f64>,
    pub content_similarity_threshold: Option<f64>,
    pub collaborative_candidate_limit: Option<usize>,
    pub similarity_insert_batch_size: Option<usize>,
    pub weights: Option<WeightTiersConfig>,
}

/// Weight pairs are written as `[cf, cbf]`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WeightTiersConfig {
    pub thin_history_max: Option<usize>,
    pub moderate_history_max: Option<usize>,
    pub thin: Option<[f64; 2]>,
    pub moderate: Option<[f64; 2]>,
    pub rich: Option<[f64; 2]>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
