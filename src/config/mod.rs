mod file_config;

pub use file_config::{FileConfig, RecommenderConfig, WeightTiersConfig};

use crate::store::MAX_SIMILARITY_INSERT_BATCH;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub recommender: RecommenderSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db or in config file")
            })?;

        let defaults = RecommenderSettings::default();
        let rec_file = file.recommender.unwrap_or_default();
        let weights_file = rec_file.weights.unwrap_or_default();
        let default_tiers = defaults.weight_tiers;

        let recommender = RecommenderSettings {
            default_top_k: rec_file
                .default_top_k
                .or(cli.top_k)
                .unwrap_or(defaults.default_top_k),
            boost_value: rec_file.boost_value.unwrap_or(defaults.boost_value),
            content_similarity_threshold: rec_file
                .content_similarity_threshold
                .unwrap_or(defaults.content_similarity_threshold),
            collaborative_candidate_limit: rec_file
                .collaborative_candidate_limit
                .unwrap_or(defaults.collaborative_candidate_limit),
            similarity_insert_batch_size: rec_file
                .similarity_insert_batch_size
                .unwrap_or(defaults.similarity_insert_batch_size),
            weight_tiers: WeightTiers {
                thin_history_max: weights_file
                    .thin_history_max
                    .unwrap_or(default_tiers.thin_history_max),
                moderate_history_max: weights_file
                    .moderate_history_max
                    .unwrap_or(default_tiers.moderate_history_max),
                thin: weights_file
                    .thin
                    .map(HybridWeights::from)
                    .unwrap_or(default_tiers.thin),
                moderate: weights_file
                    .moderate
                    .map(HybridWeights::from)
                    .unwrap_or(default_tiers.moderate),
                rich: weights_file
                    .rich
                    .map(HybridWeights::from)
                    .unwrap_or(default_tiers.rich),
            },
        };
        recommender.validate()?;

        Ok(Self {
            db_path,
            recommender,
        })
    }
}

/// Relative weight of the collaborative and content signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub cf: f64,
    pub cbf: f64,
}

impl HybridWeights {
    pub const fn new(cf: f64, cbf: f64) -> Self {
        Self { cf, cbf }
    }
}

impl From<[f64; 2]> for HybridWeights {
    fn from([cf, cbf]: [f64; 2]) -> Self {
        Self { cf, cbf }
    }
}

/// Step function from a user's purchase count to the hybrid weights.
///
/// Up to `thin_history_max` purchases the `thin` weights apply, up to
/// `moderate_history_max` the `moderate` ones, `rich` above that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTiers {
    pub thin_history_max: usize,
    pub moderate_history_max: usize,
    pub thin: HybridWeights,
    pub moderate: HybridWeights,
    pub rich: HybridWeights,
}

impl Default for WeightTiers {
    fn default() -> Self {
        Self {
            thin_history_max: 15,
            moderate_history_max: 25,
            thin: HybridWeights::new(0.3, 0.7),
            moderate: HybridWeights::new(0.5, 0.5),
            rich: HybridWeights::new(0.7, 0.3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderSettings {
    /// Number of results when the caller does not ask for a specific count.
    pub default_top_k: usize,
    /// Added to a hybrid candidate sharing a genre with the user's declared ones.
    pub boost_value: f64,
    /// Content candidates need a cosine similarity strictly above this.
    pub content_similarity_threshold: f64,
    /// Maximum number of collaborative candidates.
    pub collaborative_candidate_limit: usize,
    /// Rows per insert statement when persisting the similarity model.
    pub similarity_insert_batch_size: usize,
    pub weight_tiers: WeightTiers,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            boost_value: 0.1,
            content_similarity_threshold: 0.1,
            collaborative_candidate_limit: 20,
            similarity_insert_batch_size: 1000,
            weight_tiers: WeightTiers::default(),
        }
    }
}

impl RecommenderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.similarity_insert_batch_size == 0 {
            bail!("similarity_insert_batch_size must be greater than 0");
        }
        if self.similarity_insert_batch_size > MAX_SIMILARITY_INSERT_BATCH {
            bail!(
                "similarity_insert_batch_size must be at most {}, got {}",
                MAX_SIMILARITY_INSERT_BATCH,
                self.similarity_insert_batch_size
            );
        }
        if self.collaborative_candidate_limit == 0 {
            bail!("collaborative_candidate_limit must be greater than 0");
        }
        if !(0.0..1.0).contains(&self.content_similarity_threshold) {
            bail!(
                "content_similarity_threshold must be in [0, 1), got {}",
                self.content_similarity_threshold
            );
        }
        if self.boost_value < 0.0 {
            bail!("boost_value must not be negative, got {}", self.boost_value);
        }
        let tiers = &self.weight_tiers;
        if tiers.thin_history_max >= tiers.moderate_history_max {
            bail!(
                "thin_history_max ({}) must be lower than moderate_history_max ({})",
                tiers.thin_history_max,
                tiers.moderate_history_max
            );
        }
        for (name, weights) in [
            ("thin", tiers.thin),
            ("moderate", tiers.moderate),
            ("rich", tiers.rich),
        ] {
            let in_range = |w: f64| (0.0..=1.0).contains(&w);
            if !in_range(weights.cf) || !in_range(weights.cbf) {
                bail!("{} weights must be in [0, 1], got {:?}", name, weights);
            }
        }
        Ok(())
    }
}
