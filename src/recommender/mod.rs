//! The hybrid recommendation engine.
//!
//! Users with purchases get a weighted blend of collaborative candidates
//! (from the trained item-item similarity model) and content candidates
//! (from genre metadata). Users without purchases get best sellers of the
//! genres they declared. The popularity ranking backs up every empty result.

pub mod cold_start;
pub mod collaborative;
pub mod content;
mod error;
pub mod hybrid;
mod models;
mod service;
pub mod similarity;
pub mod trainer;

pub use error::RecommenderError;
pub use models::{RankedItem, RankingSignal, Recommendation, ScoredItem, Strategy};
pub use service::Recommender;
pub use trainer::{TrainingOutcome, TrainingReport};

use tracing::warn;

/// Unwraps a store read, logging the failure and substituting an empty value.
pub(crate) fn degraded<T: Default>(result: anyhow::Result<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to load {}, continuing without: {:#}", what, e);
            T::default()
        }
    }
}
