//! Offline item-item similarity training.
//!
//! The purchase log is read as a binary user×item matrix: a cell is 1 when
//! the user bought the item at least once. Every ordered pair of distinct
//! items with a positive cosine similarity between their buyer columns is
//! written as the next model version, replacing the previous one.

use super::error::RecommenderError;
use super::similarity::binary_cosine;
use crate::store::{ItemId, RecommenderStore, SimilarityPair, UserId};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info};

/// Result of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    /// The purchase log is empty. The stored model was left untouched.
    Skipped,
    Trained(TrainingReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingReport {
    pub model_version: i64,
    pub users: usize,
    pub items: usize,
    pub pairs: usize,
}

/// Builds the buyer set of every purchased item, keyed by item id.
fn buyers_by_item(purchases: &[(UserId, ItemId)]) -> BTreeMap<ItemId, BTreeSet<UserId>> {
    let mut buyers: BTreeMap<ItemId, BTreeSet<UserId>> = BTreeMap::new();
    for &(user_id, item_id) in purchases {
        buyers.entry(item_id).or_default().insert(user_id);
    }
    buyers
}

/// Computes every ordered pair (a, b) with a != b and positive similarity.
///
/// Repeated purchases of an item by the same user count once. Output is
/// ordered by `item_a`, then `item_b`.
pub fn compute_similarity_pairs(purchases: &[(UserId, ItemId)]) -> Vec<SimilarityPair> {
    let columns: Vec<(ItemId, BTreeSet<UserId>)> = buyers_by_item(purchases).into_iter().collect();

    columns
        .par_iter()
        .flat_map_iter(|(item_a, buyers_a)| {
            columns
                .iter()
                .filter(move |(item_b, _)| item_b != item_a)
                .filter_map(move |(item_b, buyers_b)| {
                    let score = binary_cosine(buyers_a, buyers_b);
                    (score > 0.0).then_some(SimilarityPair {
                        item_a: *item_a,
                        item_b: *item_b,
                        score,
                    })
                })
        })
        .collect()
}

pub struct SimilarityTrainer<'a> {
    store: &'a dyn RecommenderStore,
    batch_size: usize,
}

impl<'a> SimilarityTrainer<'a> {
    pub fn new(store: &'a dyn RecommenderStore, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    /// Regenerates the similarity model from the whole purchase log.
    ///
    /// A failing read is an error, not an empty log.
    pub fn run(&self) -> Result<TrainingOutcome, RecommenderError> {
        let start = Instant::now();
        let purchases = self
            .store
            .get_all_purchase_pairs()
            .map_err(RecommenderError::Training)?;

        if purchases.is_empty() {
            info!("No purchases recorded, skipping similarity training");
            return Ok(TrainingOutcome::Skipped);
        }

        let users = purchases
            .iter()
            .map(|(user_id, _)| *user_id)
            .collect::<BTreeSet<_>>()
            .len();
        let items = purchases
            .iter()
            .map(|(_, item_id)| *item_id)
            .collect::<BTreeSet<_>>()
            .len();
        debug!(
            "Training similarity model over {} users x {} items ({} purchases)",
            users,
            items,
            purchases.len()
        );

        let pairs = compute_similarity_pairs(&purchases);
        let model_version = self
            .store
            .replace_similarity_model(&pairs, self.batch_size)
            .map_err(RecommenderError::Training)?;

        info!(
            "Similarity model v{} trained: {} pairs from {} items in {:?}",
            model_version,
            pairs.len(),
            items,
            start.elapsed()
        );

        Ok(TrainingOutcome::Trained(TrainingReport {
            model_version,
            users,
            items,
            pairs: pairs.len(),
        }))
    }
}
