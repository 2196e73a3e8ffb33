//! Weighted combination of collaborative and content candidates.

use super::degraded;
use super::models::{sort_by_score_desc, ScoredItem};
use crate::config::{HybridWeights, WeightTiers};
use crate::store::{GenreId, ItemId, RecommenderStore, UserId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Picks the weights for a user with `purchase_count` purchases.
pub fn select_weights(tiers: &WeightTiers, purchase_count: usize) -> HybridWeights {
    if purchase_count <= tiers.thin_history_max {
        tiers.thin
    } else if purchase_count <= tiers.moderate_history_max {
        tiers.moderate
    } else {
        tiers.rich
    }
}

/// Sums `weights.cf * cf + weights.cbf * cbf` per item. An item missing from
/// one list contributes 0 for that signal.
pub fn weighted_sum(
    collaborative: &[ScoredItem],
    content: &[ScoredItem],
    weights: HybridWeights,
) -> HashMap<ItemId, f64> {
    let mut scores: HashMap<ItemId, f64> = HashMap::new();
    for candidate in collaborative {
        *scores.entry(candidate.item_id).or_insert(0.0) += weights.cf * candidate.score;
    }
    for candidate in content {
        *scores.entry(candidate.item_id).or_insert(0.0) += weights.cbf * candidate.score;
    }
    scores
}

/// Adds `boost` once to every item tagged with at least one preferred genre.
pub fn apply_genre_boost(
    scores: &mut HashMap<ItemId, f64>,
    item_genres: &[(ItemId, GenreId)],
    preferred: &HashSet<GenreId>,
    boost: f64,
) -> usize {
    let boosted: HashSet<ItemId> = item_genres
        .iter()
        .filter(|(_, genre_id)| preferred.contains(genre_id))
        .map(|(item_id, _)| *item_id)
        .collect();
    let mut count = 0;
    for item_id in boosted {
        if let Some(score) = scores.get_mut(&item_id) {
            *score += boost;
            count += 1;
        }
    }
    count
}

/// Drops every candidate in `purchased`, keeping the order of the rest.
pub fn exclude_purchased(candidates: Vec<ScoredItem>, purchased: &HashSet<ItemId>) -> Vec<ScoredItem> {
    candidates
        .into_iter()
        .filter(|candidate| !purchased.contains(&candidate.item_id))
        .collect()
}

pub struct HybridCombiner<'a> {
    store: &'a dyn RecommenderStore,
    boost_value: f64,
}

impl<'a> HybridCombiner<'a> {
    pub fn new(store: &'a dyn RecommenderStore, boost_value: f64) -> Self {
        Self { store, boost_value }
    }

    /// Merges both candidate lists, boosts items in the user's declared
    /// genres and ranks the result. Scores are not renormalized.
    pub fn combine(
        &self,
        user_id: UserId,
        collaborative: &[ScoredItem],
        content: &[ScoredItem],
        weights: HybridWeights,
    ) -> Vec<ScoredItem> {
        let mut scores = weighted_sum(collaborative, content, weights);

        if !scores.is_empty() {
            let preferred: HashSet<GenreId> = degraded(
                self.store.get_user_preferred_genres(user_id),
                "preferred genres",
            )
            .into_iter()
            .collect();
            if !preferred.is_empty() {
                let item_ids: Vec<ItemId> = scores.keys().copied().collect();
                let item_genres = degraded(
                    self.store.get_genres_of_items(&item_ids),
                    "candidate genres",
                );
                let boosted =
                    apply_genre_boost(&mut scores, &item_genres, &preferred, self.boost_value);
                debug!("User {}: boosted {} candidates", user_id, boosted);
            }
        }

        let mut ranked: Vec<ScoredItem> = scores
            .into_iter()
            .map(|(item_id, score)| ScoredItem::new(item_id, score))
            .collect();
        sort_by_score_desc(&mut ranked);
        ranked
    }
}
