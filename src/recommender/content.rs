//! Content-based candidates from genre metadata.
//!
//! Every catalog item with at least one genre becomes a multi-hot vector over
//! the genre vocabulary. The user's profile is the mean vector of their
//! purchased items, and unpurchased items are scored by cosine similarity to
//! it.

use super::degraded;
use super::models::{sort_by_score_desc, ScoredItem};
use super::similarity::cosine_similarity;
use crate::store::{GenreId, ItemId, RecommenderStore, UserId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Multi-hot genre vectors of the items that have genre metadata.
#[derive(Debug, Default)]
pub struct ItemFeatureMatrix {
    genres: Vec<GenreId>,
    rows: BTreeMap<ItemId, Vec<f64>>,
}

impl ItemFeatureMatrix {
    pub fn from_assignments(assignments: &[(ItemId, GenreId)]) -> Self {
        let genres: Vec<GenreId> = assignments
            .iter()
            .map(|(_, genre_id)| *genre_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let column_of: BTreeMap<GenreId, usize> = genres
            .iter()
            .enumerate()
            .map(|(column, genre_id)| (*genre_id, column))
            .collect();

        let mut rows: BTreeMap<ItemId, Vec<f64>> = BTreeMap::new();
        for (item_id, genre_id) in assignments {
            let row = rows
                .entry(*item_id)
                .or_insert_with(|| vec![0.0; genres.len()]);
            row[column_of[genre_id]] = 1.0;
        }

        Self { genres, rows }
    }

    pub fn genre_count(&self) -> usize {
        self.genres.len()
    }

    pub fn row(&self, item_id: ItemId) -> Option<&[f64]> {
        self.rows.get(&item_id).map(Vec::as_slice)
    }

    /// Mean of the rows of `item_ids`. Ids without a row are ignored; `None`
    /// when none of them has one.
    pub fn profile(&self, item_ids: &[ItemId]) -> Option<Vec<f64>> {
        let mut profile = vec![0.0; self.genres.len()];
        let mut matched = 0usize;
        for row in item_ids.iter().filter_map(|id| self.rows.get(id)) {
            for (acc, value) in profile.iter_mut().zip(row) {
                *acc += value;
            }
            matched += 1;
        }
        if matched == 0 {
            return None;
        }
        for value in profile.iter_mut() {
            *value /= matched as f64;
        }
        Some(profile)
    }

    fn items(&self) -> impl Iterator<Item = (ItemId, &[f64])> {
        self.rows.iter().map(|(id, row)| (*id, row.as_slice()))
    }
}

pub struct ContentGenerator<'a> {
    store: &'a dyn RecommenderStore,
    similarity_threshold: f64,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(store: &'a dyn RecommenderStore, similarity_threshold: f64) -> Self {
        Self {
            store,
            similarity_threshold,
        }
    }

    /// Unpurchased items whose similarity to the user's profile is strictly
    /// above the threshold, best first.
    pub fn candidates(&self, user_id: UserId) -> Vec<ScoredItem> {
        let assignments = degraded(
            self.store.get_item_genre_assignments(),
            "item genre assignments",
        );
        if assignments.is_empty() {
            return vec![];
        }
        let purchased = degraded(
            self.store.get_purchased_item_ids(user_id),
            "purchased items",
        );
        if purchased.is_empty() {
            return vec![];
        }

        let features = ItemFeatureMatrix::from_assignments(&assignments);
        let Some(profile) = features.profile(&purchased) else {
            debug!("User {}: no purchased item has genre metadata", user_id);
            return vec![];
        };

        let owned: HashSet<ItemId> = purchased.into_iter().collect();
        let mut candidates: Vec<ScoredItem> = features
            .items()
            .filter(|(item_id, _)| !owned.contains(item_id))
            .map(|(item_id, row)| ScoredItem::new(item_id, cosine_similarity(&profile, row)))
            .filter(|candidate| candidate.score > self.similarity_threshold)
            .collect();
        sort_by_score_desc(&mut candidates);

        debug!(
            "User {}: {} content candidates over {} genres",
            user_id,
            candidates.len(),
            features.genre_count()
        );
        candidates
    }
}
