//! Recommendations for users without purchases, and the popularity fallback.

use super::degraded;
use crate::store::{ItemId, ItemSales, RecommenderStore, UserId};
use std::collections::HashSet;
use tracing::debug;

/// The catalog ranked by all-time sales.
pub struct PopularityFallback<'a> {
    store: &'a dyn RecommenderStore,
}

impl<'a> PopularityFallback<'a> {
    pub fn new(store: &'a dyn RecommenderStore) -> Self {
        Self { store }
    }

    /// Up to `k` items, best sellers first, unsold items last.
    pub fn top(&self, k: usize) -> Vec<ItemSales> {
        degraded(self.store.get_top_selling_items(k), "top selling items")
    }
}

/// Takes one item from each list in turn until `k` distinct items are
/// collected or every list is exhausted.
pub fn interleave_round_robin(lists: &[Vec<ItemSales>], k: usize) -> Vec<ItemSales> {
    let mut selected: Vec<ItemSales> = Vec::new();
    let mut seen: HashSet<ItemId> = HashSet::new();
    let longest = lists.iter().map(Vec::len).max().unwrap_or(0);

    'rounds: for position in 0..longest {
        for list in lists {
            if selected.len() >= k {
                break 'rounds;
            }
            if let Some(item) = list.get(position) {
                if seen.insert(item.item_id) {
                    selected.push(*item);
                }
            }
        }
    }
    selected
}

/// Diversified best sellers of the genres the user declared at registration.
pub struct ColdStartGenerator<'a> {
    store: &'a dyn RecommenderStore,
}

impl<'a> ColdStartGenerator<'a> {
    pub fn new(store: &'a dyn RecommenderStore) -> Self {
        Self { store }
    }

    pub fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemSales> {
        let fallback = PopularityFallback::new(self.store);
        let genres = degraded(
            self.store.get_user_preferred_genres(user_id),
            "preferred genres",
        );
        if genres.is_empty() {
            debug!("User {}: no declared genres, using popularity", user_id);
            return fallback.top(k);
        }

        let limit_per_genre = (k / genres.len()).saturating_add(2);
        let per_genre: Vec<Vec<ItemSales>> = genres
            .iter()
            .map(|genre_id| {
                degraded(
                    self.store
                        .get_top_selling_items_in_genre(*genre_id, limit_per_genre),
                    "top selling items in genre",
                )
            })
            .collect();

        let mut selected = interleave_round_robin(&per_genre, k);
        if selected.len() < k {
            let mut seen: HashSet<ItemId> = selected.iter().map(|item| item.item_id).collect();
            let top_up = fallback.top(k.saturating_add(selected.len()));
            debug!(
                "User {}: {} genre picks, topping up from popularity",
                user_id,
                selected.len()
            );
            for item in top_up {
                if selected.len() >= k {
                    break;
                }
                if seen.insert(item.item_id) {
                    selected.push(item);
                }
            }
        }
        selected
    }
}
