use super::degraded;
use super::models::ScoredItem;
use crate::store::{RecommenderStore, UserId};
use tracing::debug;

/// Candidates from the item-item similarity model.
///
/// A candidate's score is its average similarity to the user's distinct
/// purchased items, over those items it is related to. Items the user
/// already owns never come back.
pub struct CollaborativeGenerator<'a> {
    store: &'a dyn RecommenderStore,
    candidate_limit: usize,
}

impl<'a> CollaborativeGenerator<'a> {
    pub fn new(store: &'a dyn RecommenderStore, candidate_limit: usize) -> Self {
        Self {
            store,
            candidate_limit,
        }
    }

    pub fn candidates(&self, user_id: UserId) -> Vec<ScoredItem> {
        let rows = degraded(
            self.store
                .get_collaborative_candidates(user_id, self.candidate_limit),
            "collaborative candidates",
        );
        debug!(
            "User {}: {} collaborative candidates",
            user_id,
            rows.len()
        );
        rows.into_iter()
            .map(|(item_id, score)| ScoredItem::new(item_id, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockRecommenderStore;

    #[test]
    fn forwards_limit_and_keeps_store_order() {
        let mut store = MockRecommenderStore::new();
        store
            .expect_get_collaborative_candidates()
            .withf(|user_id, limit| *user_id == 4 && *limit == 20)
            .returning(|_, _| Ok(vec![(7, 0.9), (3, 0.4)]));

        let candidates = CollaborativeGenerator::new(&store, 20).candidates(4);
        assert_eq!(
            candidates,
            vec![ScoredItem::new(7, 0.9), ScoredItem::new(3, 0.4)]
        );
    }

    #[test]
    fn store_failure_yields_no_candidates() {
        let mut store = MockRecommenderStore::new();
        store
            .expect_get_collaborative_candidates()
            .returning(|_, _| Err(anyhow::anyhow!("no such table: similarity_pairs")));

        assert!(CollaborativeGenerator::new(&store, 20)
            .candidates(1)
            .is_empty());
    }
}
