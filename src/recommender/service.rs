use super::cold_start::{ColdStartGenerator, PopularityFallback};
use super::collaborative::CollaborativeGenerator;
use super::content::ContentGenerator;
use super::degraded;
use super::error::RecommenderError;
use super::hybrid::{exclude_purchased, select_weights, HybridCombiner};
use super::models::{RankedItem, Recommendation, Strategy};
use super::trainer::{SimilarityTrainer, TrainingOutcome};
use crate::config::RecommenderSettings;
use crate::store::{GenreId, ItemDetails, ItemId, NewUser, RecommenderStore, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Entry point of the engine: registers users, records purchases and
/// produces ranked recommendations.
#[derive(Clone)]
pub struct Recommender {
    store: Arc<dyn RecommenderStore>,
    settings: RecommenderSettings,
}

impl Recommender {
    pub fn new(store: Arc<dyn RecommenderStore>, settings: RecommenderSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RecommenderSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn RecommenderStore {
        self.store.as_ref()
    }

    /// Rebuilds the similarity model from the purchase log.
    pub fn train(&self) -> Result<TrainingOutcome, RecommenderError> {
        SimilarityTrainer::new(
            self.store.as_ref(),
            self.settings.similarity_insert_batch_size,
        )
        .run()
    }

    /// Registers a user with the genres they declared, in that order.
    pub fn create_user(
        &self,
        name: Option<String>,
        preferred_genre_ids: Vec<GenreId>,
    ) -> Result<UserId, RecommenderError> {
        let genre_count = preferred_genre_ids.len();
        let user_id = self.store.create_user(&NewUser {
            name,
            preferred_genre_ids,
        })?;
        info!(
            "Created user {} with {} preferred genres",
            user_id, genre_count
        );
        Ok(user_id)
    }

    pub fn user_exists(&self, user_id: UserId) -> Result<bool, RecommenderError> {
        Ok(self.store.user_exists(user_id)?)
    }

    /// Appends a purchase and retrains the similarity model.
    ///
    /// Returns `false` when the purchase could not be stored. A failed
    /// retrain is logged and does not affect the result.
    pub fn record_purchase(&self, user_id: UserId, item_id: ItemId) -> bool {
        match self.store.insert_purchase(user_id, item_id) {
            Ok(0) => {
                warn!(
                    "Purchase of item {} by user {} inserted no row",
                    item_id, user_id
                );
                return false;
            }
            Ok(_) => {
                debug!("Recorded purchase of item {} by user {}", item_id, user_id);
            }
            Err(e) => {
                warn!(
                    "Failed to record purchase of item {} by user {}: {:#}",
                    item_id, user_id, e
                );
                return false;
            }
        }

        if let Err(e) = self.train() {
            error!("Retraining after purchase failed: {}", e);
        }
        true
    }

    /// Up to `k` recommendations for the user, best first.
    ///
    /// Never fails: store errors shrink the candidate pools, and the
    /// popularity ranking backs up an empty hybrid result. Unknown users get
    /// the cold-start path.
    pub fn recommend(&self, user_id: UserId, k: usize) -> Vec<Recommendation> {
        let purchase_count = degraded(
            self.store.count_user_purchases(user_id),
            "purchase count",
        );

        let (strategy, ranked) = if purchase_count == 0 {
            let picks = ColdStartGenerator::new(self.store.as_ref()).recommend(user_id, k);
            (
                Strategy::ColdStart,
                picks.into_iter().map(RankedItem::from).collect::<Vec<_>>(),
            )
        } else {
            self.rank_for_buyer(user_id, purchase_count, k)
        };

        info!(
            "User {}: {} recommendations via {}",
            user_id,
            ranked.len(),
            strategy.as_str()
        );
        self.attach_details(ranked)
    }

    fn rank_for_buyer(
        &self,
        user_id: UserId,
        purchase_count: usize,
        k: usize,
    ) -> (Strategy, Vec<RankedItem>) {
        let store = self.store.as_ref();
        let settings = &self.settings;

        let collaborative = CollaborativeGenerator::new(store, settings.collaborative_candidate_limit)
            .candidates(user_id);
        let content =
            ContentGenerator::new(store, settings.content_similarity_threshold).candidates(user_id);
        let weights = select_weights(&settings.weight_tiers, purchase_count);
        debug!(
            "User {}: {} purchases, weights cf={} cbf={}",
            user_id, purchase_count, weights.cf, weights.cbf
        );

        let combined = HybridCombiner::new(store, settings.boost_value).combine(
            user_id,
            &collaborative,
            &content,
            weights,
        );
        let purchased: HashSet<ItemId> =
            degraded(store.get_purchased_item_ids(user_id), "purchased items")
                .into_iter()
                .collect();
        let mut filtered = exclude_purchased(combined, &purchased);

        if filtered.is_empty() {
            // Over-fetch by the number of owned items so k survive the filter.
            let picks: Vec<RankedItem> = PopularityFallback::new(store)
                .top(k.saturating_add(purchased.len()))
                .into_iter()
                .filter(|item| !purchased.contains(&item.item_id))
                .take(k)
                .map(RankedItem::from)
                .collect();
            return (Strategy::PopularityFallback, picks);
        }

        filtered.truncate(k);
        (
            Strategy::Hybrid,
            filtered.into_iter().map(RankedItem::from).collect(),
        )
    }

    /// Resolves catalog details in one round trip. Items the catalog does
    /// not know keep their rank with no details.
    fn attach_details(&self, ranked: Vec<RankedItem>) -> Vec<Recommendation> {
        if ranked.is_empty() {
            return vec![];
        }
        let item_ids: Vec<ItemId> = ranked.iter().map(|item| item.item_id).collect();
        let mut details: HashMap<ItemId, ItemDetails> =
            degraded(self.store.get_items_details(&item_ids), "item details")
                .into_iter()
                .map(|d| (d.item_id, d))
                .collect();

        ranked
            .into_iter()
            .map(|item| {
                let item_details = details.remove(&item.item_id);
                if item_details.is_none() {
                    warn!("Item {} has no catalog details", item.item_id);
                }
                Recommendation {
                    item_id: item.item_id,
                    signal: item.signal,
                    details: item_details,
                }
            })
            .collect()
    }
}
