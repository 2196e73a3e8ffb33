//! RecommenderStore trait definition.
//!
//! Every round trip the engine makes to persistence goes through this trait.
//! Reads map onto the "query returning rows" primitive and writes onto the
//! "write returning affected rows" primitive of [`crate::sqlite_persistence::Database`].

use super::models::{
    CatalogSeed, GenreId, ItemDetails, ItemId, ItemSales, Purchase, SimilarityPair, UserId,
};
use anyhow::Result;

/// A user registration: optional display name and the genres declared up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: Option<String>,
    pub preferred_genre_ids: Vec<GenreId>,
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait RecommenderStore: Send + Sync {
    // =========================================================================
    // Users and purchases
    // =========================================================================

    /// Returns whether a user with the given id was ever registered.
    fn user_exists(&self, user_id: UserId) -> Result<bool>;

    /// Returns the number of purchase rows of the user, repeated purchases included.
    fn count_user_purchases(&self, user_id: UserId) -> Result<usize>;

    /// Returns the distinct items the user purchased.
    fn get_purchased_item_ids(&self, user_id: UserId) -> Result<Vec<ItemId>>;

    /// Returns every (user, item) purchase pair of the log.
    fn get_all_purchase_pairs(&self) -> Result<Vec<(UserId, ItemId)>>;

    /// Returns the genres the user declared, in the order they were recorded.
    fn get_user_preferred_genres(&self, user_id: UserId) -> Result<Vec<GenreId>>;

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Returns every (item, genre) assignment of the catalog.
    fn get_item_genre_assignments(&self) -> Result<Vec<(ItemId, GenreId)>>;

    /// Returns the (item, genre) assignments of the given items.
    fn get_genres_of_items(&self, item_ids: &[ItemId]) -> Result<Vec<(ItemId, GenreId)>>;

    /// Returns up to `limit` items tagged with the genre, best sellers first.
    fn get_top_selling_items_in_genre(
        &self,
        genre_id: GenreId,
        limit: usize,
    ) -> Result<Vec<ItemSales>>;

    /// Returns up to `limit` catalog items, best sellers first. Items never
    /// purchased are included after every purchased one.
    fn get_top_selling_items(&self, limit: usize) -> Result<Vec<ItemSales>>;

    /// Returns the details of the given items. Unknown ids are skipped.
    fn get_items_details(&self, item_ids: &[ItemId]) -> Result<Vec<ItemDetails>>;

    /// Returns the number of items in the catalog.
    fn count_items(&self) -> Result<usize>;

    // =========================================================================
    // Similarity model
    // =========================================================================

    /// Returns up to `limit` items related to the user's purchases in the
    /// active similarity model, excluding items the user already purchased.
    /// Each score is the average similarity over the user's distinct purchased
    /// items related to the candidate. Ordered by score, highest first.
    fn get_collaborative_candidates(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<(ItemId, f64)>>;

    /// Returns every pair of the active similarity model.
    fn get_similarity_pairs(&self) -> Result<Vec<SimilarityPair>>;

    /// Writes `pairs` as a new model version in chunks of `batch_size` rows,
    /// then makes it the active one. Returns the new version.
    fn replace_similarity_model(&self, pairs: &[SimilarityPair], batch_size: usize)
        -> Result<i64>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a user with their preferred genres and returns the new id.
    fn create_user(&self, user: &NewUser) -> Result<UserId>;

    /// Appends a purchase to the log. Returns the number of inserted rows.
    fn insert_purchase(&self, user_id: UserId, item_id: ItemId) -> Result<usize>;

    /// Loads catalog reference data. Returns the number of items imported.
    fn import_catalog(&self, seed: &CatalogSeed) -> Result<usize>;

    // =========================================================================
    // Evaluation support
    // =========================================================================

    /// Returns the users with at least `min_purchases` purchases.
    fn get_users_with_min_purchases(&self, min_purchases: usize) -> Result<Vec<UserId>>;

    /// Returns the user's purchases, most recent first.
    fn get_user_purchase_history(&self, user_id: UserId) -> Result<Vec<Purchase>>;

    /// Removes the given purchases of the user. Returns the number removed.
    fn delete_purchases(&self, user_id: UserId, purchase_ids: &[i64]) -> Result<usize>;

    /// Re-inserts purchases keeping their user, item and timestamp.
    fn restore_purchases(&self, purchases: &[Purchase]) -> Result<usize>;
}
