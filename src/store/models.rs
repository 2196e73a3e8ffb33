use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ItemId = i64;
pub type GenreId = i64;

/// Descriptive attributes of a catalog item (an album).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_id: ItemId,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
}

/// An item together with its all-time purchase count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSales {
    pub item_id: ItemId,
    pub sales: u64,
}

/// A row of the purchase log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub id: i64,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub timestamp: i64,
}

/// One directed entry of the item-item similarity model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityPair {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub score: f64,
}

/// Catalog reference data, as accepted by the catalog import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub genres: Vec<GenreSeed>,
    #[serde(default)]
    pub items: Vec<ItemSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreSeed {
    pub id: GenreId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSeed {
    pub id: ItemId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genre_ids: Vec<GenreId>,
}
