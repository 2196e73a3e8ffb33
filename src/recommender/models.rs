use crate::store::{ItemDetails, ItemId};
use serde::Serialize;

/// A candidate item with the score of the signal that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f64,
}

impl ScoredItem {
    pub fn new(item_id: ItemId, score: f64) -> Self {
        Self { item_id, score }
    }
}

/// Sorts by score, highest first. Equal scores keep ascending item ids.
pub(crate) fn sort_by_score_desc(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}

/// Why an item ended up in a result list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingSignal {
    /// Weighted collaborative and content score, genre boost included.
    Hybrid { score: f64 },
    /// All-time sales, for cold-start and fallback results.
    Popularity { sales: u64 },
}

/// A ranked item before catalog details are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedItem {
    pub item_id: ItemId,
    pub signal: RankingSignal,
}

impl From<ScoredItem> for RankedItem {
    fn from(item: ScoredItem) -> Self {
        Self {
            item_id: item.item_id,
            signal: RankingSignal::Hybrid { score: item.score },
        }
    }
}

impl From<crate::store::ItemSales> for RankedItem {
    fn from(item: crate::store::ItemSales) -> Self {
        Self {
            item_id: item.item_id,
            signal: RankingSignal::Popularity { sales: item.sales },
        }
    }
}

/// One entry of a recommendation list.
///
/// `details` is `None` when the item id could not be resolved in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub signal: RankingSignal,
    pub details: Option<ItemDetails>,
}

/// Which path produced a recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ColdStart,
    Hybrid,
    PopularityFallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ColdStart => "cold_start",
            Strategy::Hybrid => "hybrid",
            Strategy::PopularityFallback => "popularity_fallback",
        }
    }
}
