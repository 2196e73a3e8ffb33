//! Persistence of the catalog, users, purchases and the similarity model.

mod models;
mod schema;
mod sqlite_store;
mod trait_def;

pub use models::*;
pub use schema::RECOMMENDER_VERSIONED_SCHEMAS;
pub use sqlite_store::{SqliteRecommenderStore, MAX_SIMILARITY_INSERT_BATCH};
#[cfg(any(test, feature = "mock"))]
pub use trait_def::MockRecommenderStore;
pub use trait_def::{NewUser, RecommenderStore};
