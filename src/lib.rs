//! Hybrid album recommender.
//!
//! The library exposes the engine and its SQLite persistence for the
//! `recommender` binary and for integration tests.

pub mod config;
pub mod evaluation;
pub mod recommender;
pub mod sqlite_persistence;
pub mod store;

pub use config::{AppConfig, RecommenderSettings};
pub use evaluation::{EvaluationReport, EvaluationSettings, HoldoutEvaluator};
pub use recommender::{Recommendation, Recommender, RecommenderError, TrainingOutcome};
pub use store::{RecommenderStore, SqliteRecommenderStore};
