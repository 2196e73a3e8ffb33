//! Temporal hold-out evaluation of the recommender.
//!
//! For every user with enough history, the most recent purchases are removed,
//! recommendations are requested with `k` equal to the number removed, and
//! the removed purchases are put back. The results are aggregated into a
//! [`EvaluationReport`].

use crate::recommender::{Recommender, TrainingOutcome};
use crate::store::{GenreId, ItemId, Purchase, RecommenderStore, UserId};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSettings {
    /// Share of each user's history held out, most recent first.
    pub test_proportion: f64,
    /// Users with fewer purchases are not evaluated.
    pub min_history: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            test_proportion: 0.2,
            min_history: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let millis: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        Self {
            mean_ms: millis.iter().sum::<f64>() / millis.len() as f64,
            min_ms: millis.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: millis.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub users_evaluated: usize,
    pub mean_jaccard: f64,
    pub hit_rate: f64,
    /// Mean over users with declared genres and a non-empty result.
    pub genre_precision: f64,
    pub users_with_genre_preferences: usize,
    pub distinct_recommended_items: usize,
    pub catalog_size: usize,
    pub catalog_coverage_percent: f64,
    pub latency: LatencySummary,
}

/// Jaccard index of two sets. Two empty sets are identical.
pub fn jaccard_index(a: &HashSet<ItemId>, b: &HashSet<ItemId>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Number of purchases held out of a history of `total`: at least one.
pub fn holdout_size(total: usize, proportion: f64) -> usize {
    ((total as f64 * proportion).ceil() as usize).clamp(1, total.max(1))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

struct UserOutcome {
    jaccard: f64,
    hit: bool,
    genre_precision: Option<f64>,
    recommended: Vec<ItemId>,
    latency: Duration,
}

pub struct HoldoutEvaluator<'a> {
    recommender: &'a Recommender,
    settings: EvaluationSettings,
}

impl<'a> HoldoutEvaluator<'a> {
    pub fn new(recommender: &'a Recommender, settings: EvaluationSettings) -> Self {
        Self {
            recommender,
            settings,
        }
    }

    fn store(&self) -> &dyn RecommenderStore {
        self.recommender.store()
    }

    pub fn run(&self) -> Result<EvaluationReport> {
        let proportion = self.settings.test_proportion;
        if !(proportion > 0.0 && proportion <= 1.0) {
            bail!("test_proportion must be in (0, 1], got {}", proportion);
        }

        let users = self
            .store()
            .get_users_with_min_purchases(self.settings.min_history)
            .context("Failed to list users to evaluate")?;
        if users.is_empty() {
            info!(
                "No user has at least {} purchases, nothing to evaluate",
                self.settings.min_history
            );
            return Ok(EvaluationReport::default());
        }

        if self.store().get_similarity_pairs()?.is_empty() {
            info!("Similarity model is empty, training before evaluation");
            if let TrainingOutcome::Trained(report) = self.recommender.train()? {
                debug!("Trained model v{} for evaluation", report.model_version);
            }
        }

        let mut jaccard_scores = Vec::with_capacity(users.len());
        let mut hits = Vec::with_capacity(users.len());
        let mut precisions = Vec::new();
        let mut latencies = Vec::with_capacity(users.len());
        let mut recommended_items: HashSet<ItemId> = HashSet::new();

        for user_id in users {
            let Some(outcome) = self.evaluate_user(user_id)? else {
                continue;
            };
            jaccard_scores.push(outcome.jaccard);
            hits.push(if outcome.hit { 1.0 } else { 0.0 });
            if let Some(precision) = outcome.genre_precision {
                precisions.push(precision);
            }
            latencies.push(outcome.latency);
            recommended_items.extend(outcome.recommended);
        }

        let catalog_size = self.store().count_items()?;
        let catalog_coverage_percent = if catalog_size == 0 {
            0.0
        } else {
            recommended_items.len() as f64 / catalog_size as f64 * 100.0
        };

        let report = EvaluationReport {
            users_evaluated: jaccard_scores.len(),
            mean_jaccard: mean(&jaccard_scores),
            hit_rate: mean(&hits),
            genre_precision: mean(&precisions),
            users_with_genre_preferences: precisions.len(),
            distinct_recommended_items: recommended_items.len(),
            catalog_size,
            catalog_coverage_percent,
            latency: LatencySummary::from_samples(&latencies),
        };
        info!(
            "Evaluated {} users: jaccard {:.4}, hit rate {:.4}, coverage {:.2}%",
            report.users_evaluated,
            report.mean_jaccard,
            report.hit_rate,
            report.catalog_coverage_percent
        );
        Ok(report)
    }

    fn evaluate_user(&self, user_id: UserId) -> Result<Option<UserOutcome>> {
        let history = self.store().get_user_purchase_history(user_id)?;
        if history.is_empty() {
            warn!("User {} has no purchase history, skipping", user_id);
            return Ok(None);
        }

        let test_size = holdout_size(history.len(), self.settings.test_proportion);
        let held_out: Vec<Purchase> = history.into_iter().take(test_size).collect();
        let purchase_ids: Vec<i64> = held_out.iter().map(|p| p.id).collect();

        let removed = self
            .store()
            .delete_purchases(user_id, &purchase_ids)
            .with_context(|| format!("Failed to hold out purchases of user {}", user_id))?;
        debug!("User {}: held out {} purchases", user_id, removed);

        let outcome = self.score_user(user_id, &held_out);

        let restored = self
            .store()
            .restore_purchases(&held_out)
            .with_context(|| format!("Failed to restore purchases of user {}", user_id))?;
        if restored != held_out.len() {
            error!(
                "User {}: restored {} of {} held-out purchases",
                user_id,
                restored,
                held_out.len()
            );
        }

        outcome.map(Some)
    }

    fn score_user(&self, user_id: UserId, held_out: &[Purchase]) -> Result<UserOutcome> {
        let start = Instant::now();
        let recommendations = self.recommender.recommend(user_id, held_out.len());
        let latency = start.elapsed();

        let recommended: Vec<ItemId> = recommendations.iter().map(|r| r.item_id).collect();
        let recommended_set: HashSet<ItemId> = recommended.iter().copied().collect();
        let test_set: HashSet<ItemId> = held_out.iter().map(|p| p.item_id).collect();

        let preferred: HashSet<GenreId> = self
            .store()
            .get_user_preferred_genres(user_id)?
            .into_iter()
            .collect();
        let genre_precision = if recommended.is_empty() || preferred.is_empty() {
            None
        } else {
            let mut genres_of: HashMap<ItemId, HashSet<GenreId>> = HashMap::new();
            for (item_id, genre_id) in self.store().get_genres_of_items(&recommended)? {
                genres_of.entry(item_id).or_default().insert(genre_id);
            }
            let matches = recommended
                .iter()
                .filter(|item_id| {
                    genres_of
                        .get(item_id)
                        .is_some_and(|genres| !genres.is_disjoint(&preferred))
                })
                .count();
            Some(matches as f64 / recommended.len() as f64)
        };

        Ok(UserOutcome {
            jaccard: jaccard_index(&recommended_set, &test_set),
            hit: !recommended_set.is_disjoint(&test_set),
            genre_precision,
            recommended,
            latency,
        })
    }
}
