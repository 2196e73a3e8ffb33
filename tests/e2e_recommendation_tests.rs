//! End-to-end tests of the recommender over a real SQLite database.

mod common;

use album_recommender::evaluation::{EvaluationSettings, HoldoutEvaluator};
use album_recommender::recommender::{RankingSignal, TrainingOutcome};
use album_recommender::{Recommender, RecommenderSettings};
use album_recommender::store::{
    CatalogSeed, GenreSeed, ItemId, ItemSeed, RecommenderStore, SimilarityPair,
};
use common::*;
use std::collections::{HashMap, HashSet};

fn ids(env: &TestEnv, user_id: i64, k: usize) -> Vec<ItemId> {
    env.recommender
        .recommend(user_id, k)
        .into_iter()
        .map(|r| r.item_id)
        .collect()
}

fn sorted_pairs(mut pairs: Vec<SimilarityPair>) -> Vec<SimilarityPair> {
    pairs.sort_by(|a, b| (a.item_a, a.item_b).cmp(&(b.item_a, b.item_b)));
    pairs
}

#[test]
fn test_new_rock_fan_gets_rock_best_sellers() {
    let env = TestEnv::new();
    let seed = CatalogSeed {
        genres: vec![
            GenreSeed {
                id: ROCK,
                name: "Rock".to_string(),
            },
            GenreSeed {
                id: JAZZ,
                name: "Jazz".to_string(),
            },
        ],
        items: [(1, ROCK), (2, ROCK), (3, ROCK), (4, JAZZ)]
            .into_iter()
            .map(|(id, genre_id)| ItemSeed {
                id,
                title: format!("Album {}", id),
                artist: "Band".to_string(),
                release_year: None,
                genre_ids: vec![genre_id],
            })
            .collect(),
    };
    env.store.import_catalog(&seed).unwrap();
    env.sell(&[(1, 10), (2, 5), (3, 1), (4, 20)]);

    let new_user = env.user(&[ROCK]);
    let recommendations = env.recommender.recommend(new_user, 2);

    assert_eq!(
        recommendations.iter().map(|r| r.item_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(
        recommendations[0].signal,
        RankingSignal::Popularity { sales: 10 }
    );
    assert_eq!(
        recommendations[1].signal,
        RankingSignal::Popularity { sales: 5 }
    );
    assert_eq!(
        recommendations[0].details.as_ref().map(|d| d.title.as_str()),
        Some("Album 1")
    );
}

#[test]
fn test_cold_start_alternates_between_declared_genres() {
    let env = TestEnv::with_catalog();
    // Make jazz far more popular than rock: an ordering by sales alone
    // would never reach rock within the first four results.
    env.sell(&[
        (201, 9),
        (202, 8),
        (203, 7),
        (204, 6),
        (101, 2),
        (102, 1),
    ]);

    let user_id = env.user(&[JAZZ, ROCK]);
    let picks = ids(&env, user_id, 4);

    assert_eq!(picks.len(), 4);
    assert_eq!(picks, vec![201, 101, 202, 102]);
    let genres: Vec<Vec<i64>> = picks.iter().map(|id| env.genres_of(*id)).collect();
    assert!(genres.iter().any(|g| g.contains(&JAZZ)));
    assert!(genres.iter().any(|g| g.contains(&ROCK)));
}

#[test]
fn test_cold_start_without_genres_is_popularity() {
    let env = TestEnv::with_catalog();
    env.sell(&[(302, 4), (104, 3), (203, 1)]);

    let user_id = env.user(&[]);
    assert_eq!(ids(&env, user_id, 3), vec![302, 104, 203]);
}

#[test]
fn test_cold_start_tops_up_from_popularity() {
    let env = TestEnv::with_catalog();
    env.sell(&[(302, 5), (301, 4)]);

    // Pop has three items; the other two slots come from the global ranking.
    let user_id = env.user(&[POP]);
    let picks = ids(&env, user_id, 5);

    assert_eq!(picks.len(), 5);
    assert_eq!(&picks[..3], &[302, 301, 303]);
    let distinct: HashSet<ItemId> = picks.iter().copied().collect();
    assert_eq!(distinct.len(), 5);
}

#[test]
fn test_unknown_user_is_served_like_a_new_user() {
    let env = TestEnv::with_catalog();
    env.sell(&[(203, 3), (101, 2)]);

    assert!(!env.recommender.user_exists(9999).unwrap());
    assert_eq!(ids(&env, 9999, 2), vec![203, 101]);
}

#[test]
fn test_recommendations_never_include_purchased_items() {
    let env = TestEnv::with_catalog();
    let users = env.seed_listeners();
    env.recommender.train().unwrap();

    for user_id in users {
        let owned: HashSet<ItemId> = env
            .store
            .get_purchased_item_ids(user_id)
            .unwrap()
            .into_iter()
            .collect();
        for k in [1, 3, 5, 20] {
            let picks = ids(&env, user_id, k);
            assert!(picks.len() <= k);
            assert!(!picks.is_empty(), "user {} got nothing for k={}", user_id, k);
            for item_id in &picks {
                assert!(
                    !owned.contains(item_id),
                    "user {} was recommended owned item {}",
                    user_id,
                    item_id
                );
            }
        }
    }
}

#[test]
fn test_buyer_recommendations_are_hybrid_and_favor_their_genres() {
    let env = TestEnv::with_catalog();
    env.seed_listeners();
    let rock_buyer = env.user(&[ROCK]);
    env.buy(rock_buyer, &[101, 102]);
    env.recommender.train().unwrap();

    let recommendations = env.recommender.recommend(rock_buyer, 3);

    assert!(!recommendations.is_empty());
    assert!(recommendations
        .iter()
        .all(|r| matches!(r.signal, RankingSignal::Hybrid { .. })));
    assert!(env
        .genres_of(recommendations[0].item_id)
        .contains(&ROCK));
    let scores: Vec<f64> = recommendations
        .iter()
        .filter_map(|r| match r.signal {
            RankingSignal::Hybrid { score } => Some(score),
            RankingSignal::Popularity { .. } => None,
        })
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_fallback_serves_buyer_without_candidates() {
    let env = TestEnv::with_catalog();
    env.sell(&[(202, 3), (303, 2)]);

    // Nobody else bought the untagged album and it has no genres, so neither
    // generator has anything to offer.
    let user_id = env.user(&[]);
    env.buy(user_id, &[UNTAGGED_ITEM]);
    env.recommender.train().unwrap();

    let recommendations = env.recommender.recommend(user_id, 2);
    assert_eq!(
        recommendations.iter().map(|r| r.item_id).collect::<Vec<_>>(),
        vec![202, 303]
    );
    assert!(recommendations
        .iter()
        .all(|r| matches!(r.signal, RankingSignal::Popularity { .. })));
}

#[test]
fn test_recommendations_run_out_only_with_the_catalog() {
    let env = TestEnv::with_catalog();
    let everything: Vec<ItemId> = test_catalog().items.iter().map(|i| i.id).collect();
    let collector = env.user(&[ROCK]);
    env.buy(collector, &everything[..everything.len() - 1]);
    env.recommender.train().unwrap();

    let last = *everything.last().unwrap();
    assert_eq!(ids(&env, collector, 5), vec![last]);

    env.buy(collector, &[last]);
    env.recommender.train().unwrap();
    assert!(ids(&env, collector, 5).is_empty());
}

#[test]
fn test_training_is_idempotent_symmetric_and_has_no_self_pairs() {
    let env = TestEnv::with_catalog();
    env.seed_listeners();

    let first = env.recommender.train().unwrap();
    let first_pairs = sorted_pairs(env.store.get_similarity_pairs().unwrap());
    let second = env.recommender.train().unwrap();
    let second_pairs = sorted_pairs(env.store.get_similarity_pairs().unwrap());

    let (TrainingOutcome::Trained(first), TrainingOutcome::Trained(second)) = (first, second)
    else {
        panic!("both runs should train");
    };
    assert!(second.model_version > first.model_version);
    assert_eq!(first.pairs, first_pairs.len());
    assert!(!first_pairs.is_empty());

    assert_eq!(first_pairs.len(), second_pairs.len());
    for (a, b) in first_pairs.iter().zip(second_pairs.iter()) {
        assert_eq!((a.item_a, a.item_b), (b.item_a, b.item_b));
        assert!((a.score - b.score).abs() < 1e-12);
    }

    let by_pair: HashMap<(ItemId, ItemId), f64> = second_pairs
        .iter()
        .map(|p| ((p.item_a, p.item_b), p.score))
        .collect();
    for pair in &second_pairs {
        assert_ne!(pair.item_a, pair.item_b);
        assert!(pair.score > 0.0 && pair.score <= 1.0 + 1e-12);
        let reverse = by_pair[&(pair.item_b, pair.item_a)];
        assert!((pair.score - reverse).abs() < 1e-12);
    }
}

#[test]
fn test_training_without_purchases_is_a_no_op() {
    let env = TestEnv::with_catalog();
    assert_eq!(env.recommender.train().unwrap(), TrainingOutcome::Skipped);
    assert!(env.store.get_similarity_pairs().unwrap().is_empty());
}

#[test]
fn test_record_purchase_refreshes_the_model() {
    let env = TestEnv::with_catalog();
    let alice = env.user(&[ROCK]);
    let bob = env.user(&[ROCK]);

    assert!(env.recommender.record_purchase(alice, 101));
    assert!(env.recommender.record_purchase(alice, 102));
    assert!(env.recommender.record_purchase(bob, 101));

    let pairs = env.store.get_similarity_pairs().unwrap();
    let score = pairs
        .iter()
        .find(|p| p.item_a == 101 && p.item_b == 102)
        .map(|p| p.score)
        .unwrap();
    // Buyers of 101: {alice, bob}; buyers of 102: {alice}.
    assert!((score - 1.0 / 2f64.sqrt()).abs() < 1e-12);

    // Bob now gets 102 through the collaborative signal.
    assert!(ids(&env, bob, 3).contains(&102));
}

#[test]
fn test_record_purchase_rejects_unknown_user_or_item() {
    let env = TestEnv::with_catalog();
    let user_id = env.user(&[]);

    assert!(!env.recommender.record_purchase(user_id, 999));
    assert!(!env.recommender.record_purchase(999, 101));
    assert_eq!(env.store.count_user_purchases(user_id).unwrap(), 0);
}

#[test]
fn test_create_user_rejects_unknown_genres() {
    let env = TestEnv::with_catalog();
    assert!(env.recommender.create_user(None, vec![ROCK, 77]).is_err());

    let user_id = env.user(&[POP, ROCK]);
    assert_eq!(
        env.store.get_user_preferred_genres(user_id).unwrap(),
        vec![POP, ROCK]
    );
}

#[test]
fn test_evaluation_restores_every_held_out_purchase() {
    let env = TestEnv::with_catalog();
    let users = env.seed_listeners();
    let histories_before: Vec<_> = users
        .iter()
        .map(|u| env.store.get_user_purchase_history(*u).unwrap())
        .collect();

    let report = HoldoutEvaluator::new(
        &env.recommender,
        EvaluationSettings {
            test_proportion: 0.2,
            min_history: 5,
        },
    )
    .run()
    .unwrap();

    // rock_fan, jazz_fan and pop_fan have at least five purchases.
    assert_eq!(report.users_evaluated, 3);
    assert_eq!(report.users_with_genre_preferences, 3);
    assert_eq!(report.catalog_size, CATALOG_SIZE);
    assert!(report.mean_jaccard >= 0.0 && report.mean_jaccard <= 1.0);
    assert!(report.hit_rate >= 0.0 && report.hit_rate <= 1.0);
    assert!(report.catalog_coverage_percent > 0.0);
    assert!(report.latency.min_ms <= report.latency.max_ms);

    let histories_after: Vec<_> = users
        .iter()
        .map(|u| env.store.get_user_purchase_history(*u).unwrap())
        .collect();
    assert_eq!(histories_before, histories_after);
    assert!(!env.store.get_similarity_pairs().unwrap().is_empty());
}

#[test]
fn test_huge_k_serves_the_whole_catalog_without_crashing() {
    let env = TestEnv::with_catalog();
    env.sell(&[(101, 3), (201, 2)]);
    let newcomer = env.user(&[ROCK, JAZZ]);
    let buyer = env.user(&[ROCK]);
    env.buy(buyer, &[UNTAGGED_ITEM]);
    env.recommender.train().unwrap();

    for k in [usize::MAX, 1 << 40] {
        assert_eq!(ids(&env, newcomer, k).len(), CATALOG_SIZE);
        let picks = ids(&env, buyer, k);
        assert_eq!(picks.len(), CATALOG_SIZE - 1);
        assert!(!picks.contains(&UNTAGGED_ITEM));
    }
}

#[test]
fn test_concurrent_retraining_keeps_one_consistent_model() {
    let env = TestEnv::with_catalog();
    env.seed_listeners();
    env.recommender.train().unwrap();
    let expected = sorted_pairs(env.store.get_similarity_pairs().unwrap());

    let recommender = Recommender::new(
        env.store.clone(),
        RecommenderSettings {
            similarity_insert_batch_size: 1,
            ..RecommenderSettings::default()
        },
    );
    for _ in 0..10 {
        std::thread::scope(|scope| {
            scope.spawn(|| recommender.train().unwrap());
            scope.spawn(|| recommender.train().unwrap());
        });
        let pairs = sorted_pairs(env.store.get_similarity_pairs().unwrap());
        assert_eq!(pairs.len(), expected.len());
        for (a, b) in pairs.iter().zip(expected.iter()) {
            assert_eq!((a.item_a, a.item_b), (b.item_a, b.item_b));
            assert!((a.score - b.score).abs() < 1e-12);
        }
    }
}

