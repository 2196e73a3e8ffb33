#![allow(dead_code)]

use super::constants::*;
use album_recommender::config::RecommenderSettings;
use album_recommender::recommender::Recommender;
use album_recommender::store::{
    CatalogSeed, GenreId, GenreSeed, ItemId, ItemSeed, RecommenderStore, UserId,
};
use album_recommender::SqliteRecommenderStore;
use std::sync::Arc;
use tempfile::TempDir;

fn item(id: ItemId, genre_ids: Vec<GenreId>) -> ItemSeed {
    ItemSeed {
        id,
        title: format!("Album {}", id),
        artist: format!("Artist {}", id % 100),
        release_year: Some(1960 + (id % 60) as i32),
        genre_ids,
    }
}

/// Three genres, four albums each for Rock and Jazz, three for Pop, one
/// Rock+Jazz album and one album without genres.
pub fn test_catalog() -> CatalogSeed {
    let mut items: Vec<ItemSeed> = Vec::new();
    items.extend(ROCK_ITEMS.iter().map(|id| item(*id, vec![ROCK])));
    items.extend(JAZZ_ITEMS.iter().map(|id| item(*id, vec![JAZZ])));
    items.extend(POP_ITEMS.iter().map(|id| item(*id, vec![POP])));
    items.push(item(FUSION_ITEM, vec![ROCK, JAZZ]));
    items.push(item(UNTAGGED_ITEM, vec![]));

    CatalogSeed {
        genres: vec![
            GenreSeed {
                id: ROCK,
                name: "Rock".to_string(),
            },
            GenreSeed {
                id: JAZZ,
                name: "Jazz".to_string(),
            },
            GenreSeed {
                id: POP,
                name: "Pop".to_string(),
            },
        ],
        items,
    }
}

/// A recommender over a fresh on-disk database.
pub struct TestEnv {
    pub store: Arc<SqliteRecommenderStore>,
    pub recommender: Recommender,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteRecommenderStore::new(temp_dir.path().join("test.db")).unwrap());
        let recommender = Recommender::new(store.clone(), RecommenderSettings::default());
        TestEnv {
            store,
            recommender,
            _temp_dir: temp_dir,
        }
    }

    pub fn with_catalog() -> Self {
        let env = Self::new();
        env.store.import_catalog(&test_catalog()).unwrap();
        env
    }

    pub fn user(&self, genres: &[GenreId]) -> UserId {
        self.recommender.create_user(None, genres.to_vec()).unwrap()
    }

    /// Stores purchases without retraining.
    pub fn buy(&self, user_id: UserId, items: &[ItemId]) {
        for item_id in items {
            assert_eq!(self.store.insert_purchase(user_id, *item_id).unwrap(), 1);
        }
    }

    /// Creates a user without genres for every entry of `sales` and makes
    /// it buy that item, so each item ends up with the given sales count.
    pub fn sell(&self, sales: &[(ItemId, usize)]) {
        let max = sales.iter().map(|(_, count)| *count).max().unwrap_or(0);
        for buyer in 0..max {
            let user_id = self.user(&[]);
            let bought: Vec<ItemId> = sales
                .iter()
                .filter(|(_, count)| buyer < *count)
                .map(|(item_id, _)| *item_id)
                .collect();
            self.buy(user_id, &bought);
        }
    }

    /// Users with overlapping tastes: rock fans, jazz fans and a pop fan
    /// who also bought some rock.
    pub fn seed_listeners(&self) -> Vec<UserId> {
        let rock_fan = self.user(&[ROCK]);
        self.buy(rock_fan, &[101, 102, 103, FUSION_ITEM, 301]);
        let rock_fan_2 = self.user(&[ROCK, POP]);
        self.buy(rock_fan_2, &[101, 102, 104]);
        let jazz_fan = self.user(&[JAZZ]);
        self.buy(jazz_fan, &[201, 202, 203, FUSION_ITEM, 204, UNTAGGED_ITEM]);
        let jazz_fan_2 = self.user(&[JAZZ, ROCK]);
        self.buy(jazz_fan_2, &[201, 203, 102]);
        let pop_fan = self.user(&[POP]);
        self.buy(pop_fan, &[301, 302, 303, 101, 302]);
        vec![rock_fan, rock_fan_2, jazz_fan, jazz_fan_2, pop_fan]
    }

    pub fn genres_of(&self, item_id: ItemId) -> Vec<GenreId> {
        self.store
            .get_genres_of_items(&[item_id])
            .unwrap()
            .into_iter()
            .map(|(_, genre_id)| genre_id)
            .collect()
    }
}
