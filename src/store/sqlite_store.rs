use super::models::{
    CatalogSeed, GenreId, ItemDetails, ItemId, ItemSales, Purchase, SimilarityPair, UserId,
};
use super::schema::{seed_defaults, RECOMMENDER_VERSIONED_SCHEMAS, SIMILARITY_VERSION_KEY};
use super::trait_def::{NewUser, RecommenderStore};
use crate::sqlite_persistence::Database;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const ACTIVE_VERSION_SQL: &str =
    "SELECT CAST(value AS INTEGER) FROM recommender_meta WHERE key = ?1";

/// Most rows a single similarity insert can carry: four bound values per row
/// within SQLite's default limit of 32766 variables.
pub const MAX_SIMILARITY_INSERT_BATCH: usize = 32766 / 4;

/// `?, ?, ?` with `count` placeholders, for `IN (...)` lists.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// A `LIMIT` value; counts beyond `i64::MAX` mean "everything".
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn item_sales(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemSales> {
    Ok(ItemSales {
        item_id: row.get(0)?,
        sales: row.get::<_, i64>(1)? as u64,
    })
}

#[derive(Clone)]
pub struct SqliteRecommenderStore {
    db: Database,
}

impl SqliteRecommenderStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let db = Database::open(db_path, RECOMMENDER_VERSIONED_SCHEMAS)?;
        db.transaction(|tx| seed_defaults(tx))?;
        Ok(SqliteRecommenderStore { db })
    }
}

impl RecommenderStore for SqliteRecommenderStore {
    fn user_exists(&self, user_id: UserId) -> Result<bool> {
        let exists = self
            .db
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )?
            .unwrap_or(0);
        Ok(exists == 1)
    }

    fn count_user_purchases(&self, user_id: UserId) -> Result<usize> {
        let count = self
            .db
            .query_one(
                "SELECT COUNT(*) FROM purchases WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )?
            .unwrap_or(0);
        Ok(count as usize)
    }

    fn get_purchased_item_ids(&self, user_id: UserId) -> Result<Vec<ItemId>> {
        self.db.query(
            "SELECT DISTINCT item_id FROM purchases WHERE user_id = ?1 ORDER BY item_id",
            params![user_id],
            |row| row.get(0),
        )
    }

    fn get_all_purchase_pairs(&self) -> Result<Vec<(UserId, ItemId)>> {
        self.db.query(
            "SELECT user_id, item_id FROM purchases",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    fn get_user_preferred_genres(&self, user_id: UserId) -> Result<Vec<GenreId>> {
        self.db.query(
            "SELECT genre_id FROM user_genre_preferences WHERE user_id = ?1 ORDER BY id",
            params![user_id],
            |row| row.get(0),
        )
    }

    fn get_item_genre_assignments(&self) -> Result<Vec<(ItemId, GenreId)>> {
        self.db.query(
            "SELECT item_id, genre_id FROM item_genres ORDER BY item_id, genre_id",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    fn get_genres_of_items(&self, item_ids: &[ItemId]) -> Result<Vec<(ItemId, GenreId)>> {
        if item_ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT item_id, genre_id FROM item_genres WHERE item_id IN ({})",
            placeholders(item_ids.len())
        );
        self.db.query(&sql, params_from_iter(item_ids.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
    }

    fn get_top_selling_items_in_genre(
        &self,
        genre_id: GenreId,
        limit: usize,
    ) -> Result<Vec<ItemSales>> {
        self.db.query(
            "SELECT i.id, COUNT(p.id) AS sales
             FROM items i
             JOIN item_genres ig ON ig.item_id = i.id
             LEFT JOIN purchases p ON p.item_id = i.id
             WHERE ig.genre_id = ?1
             GROUP BY i.id
             ORDER BY sales DESC, i.id ASC
             LIMIT ?2",
            params![genre_id, sql_limit(limit)],
            item_sales,
        )
    }

    fn get_top_selling_items(&self, limit: usize) -> Result<Vec<ItemSales>> {
        self.db.query(
            "SELECT i.id, COUNT(p.id) AS sales
             FROM items i
             LEFT JOIN purchases p ON p.item_id = i.id
             GROUP BY i.id
             ORDER BY sales DESC, i.id ASC
             LIMIT ?1",
            params![sql_limit(limit)],
            item_sales,
        )
    }

    fn get_items_details(&self, item_ids: &[ItemId]) -> Result<Vec<ItemDetails>> {
        if item_ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT id, title, artist, release_year FROM items WHERE id IN ({})",
            placeholders(item_ids.len())
        );
        self.db.query(&sql, params_from_iter(item_ids.iter()), |row| {
            Ok(ItemDetails {
                item_id: row.get(0)?,
                title: row.get(1)?,
                artist: row.get(2)?,
                release_year: row.get(3)?,
            })
        })
    }

    fn count_items(&self) -> Result<usize> {
        let count = self
            .db
            .query_one("SELECT COUNT(*) FROM items", [], |row| row.get::<_, i64>(0))?
            .unwrap_or(0);
        Ok(count as usize)
    }

    fn get_collaborative_candidates(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<(ItemId, f64)>> {
        self.db.query(
            "SELECT sp.item_b, AVG(sp.score) AS cf_score
             FROM (SELECT DISTINCT item_id FROM purchases WHERE user_id = ?1) owned
             JOIN similarity_pairs sp ON sp.item_a = owned.item_id
             WHERE sp.model_version = (
                 SELECT CAST(value AS INTEGER) FROM recommender_meta WHERE key = ?2
             )
             AND sp.item_b NOT IN (SELECT item_id FROM purchases WHERE user_id = ?1)
             GROUP BY sp.item_b
             ORDER BY cf_score DESC, sp.item_b ASC
             LIMIT ?3",
            params![user_id, SIMILARITY_VERSION_KEY, sql_limit(limit)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    fn get_similarity_pairs(&self) -> Result<Vec<SimilarityPair>> {
        self.db.query(
            "SELECT item_a, item_b, score FROM similarity_pairs
             WHERE model_version = (
                 SELECT CAST(value AS INTEGER) FROM recommender_meta WHERE key = ?1
             )
             ORDER BY item_a, item_b",
            params![SIMILARITY_VERSION_KEY],
            |row| {
                Ok(SimilarityPair {
                    item_a: row.get(0)?,
                    item_b: row.get(1)?,
                    score: row.get(2)?,
                })
            },
        )
    }

    fn replace_similarity_model(
        &self,
        pairs: &[SimilarityPair],
        batch_size: usize,
    ) -> Result<i64> {
        let batch_size = batch_size.clamp(1, MAX_SIMILARITY_INSERT_BATCH);
        // Concurrent trainers serialize here, each building on the last activated version.
        self.db.transaction(|tx| {
            let active = tx
                .query_row(ACTIVE_VERSION_SQL, params![SIMILARITY_VERSION_KEY], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
                .unwrap_or(0);

            // Rows left behind by a run that failed before switching versions.
            let stale = tx.execute(
                "DELETE FROM similarity_pairs WHERE model_version <> ?1",
                params![active],
            )?;
            if stale > 0 {
                debug!("Purged {} similarity rows of an unfinished model", stale);
            }

            let next = active + 1;
            for chunk in pairs.chunks(batch_size) {
                let sql = format!(
                    "INSERT INTO similarity_pairs (model_version, item_a, item_b, score) VALUES {}",
                    vec!["(?, ?, ?, ?)"; chunk.len()].join(", ")
                );
                let values = chunk.iter().flat_map(|pair| {
                    [
                        Value::Integer(next),
                        Value::Integer(pair.item_a),
                        Value::Integer(pair.item_b),
                        Value::Real(pair.score),
                    ]
                });
                tx.execute(&sql, params_from_iter(values)).map_err(|e| {
                    // The full error text can embed the whole statement.
                    let cause = e
                        .sqlite_error()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "statement failed".to_string());
                    anyhow!(
                        "Failed to insert {} rows of similarity model {}: {}",
                        chunk.len(),
                        next,
                        cause
                    )
                })?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO recommender_meta (key, value) VALUES (?1, ?2)",
                params![SIMILARITY_VERSION_KEY, next.to_string()],
            )?;
            tx.execute(
                "DELETE FROM similarity_pairs WHERE model_version <> ?1",
                params![next],
            )?;
            Ok(next)
        })
    }

    fn create_user(&self, user: &NewUser) -> Result<UserId> {
        self.db
            .transaction(|tx| {
                let user_id: UserId = tx.query_row(
                    "INSERT INTO users (name) VALUES (?1) RETURNING id",
                    params![user.name],
                    |row| row.get(0),
                )?;
                for genre_id in &user.preferred_genre_ids {
                    tx.execute(
                        "INSERT OR IGNORE INTO user_genre_preferences (user_id, genre_id) VALUES (?1, ?2)",
                        params![user_id, genre_id],
                    )?;
                }
                Ok(user_id)
            })
            .context("Failed to create user")
    }

    fn insert_purchase(&self, user_id: UserId, item_id: ItemId) -> Result<usize> {
        self.db
            .execute(
                "INSERT INTO purchases (user_id, item_id) VALUES (?1, ?2)",
                params![user_id, item_id],
            )
            .with_context(|| {
                format!("Failed to record purchase of item {} by user {}", item_id, user_id)
            })
    }

    fn import_catalog(&self, seed: &CatalogSeed) -> Result<usize> {
        let imported = self.db.transaction(|tx| {
            for genre in &seed.genres {
                tx.execute(
                    "INSERT INTO genres (id, name) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                    params![genre.id, genre.name],
                )?;
            }
            for item in &seed.items {
                tx.execute(
                    "INSERT INTO items (id, title, artist, release_year) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        artist = excluded.artist,
                        release_year = excluded.release_year",
                    params![item.id, item.title, item.artist, item.release_year],
                )?;
                for genre_id in &item.genre_ids {
                    tx.execute(
                        "INSERT OR IGNORE INTO item_genres (item_id, genre_id) VALUES (?1, ?2)",
                        params![item.id, genre_id],
                    )
                    .with_context(|| {
                        format!("Item {} references unknown genre {}", item.id, genre_id)
                    })?;
                }
            }
            Ok(seed.items.len())
        })?;
        info!(
            "Imported {} genres and {} items",
            seed.genres.len(),
            imported
        );
        Ok(imported)
    }

    fn get_users_with_min_purchases(&self, min_purchases: usize) -> Result<Vec<UserId>> {
        self.db.query(
            "SELECT user_id FROM purchases
             GROUP BY user_id
             HAVING COUNT(*) >= ?1
             ORDER BY user_id",
            params![min_purchases as i64],
            |row| row.get(0),
        )
    }

    fn get_user_purchase_history(&self, user_id: UserId) -> Result<Vec<Purchase>> {
        self.db.query(
            "SELECT id, user_id, item_id, timestamp FROM purchases
             WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC",
            params![user_id],
            |row| {
                Ok(Purchase {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    item_id: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            },
        )
    }

    fn delete_purchases(&self, user_id: UserId, purchase_ids: &[i64]) -> Result<usize> {
        if purchase_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM purchases WHERE user_id = ? AND id IN ({})",
            placeholders(purchase_ids.len())
        );
        let values = std::iter::once(user_id).chain(purchase_ids.iter().copied());
        self.db.execute(&sql, params_from_iter(values))
    }

    fn restore_purchases(&self, purchases: &[Purchase]) -> Result<usize> {
        self.db.transaction(|tx| {
            let mut restored = 0;
            for purchase in purchases {
                restored += tx.execute(
                    "INSERT INTO purchases (id, user_id, item_id, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        purchase.id,
                        purchase.user_id,
                        purchase.item_id,
                        purchase.timestamp
                    ],
                )?;
            }
            Ok(restored)
        })
    }
}
