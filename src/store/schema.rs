//! SQLite schema of the recommender database.
//!
//! Catalog tables (`genres`, `items`, `item_genres`) are static reference data.
//! `purchases` is the append-only interaction log. `similarity_pairs` is derived
//! data owned by the trainer.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use rusqlite::Connection;

/// Key in `recommender_meta` holding the active similarity model version.
pub const SIMILARITY_VERSION_KEY: &str = "similarity_version";

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ITEM_FK: ForeignKey = ForeignKey {
    foreign_table: "items",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const GENRE_FK: ForeignKey = ForeignKey {
    foreign_table: "genres",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// V 0
// =============================================================================

pub const USERS_TABLE_V_0: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", SqlType::Text),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const GENRES_TABLE_V_0: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

pub const ITEMS_TABLE_V_0: Table = Table {
    name: "items",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", SqlType::Text, non_null = true),
        sqlite_column!("artist", SqlType::Text, non_null = true),
        sqlite_column!("release_year", SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Item <-> Genre, many to many.
pub const ITEM_GENRES_TABLE_V_0: Table = Table {
    name: "item_genres",
    columns: &[
        sqlite_column!(
            "item_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ITEM_FK)
        ),
        sqlite_column!(
            "genre_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_FK)
        ),
    ],
    indices: &[("idx_item_genres_genre", "genre_id")],
    unique_constraints: &[&["item_id", "genre_id"]],
};

/// Genres declared at registration. `id` preserves the order they were recorded in.
pub const USER_GENRE_PREFERENCES_TABLE_V_0: Table = Table {
    name: "user_genre_preferences",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "genre_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_FK)
        ),
    ],
    indices: &[("idx_user_genre_preferences_user", "user_id")],
    unique_constraints: &[&["user_id", "genre_id"]],
};

pub const PURCHASES_TABLE_V_0: Table = Table {
    name: "purchases",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "item_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ITEM_FK)
        ),
        sqlite_column!(
            "timestamp",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_purchases_user", "user_id"),
        ("idx_purchases_item", "item_id"),
    ],
    unique_constraints: &[],
};

/// Item-item similarity, one row per directed pair and model version.
pub const SIMILARITY_PAIRS_TABLE_V_0: Table = Table {
    name: "similarity_pairs",
    columns: &[
        sqlite_column!("model_version", SqlType::Integer, non_null = true),
        sqlite_column!("item_a", SqlType::Integer, non_null = true),
        sqlite_column!("item_b", SqlType::Integer, non_null = true),
        sqlite_column!("score", SqlType::Real, non_null = true),
    ],
    indices: &[(
        "idx_similarity_pairs_version_item_a",
        "model_version, item_a",
    )],
    unique_constraints: &[&["model_version", "item_a", "item_b"]],
};

/// Key/value settings of the engine, such as the active similarity model.
pub const RECOMMENDER_META_TABLE_V_0: Table = Table {
    name: "recommender_meta",
    columns: &[
        sqlite_column!("key", SqlType::Text, is_primary_key = true),
        sqlite_column!("value", SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const RECOMMENDER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USERS_TABLE_V_0,
        GENRES_TABLE_V_0,
        ITEMS_TABLE_V_0,
        ITEM_GENRES_TABLE_V_0,
        USER_GENRE_PREFERENCES_TABLE_V_0,
        PURCHASES_TABLE_V_0,
        SIMILARITY_PAIRS_TABLE_V_0,
        RECOMMENDER_META_TABLE_V_0,
    ],
    migration: None,
}];

/// Fills the rows a freshly created database needs. Idempotent.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO recommender_meta (key, value) VALUES (?1, '0')",
        [SIMILARITY_VERSION_KEY],
    )?;
    Ok(())
}
