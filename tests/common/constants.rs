#![allow(dead_code)]

use album_recommender::store::{GenreId, ItemId};

pub const ROCK: GenreId = 1;
pub const JAZZ: GenreId = 2;
pub const POP: GenreId = 3;

pub const ROCK_ITEMS: [ItemId; 4] = [101, 102, 103, 104];
pub const JAZZ_ITEMS: [ItemId; 4] = [201, 202, 203, 204];
pub const POP_ITEMS: [ItemId; 3] = [301, 302, 303];

/// Tagged both Rock and Jazz.
pub const FUSION_ITEM: ItemId = 401;

/// Has no genre at all.
pub const UNTAGGED_ITEM: ItemId = 501;

pub const CATALOG_SIZE: usize = 13;
