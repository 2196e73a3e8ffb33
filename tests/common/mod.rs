//! Shared fixtures for the end-to-end tests.
//!
//! Tests import from this module only:
//!
//! ```no_run
//! mod common;
//! use common::{TestEnv, ROCK};
//!
//! let env = TestEnv::with_catalog();
//! let user_id = env.user(&[ROCK]);
//! let recommendations = env.recommender.recommend(user_id, 3);
//! ```

mod constants;
mod fixtures;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{test_catalog, TestEnv};
