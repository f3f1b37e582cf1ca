//! Redis-backed shared store.
//!
//! Requires the `redis` feature.

mod redis_store;
pub use redis_store::*;

pub(crate) mod scripts;
