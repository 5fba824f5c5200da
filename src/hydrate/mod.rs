//! Lazy, coalesced hydration of values shared across table queries
//!
//! # Module Structure
//!
//! - [`key`] - Cache key derivation from the query context
//! - [`cache`] - Single-flight keyed cache
//! - [`error`] - Error shared by every caller of a hydration attempt

pub mod cache;
pub mod error;
pub mod key;

pub use cache::HydrationCache;
pub use error::HydrateError;
pub use key::{derive_key, CacheKey, QueryContext, GLOBAL_REGION};
