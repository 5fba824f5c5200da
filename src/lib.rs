//! Coalesced hydration of the common AWS columns
//!
//! Table plugins attach `partition`, `account_id` and `region` columns to every
//! row they return. Those values come from one remote identity lookup per
//! region, which this crate performs at most once per region no matter how
//! many queries ask for it concurrently, and retries on the next query if it
//! fails.
//!
//! # Module Structure
//!
//! - [`hydrate`] - Cache keys and the single-flight [`HydrationCache`](hydrate::HydrationCache)
//! - [`aws`] - STS client, identity lookup and profile discovery
//! - [`connection`] - Per-connection caches and the identity hydrator
//! - [`table`] - Column definitions and row binding
//! - [`config`] - Persistent configuration

pub mod aws;
pub mod config;
pub mod connection;
pub mod hydrate;
pub mod table;

pub use connection::Connection;
