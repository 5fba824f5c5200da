//! Cache key derivation from the request context.

use std::fmt;

/// Region used when a query carries no region dimension.
pub const GLOBAL_REGION: &str = "global";

/// Prefix of every common column cache key.
const COMMON_COLUMN_KEY_PREFIX: &str = "commonColumnData";

/// Identity under which a hydrated value is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Request-scoped dimensions of a single table query.
///
/// The host framework fans a query out over a region matrix; each partition of
/// that fan-out gets its own context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    region: Option<String>,
}

impl QueryContext {
    /// A context without a region dimension.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// One context per region, in the order given.
    pub fn for_regions<I, S>(regions: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        regions
            .into_iter()
            .map(|region| Self::new().with_region(region))
            .collect()
    }

    /// The effective region: the region dimension, or [`GLOBAL_REGION`] when it
    /// is missing or empty.
    pub fn region(&self) -> &str {
        match self.region.as_deref() {
            Some(region) if !region.is_empty() => region,
            _ => GLOBAL_REGION,
        }
    }
}

/// Derive the common column cache key for `ctx`.
pub fn derive_key(ctx: &QueryContext) -> CacheKey {
    CacheKey(format!("{}{}", COMMON_COLUMN_KEY_PREFIX, ctx.region()))
}
