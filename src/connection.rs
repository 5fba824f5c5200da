//! Per-connection hydration state
//!
//! A [`Connection`] owns the caches shared by every table query against one
//! set of credentials: the identity service handle and the common column data
//! per region. Both are plain [`HydrationCache`] instances, created empty.

use std::sync::Arc;

use crate::aws::identity::{
    CommonColumnData, IdentityConnector, IdentityService, StsConnector,
};
use crate::config::Config;
use crate::hydrate::{derive_key, CacheKey, HydrateError, HydrationCache, QueryContext};

/// Cache key of the STS service handle. Handles are region independent.
const STS_SERVICE_KEY: &str = "service:sts";

pub struct Connection {
    connector: Arc<dyn IdentityConnector>,
    services: HydrationCache<Arc<dyn IdentityService>>,
    common: HydrationCache<Arc<CommonColumnData>>,
}

impl Connection {
    pub fn new(connector: impl IdentityConnector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            services: HydrationCache::new("services"),
            common: HydrationCache::new("common_columns"),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(StsConnector::from_config(config))
    }

    /// The memoized identity service handle.
    pub async fn identity_service(&self) -> Result<Arc<dyn IdentityService>, HydrateError> {
        let key = CacheKey::from(STS_SERVICE_KEY);
        self.services
            .get_or_compute(&key, || async {
                self.connector.connect().await.map_err(HydrateError::from)
            })
            .await
    }

    /// Look up the caller identity and build the common columns for `ctx`.
    ///
    /// Not memoized; every call performs one remote lookup.
    pub async fn fetch_identity(
        &self,
        ctx: &QueryContext,
    ) -> Result<CommonColumnData, HydrateError> {
        let service = self.identity_service().await?;
        let identity = service.caller_identity().await?;
        let data = CommonColumnData::from_identity(&identity, ctx.region())?;
        tracing::trace!("fetch_identity: {:?}", data);
        Ok(data)
    }

    /// Common columns for `ctx`, fetched at most once per region.
    pub async fn common_columns(
        &self,
        ctx: &QueryContext,
    ) -> Result<Arc<CommonColumnData>, HydrateError> {
        let key = derive_key(ctx);
        tracing::trace!("common_columns: region={}", ctx.region());
        self.common
            .get_or_compute(&key, || async {
                self.fetch_identity(ctx).await.map(Arc::new)
            })
            .await
    }

    /// Drop the cached common columns for `ctx`, forcing a fresh lookup.
    pub fn invalidate(&self, ctx: &QueryContext) -> bool {
        self.common.invalidate(&derive_key(ctx))
    }

    pub fn common_cache(&self) -> &HydrationCache<Arc<CommonColumnData>> {
        &self.common
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("services", &self.services)
            .field("common", &self.common)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::aws::identity::CallerIdentity;

    /// In-memory identity service counting its lookups.
    pub(crate) struct FakeIdentity {
        pub arn: String,
        pub account: String,
        pub failures_left: AtomicUsize,
        pub lookups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn caller_identity(&self) -> Result<CallerIdentity> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                anyhow::bail!("API request failed: 503 Service Unavailable");
            }
            Ok(CallerIdentity {
                account: self.account.clone(),
                arn: self.arn.clone(),
                user_id: None,
            })
        }
    }

    pub(crate) struct FakeConnector {
        pub failures: usize,
        pub connects: Arc<AtomicUsize>,
        pub lookups: Arc<AtomicUsize>,
    }

    impl FakeConnector {
        pub(crate) fn new() -> Self {
            Self {
                failures: 0,
                connects: Arc::new(AtomicUsize::new(0)),
                lookups: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl IdentityConnector for FakeConnector {
        async fn connect(&self) -> Result<Arc<dyn IdentityService>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeIdentity {
                arn: "arn:aws:sts::123456789012:assumed-role/X".to_string(),
                account: "123456789012".to_string(),
                failures_left: AtomicUsize::new(self.failures),
                lookups: self.lookups.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_end_to_end_common_columns() {
        let connection = Connection::new(FakeConnector::new());
        let ctx = QueryContext::new().with_region("us-east-1");

        let data = connection.common_columns(&ctx).await.unwrap();
        assert_eq!(
            *data,
            CommonColumnData {
                partition: "aws".to_string(),
                account_id: "123456789012".to_string(),
                region: "us-east-1".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_rows_share_one_lookup() {
        let connector = FakeConnector::new();
        let connects = connector.connects.clone();
        let lookups = connector.lookups.clone();
        let connection = Connection::new(connector);
        let ctx = QueryContext::new().with_region("eu-west-1");

        let results =
            futures::future::join_all((0..20).map(|_| connection.common_columns(&ctx))).await;

        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regions_are_looked_up_separately_with_one_handle() {
        let connector = FakeConnector::new();
        let connects = connector.connects.clone();
        let lookups = connector.lookups.clone();
        let connection = Connection::new(connector);

        let contexts = QueryContext::for_regions(["us-east-1", "us-west-2", "ap-south-1"]);
        let results =
            futures::future::join_all(contexts.iter().map(|ctx| connection.common_columns(ctx)))
                .await;

        let regions: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().region.clone())
            .collect();
        assert_eq!(regions, vec!["us-east-1", "us-west-2", "ap-south-1"]);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_is_retried_by_next_query() {
        let connector = FakeConnector {
            failures: 1,
            ..FakeConnector::new()
        };
        let lookups = connector.lookups.clone();
        let connection = Connection::new(connector);
        let ctx = QueryContext::new();

        let err = connection.common_columns(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(connection.common_cache().is_empty());

        let data = connection.common_columns(&ctx).await.unwrap();
        assert_eq!(data.region, "global");
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_lookup() {
        let connector = FakeConnector::new();
        let lookups = connector.lookups.clone();
        let connection = Connection::new(connector);
        let ctx = QueryContext::new().with_region("us-east-1");

        connection.common_columns(&ctx).await.unwrap();
        assert!(connection.invalidate(&ctx));
        connection.common_columns(&ctx).await.unwrap();
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
