//! Caller identity lookup
//!
//! Resolves which account and partition the configured credentials belong to,
//! the data behind the `partition`, `account_id` and `region` columns.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;
use serde::Serialize;
use url::Url;

use super::client::StsClient;
use super::regions::FALLBACK_REGION;
use crate::config::Config;

/// Result of `GetCallerIdentity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: Option<String>,
}

impl CallerIdentity {
    /// Build from the optional fields of an STS response
    pub fn new(account: Option<&str>, arn: Option<&str>, user_id: Option<&str>) -> Result<Self> {
        Ok(Self {
            account: account
                .context("Missing Account in GetCallerIdentity response")?
                .to_string(),
            arn: arn
                .context("Missing Arn in GetCallerIdentity response")?
                .to_string(),
            user_id: user_id.map(str::to_string),
        })
    }

    pub fn partition(&self) -> Result<&str> {
        partition_from_arn(&self.arn)
    }
}

/// Extract the partition segment of an ARN (`arn:<partition>:...`)
pub fn partition_from_arn(arn: &str) -> Result<&str> {
    match arn.split(':').nth(1) {
        Some(partition) if !partition.is_empty() => Ok(partition),
        _ => Err(anyhow::anyhow!("Malformed ARN without partition: {}", arn)),
    }
}

/// Columns returned with every table: partition, account and region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonColumnData {
    pub partition: String,
    pub account_id: String,
    pub region: String,
}

impl CommonColumnData {
    pub fn from_identity(identity: &CallerIdentity, region: &str) -> Result<Self> {
        Ok(Self {
            partition: identity.partition()?.to_string(),
            account_id: identity.account.clone(),
            region: region.to_string(),
        })
    }
}

/// Remote "who am I" operation
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}

#[async_trait]
impl IdentityService for StsClient {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.get_caller_identity().await
    }
}

/// Builds the handle to an identity service.
#[async_trait]
pub trait IdentityConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn IdentityService>>;
}

/// Connects to STS through the AWS SDK
///
/// Credentials, region and profile come from `aws-config`'s default chains
/// unless set here.
#[derive(Debug, Clone, Default)]
pub struct StsConnector {
    region: Option<String>,
    profile: Option<String>,
    endpoint: Option<String>,
    credentials: Option<Credentials>,
    max_attempts: Option<u32>,
}

impl StsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            region: config.default_region(),
            profile: config.profile.clone(),
            endpoint: config.effective_endpoint(),
            credentials: None,
            max_attempts: config.max_attempts,
        }
    }

    /// Region of the STS client; the SDK picks the partition endpoint from it
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Send requests to `endpoint` instead of the public STS endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use fixed credentials instead of the default credential chain
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Load the shared SDK configuration for the STS client
    pub async fn sdk_config(&self) -> Result<SdkConfig> {
        let region = RegionProviderChain::first_try(self.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(FALLBACK_REGION));

        let mut loader = aws_config::from_env().region(region);
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint).with_context(|| format!("Invalid STS endpoint: {}", endpoint))?;
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(credentials.clone());
        }
        if let Some(max_attempts) = self.max_attempts {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }

        Ok(loader.load().await)
    }
}

#[async_trait]
impl IdentityConnector for StsConnector {
    async fn connect(&self) -> Result<Arc<dyn IdentityService>> {
        let config = self.sdk_config().await?;
        let client = StsClient::new(&config);
        tracing::debug!("Connected STS client in region {:?}", client.region());
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_from_arn() {
        assert_eq!(
            partition_from_arn("arn:aws:sts::123456789012:assumed-role/X").unwrap(),
            "aws"
        );
        assert_eq!(
            partition_from_arn("arn:aws-cn:iam::123456789012:user/bob").unwrap(),
            "aws-cn"
        );
        assert!(partition_from_arn("not-an-arn").is_err());
        assert!(partition_from_arn("arn::iam::1:user/x").is_err());
    }

    #[test]
    fn test_common_column_data_from_identity() {
        let identity = CallerIdentity {
            account: "123456789012".to_string(),
            arn: "arn:aws:sts::123456789012:assumed-role/X".to_string(),
            user_id: None,
        };

        let data = CommonColumnData::from_identity(&identity, "us-east-1").unwrap();
        assert_eq!(
            data,
            CommonColumnData {
                partition: "aws".to_string(),
                account_id: "123456789012".to_string(),
                region: "us-east-1".to_string(),
            }
        );
    }

    #[test]
    fn test_caller_identity_requires_account_and_arn() {
        let identity = CallerIdentity::new(
            Some("123456789012"),
            Some("arn:aws:iam::123456789012:user/alice"),
            Some("AIDAEXAMPLE"),
        )
        .unwrap();
        assert_eq!(identity.account, "123456789012");
        assert_eq!(identity.user_id.as_deref(), Some("AIDAEXAMPLE"));
        assert_eq!(identity.partition().unwrap(), "aws");

        assert!(CallerIdentity::new(None, Some("arn:aws:iam::1:user/x"), None).is_err());
        assert!(CallerIdentity::new(Some("1"), None, None).is_err());
    }

    fn test_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "secret", None, None, "test")
    }

    #[tokio::test]
    async fn test_configured_region_reaches_partition_endpoint() {
        use aws_sdk_sts::config::endpoint::{DefaultResolver, Params, ResolveEndpoint};

        let connector = StsConnector::new()
            .with_region("cn-north-1")
            .with_credentials(test_credentials());
        let config = connector.sdk_config().await.unwrap();
        let region = config.region().unwrap().as_ref().to_string();
        assert_eq!(region, "cn-north-1");

        let client = StsClient::new(&config);
        assert_eq!(client.region(), Some("cn-north-1"));

        let params = Params::builder().region(region).build().unwrap();
        let endpoint = DefaultResolver::new()
            .resolve_endpoint(&params)
            .await
            .unwrap();
        assert_eq!(endpoint.url(), "https://sts.cn-north-1.amazonaws.com.cn");
    }

    #[test]
    fn test_connector_uses_config_default_region() {
        let config = Config {
            regions: vec!["us-gov-west-1".to_string(), "us-gov-east-1".to_string()],
            ..Default::default()
        };
        let connector = StsConnector::from_config(&config);
        assert_eq!(connector.region.as_deref(), Some("us-gov-west-1"));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_rejected() {
        let connector = StsConnector::new()
            .with_region("us-east-1")
            .with_credentials(test_credentials())
            .with_endpoint("not a url");
        let err = connector.connect().await.err().unwrap();
        assert!(err.to_string().contains("Invalid STS endpoint"));
    }
}
