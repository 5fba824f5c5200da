//! STS client
//!
//! Thin wrapper over the SDK client: the SDK signs requests and resolves the
//! partition endpoint from the configured region.

use anyhow::{Context, Result};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sts::Client;
use aws_types::SdkConfig;

use super::error::sanitize_for_log;
use super::identity::CallerIdentity;

/// Main STS client
#[derive(Debug, Clone)]
pub struct StsClient {
    client: Client,
}

impl StsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Region the client signs for and resolves its endpoint from
    pub fn region(&self) -> Option<&str> {
        self.client.config().region().map(|region| region.as_ref())
    }

    /// Call `GetCallerIdentity`
    pub async fn get_caller_identity(&self) -> Result<CallerIdentity> {
        tracing::debug!("GetCallerIdentity in region {:?}", self.region());

        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|err| {
                let status = err.raw_response().map(|response| response.status().as_u16());
                match (err.as_service_error(), status) {
                    (Some(service), Some(status)) => {
                        let code = service.code().unwrap_or("Unknown");
                        // Security: Only log sanitized/truncated service messages
                        tracing::error!(
                            "API error: {} {} - {}",
                            status,
                            code,
                            sanitize_for_log(service.message().unwrap_or_default())
                        );
                        anyhow::anyhow!("API request failed: {} ({})", status, code)
                    }
                    _ => anyhow::anyhow!("{}", DisplayErrorContext(&err)),
                }
            })
            .context("GetCallerIdentity failed")?;

        CallerIdentity::new(output.account(), output.arn(), output.user_id())
    }
}
