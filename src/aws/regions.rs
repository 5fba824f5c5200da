//! Region discovery and validation
//!
//! The default region comes from `aws-config`'s region chain (environment,
//! shared config profile, instance metadata), the same places every AWS SDK
//! looks.

use aws_config::default_provider::region::DefaultRegionChain;

/// Region the STS client falls back to when nothing else is configured
pub const FALLBACK_REGION: &str = "us-east-1";

/// Validate an AWS region name
/// Regions are lowercase letters, digits and hyphens, e.g. `us-east-1` or
/// `us-gov-west-1`, and must start with a letter and end with a digit
pub fn validate_region(region: &str) -> bool {
    if region.len() < 4 || region.len() > 32 {
        return false;
    }

    match region.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }

    match region.chars().last() {
        Some(c) if c.is_ascii_digit() => {}
        _ => return false,
    }

    region.contains('-')
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Default region for `profile` (or the active profile) from the SDK chain
/// Security: Validates the region before returning it
pub async fn default_region(profile: Option<&str>) -> Option<String> {
    let mut chain = DefaultRegionChain::builder();
    if let Some(profile) = profile {
        chain = chain.profile_name(profile);
    }

    let region = chain.build().region().await?;
    let name: &str = region.as_ref();
    if validate_region(name) {
        Some(name.to_string())
    } else {
        tracing::warn!("Ignoring invalid default region: {}", name);
        None
    }
}

/// Commercial regions, used when the caller asks for all regions
pub fn list_regions() -> Vec<String> {
    [
        // Americas
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "ca-central-1",
        "sa-east-1",
        // Europe
        "eu-central-1",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-north-1",
        "eu-south-1",
        // Asia Pacific
        "ap-east-1",
        "ap-south-1",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-northeast-3",
        "ap-southeast-1",
        "ap-southeast-2",
        // Middle East & Africa
        "me-south-1",
        "af-south-1",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}
