//! AWS API interaction module
//!
//! # Module Structure
//!
//! - [`regions`] - Region validation and default region discovery
//! - [`client`] - STS client built on the AWS SDK
//! - [`error`] - User-facing error formatting
//! - [`identity`] - Caller identity lookup and the common column payload
//!
//! # Example
//!
//! ```ignore
//! use awsrows::aws::identity::{IdentityConnector, StsConnector};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let sts = StsConnector::new().with_region("eu-west-1").connect().await?;
//!     let identity = sts.caller_identity().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod identity;
pub mod regions;
