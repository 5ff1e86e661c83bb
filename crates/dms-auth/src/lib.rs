//! DMS Auth - access to the external rights service
//!
//! Every sensor operation is gated behind a named right. The sensor never
//! stores rights itself; it asks the rights service on each request.

mod client;
mod memory;

pub use client::AuthServiceClient;
pub use memory::StaticRights;

use async_trait::async_trait;
use dms_core::{Error, Result, Right};

/// Answers "does user U have right R"
#[async_trait]
pub trait RightsService: Send + Sync {
    /// `Ok(false)` is an explicit refusal; `Err(Error::RightUnknown)` means the
    /// service knows neither the user nor the right
    async fn has_right(&self, user: &str, right: Right) -> Result<bool>;
}

/// Require a right, turning an explicit refusal into `Error::RightDenied`
pub async fn require_right(service: &dyn RightsService, user: &str, right: Right) -> Result<()> {
    if service.has_right(user, right).await? {
        Ok(())
    } else {
        Err(Error::RightDenied {
            user: user.to_string(),
            right: right.to_string(),
        })
    }
}
