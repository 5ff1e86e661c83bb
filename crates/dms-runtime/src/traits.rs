//! Runner trait

use async_trait::async_trait;
use dms_core::{Result, Rule};

/// Execution strategy for one rule kind
#[async_trait]
pub trait RuleRunner: Send + Sync {
    /// Execute the rule and return its textual result
    ///
    /// Fails with `Error::RunError` when the check itself cannot be carried out.
    async fn run(&self, rule: &Rule) -> Result<String>;

    /// Get the kind name this runner handles
    fn kind_name(&self) -> &'static str;
}
