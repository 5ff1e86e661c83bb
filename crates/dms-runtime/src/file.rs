//! File existence runner

use async_trait::async_trait;
use dms_core::{Error, Result, Rule};
use tracing::debug;

use crate::traits::RuleRunner;

/// Reports whether the path in the rule argument exists
pub struct FileRunner;

#[async_trait]
impl RuleRunner for FileRunner {
    async fn run(&self, rule: &Rule) -> Result<String> {
        let exists = tokio::fs::try_exists(&rule.argument)
            .await
            .map_err(|e| Error::run(format!("Cannot check '{}': {}", rule.argument, e)))?;

        debug!("File check {} -> {}", rule.argument, exists);
        Ok(exists.to_string())
    }

    fn kind_name(&self) -> &'static str {
        "file"
    }
}
