//! In-process rights table

use async_trait::async_trait;
use dms_core::{Error, Result, Right};
use std::collections::{HashMap, HashSet};

use crate::RightsService;

/// Fixed set of grants, for embedding and tests
///
/// Users that were never mentioned are reported as unknown, mirroring the
/// rights service's 404.
#[derive(Debug, Clone, Default)]
pub struct StaticRights {
    grants: HashMap<String, HashSet<Right>>,
}

impl StaticRights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user without any right
    pub fn user(mut self, user: &str) -> Self {
        self.grants.entry(user.to_string()).or_default();
        self
    }

    pub fn grant(mut self, user: &str, right: Right) -> Self {
        self.grants.entry(user.to_string()).or_default().insert(right);
        self
    }
}

#[async_trait]
impl RightsService for StaticRights {
    async fn has_right(&self, user: &str, right: Right) -> Result<bool> {
        match self.grants.get(user) {
            Some(rights) => Ok(rights.contains(&right)),
            None => Err(Error::RightUnknown {
                user: user.to_string(),
                right: right.to_string(),
            }),
        }
    }
}
