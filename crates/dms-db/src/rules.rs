//! Rules repository - the rule store

use dms_core::{Error, Result, Rule, RuleKind};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info};

use crate::is_unique_violation;

/// Repository for rule definitions
pub struct RulesRepository {
    pool: SqlitePool,
}

impl RulesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new rule
    ///
    /// Name collisions are detected by the primary key, not by a prior lookup,
    /// so two concurrent creators cannot both succeed.
    pub async fn create(&self, rule: &Rule) -> Result<Rule> {
        rule.validate()?;

        sqlx::query("INSERT INTO rules (name, kind, argument, frequency) VALUES (?, ?, ?, ?)")
            .bind(&rule.name)
            .bind(rule.kind.as_str())
            .bind(&rule.argument)
            .bind(i64::try_from(rule.frequency_secs).map_err(|_| {
                Error::validation(format!("Frequency too large: {}", rule.frequency_secs))
            })?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::RuleAlreadyExists(rule.name.clone())
                } else {
                    Error::DbError(e.to_string())
                }
            })?;

        info!(
            "Created rule {} ({}, every {}s)",
            rule.name, rule.kind, rule.frequency_secs
        );
        Ok(rule.clone())
    }

    /// Check if a rule exists by name
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rules WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.0 > 0)
    }

    /// Get a rule by name
    pub async fn get(&self, name: &str) -> Result<Rule> {
        let row = sqlx::query("SELECT name, kind, argument, frequency FROM rules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => row_to_rule(&row),
            None => Err(Error::RuleNotFound(name.to_string())),
        }
    }

    /// Delete a rule by name. Its log entries are kept.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rules WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::RuleNotFound(name.to_string()));
        }

        info!("Deleted rule {}", name);
        Ok(true)
    }

    /// Get all rules
    pub async fn list_all(&self) -> Result<Vec<Rule>> {
        let rows = sqlx::query("SELECT name, kind, argument, frequency FROM rules ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        debug!("Loaded {} rules", rows.len());
        rows.iter().map(row_to_rule).collect()
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<Rule> {
    let name: String = row.get("name");
    let kind_str: String = row.get("kind");
    let argument: String = row.get("argument");
    let frequency: i64 = row.get("frequency");

    let kind: RuleKind = kind_str
        .parse()
        .map_err(|_| Error::db(format!("Rule {} has unknown kind '{}'", name, kind_str)))?;
    let frequency_secs = u64::try_from(frequency)
        .map_err(|_| Error::db(format!("Rule {} has negative frequency {}", name, frequency)))?;

    Ok(Rule {
        name,
        kind,
        argument,
        frequency_secs,
    })
}
