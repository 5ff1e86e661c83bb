//! Logs repository - append-only execution history

use chrono::{DateTime, Utc};
use dms_core::{format_timestamp, parse_timestamp, Error, LogEntry, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::debug;

use crate::is_unique_violation;

/// Repository for rule execution logs
pub struct LogsRepository {
    pool: SqlitePool,
}

impl LogsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a result for a rule that currently exists
    ///
    /// The existence check and the insert share one transaction. The rule may
    /// still be deleted afterwards; the entry is then kept as an orphan.
    pub async fn append(
        &self,
        rule_name: &str,
        timestamp: DateTime<Utc>,
        result: &str,
    ) -> Result<LogEntry> {
        if rule_name.is_empty() {
            return Err(Error::validation("A rule name is required"));
        }

        // Stored at microsecond precision; hand back what a later read sees
        let time = format_timestamp(&timestamp);
        let stored = parse_timestamp(&time)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rules WHERE name = ?")
            .bind(rule_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;
        if row.0 == 0 {
            return Err(Error::RuleNotFound(rule_name.to_string()));
        }

        sqlx::query("INSERT INTO logs (rule_name, time, result) VALUES (?, ?, ?)")
            .bind(rule_name)
            .bind(&time)
            .bind(result)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::DuplicateLog {
                        rule: rule_name.to_string(),
                        timestamp: time.clone(),
                    }
                } else {
                    Error::DbError(e.to_string())
                }
            })?;

        tx.commit()
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        debug!("Logged result for {} at {}", rule_name, time);
        Ok(LogEntry {
            rule_name: rule_name.to_string(),
            timestamp: stored,
            result: result.to_string(),
        })
    }

    /// Get the most recent entry for a rule
    pub async fn latest(&self, rule_name: &str) -> Result<LogEntry> {
        if rule_name.is_empty() {
            return Err(Error::validation("A rule name is required"));
        }

        let known: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rules WHERE name = ?")
            .bind(rule_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;
        if known.0 == 0 {
            return Err(Error::RuleNotFound(rule_name.to_string()));
        }

        let row = sqlx::query(
            r#"
            SELECT rule_name, time, result
            FROM logs
            WHERE rule_name = ?
            ORDER BY time DESC
            LIMIT 1
            "#,
        )
        .bind(rule_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => row_to_log_entry(&row),
            None => Err(Error::NoLogs(rule_name.to_string())),
        }
    }

    /// Get every entry, including orphans of deleted rules
    pub async fn list_all(&self) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query("SELECT rule_name, time, result FROM logs ORDER BY time")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_log_entry).collect()
    }

    /// Get every entry recorded under a rule name
    pub async fn list_for_rule(&self, rule_name: &str) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT rule_name, time, result FROM logs WHERE rule_name = ? ORDER BY time",
        )
        .bind(rule_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_log_entry).collect()
    }
}

fn row_to_log_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LogEntry> {
    let rule_name: String = row.get("rule_name");
    let time: String = row.get("time");
    let result: String = row.get("result");

    Ok(LogEntry {
        rule_name,
        timestamp: parse_timestamp(&time)?,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::{Duration, TimeZone};
    use dms_core::{Rule, RuleKind};
    use tempfile::{tempdir, TempDir};

    // Return TempDir to keep it alive during test
    async fn setup_db_with_rule() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::new(&db_path).await.unwrap();

        db.rules()
            .create(&Rule::new("hosts", RuleKind::File, "/etc/hosts", 0))
            .await
            .unwrap();

        (db, dir)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 4, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let (db, _dir) = setup_db_with_rule().await;
        let logs = db.logs();

        logs.append("hosts", at(0), "true").await.unwrap();
        logs.append("hosts", at(20), "false").await.unwrap();
        logs.append("hosts", at(10), "true").await.unwrap();

        let latest = logs.latest("hosts").await.unwrap();
        assert_eq!(latest.timestamp, at(20));
        assert_eq!(latest.result, "false");
    }

    #[tokio::test]
    async fn test_append_returns_stored_timestamp() {
        let (db, _dir) = setup_db_with_rule().await;
        let logs = db.logs();
        let precise = at(0) + Duration::nanoseconds(123_456_789);

        let appended = logs.append("hosts", precise, "true").await.unwrap();
        let latest = logs.latest("hosts").await.unwrap();
        assert_eq!(appended, latest);
        assert_eq!(appended.timestamp, at(0) + Duration::microseconds(123_456));
    }

    #[tokio::test]
    async fn test_append_allows_empty_result() {
        let (db, _dir) = setup_db_with_rule().await;
        let entry = db.logs().append("hosts", at(0), "").await.unwrap();
        assert_eq!(entry.result, "");
    }

    #[tokio::test]
    async fn test_append_unknown_rule() {
        let (db, _dir) = setup_db_with_rule().await;
        let err = db.logs().append("ghost", at(0), "true").await.unwrap_err();
        assert!(matches!(err, Error::RuleNotFound(name) if name == "ghost"));
        assert!(db.logs().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_empty_name() {
        let (db, _dir) = setup_db_with_rule().await;
        let err = db.logs().append("", at(0), "true").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_append_duplicate_timestamp() {
        let (db, _dir) = setup_db_with_rule().await;
        let logs = db.logs();

        logs.append("hosts", at(5), "true").await.unwrap();
        let err = logs.append("hosts", at(5), "false").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateLog { ref rule, .. } if rule == "hosts"));
        assert_eq!(logs.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_without_logs() {
        let (db, _dir) = setup_db_with_rule().await;
        let err = db.logs().latest("hosts").await.unwrap_err();
        assert!(matches!(err, Error::NoLogs(_)));

        let err = db.logs().latest("ghost").await.unwrap_err();
        assert!(matches!(err, Error::RuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_logs_survive_rule_deletion() {
        let (db, _dir) = setup_db_with_rule().await;
        db.logs().append("hosts", at(0), "true").await.unwrap();

        db.rules().delete("hosts").await.unwrap();

        let all = db.logs().list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rule_name, "hosts");
        assert!(matches!(
            db.logs().append("hosts", at(1), "true").await,
            Err(Error::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_rule() {
        let (db, _dir) = setup_db_with_rule().await;
        db.rules()
            .create(&Rule::new("tmp", RuleKind::File, "/tmp", 0))
            .await
            .unwrap();

        let logs = db.logs();
        logs.append("hosts", at(0), "true").await.unwrap();
        logs.append("tmp", at(1), "true").await.unwrap();
        logs.append("hosts", at(2), "true").await.unwrap();

        let hosts = logs.list_for_rule("hosts").await.unwrap();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.iter().all(|e| e.rule_name == "hosts"));
        assert_eq!(logs.list_all().await.unwrap().len(), 3);
    }
}
