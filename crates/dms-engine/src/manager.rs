//! Rule manager - validation and run-and-log orchestration

use chrono::{DateTime, Utc};
use dms_core::{parse_frequency, Error, LogEntry, Result, Rule, RuleKind};
use dms_db::{Database, LogsRepository};
use dms_runtime::get_runner;
use tracing::{info, warn};

/// Façade over the rule store, the runners and the log store
///
/// Holds nothing but a database handle; every call is its own transaction.
#[derive(Clone)]
pub struct RuleManager {
    db: Database,
}

impl RuleManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The log store, for passing to [`RuleManager::run_rule`]
    pub fn logs(&self) -> LogsRepository {
        self.db.logs()
    }

    /// Create a rule from wire-level fields
    ///
    /// Only `file` and `command` rules can be created here; `cpu` rules are
    /// runnable but must be provisioned directly in the rule store.
    pub async fn create_rule(
        &self,
        name: &str,
        kind: &str,
        argument: &str,
        frequency: i64,
    ) -> Result<Rule> {
        if name.is_empty() {
            return Err(Error::validation("A non-empty rule name is needed"));
        }
        let kind = match kind {
            "file" => RuleKind::File,
            "command" => RuleKind::Command,
            _ => {
                return Err(Error::validation(
                    "The rule type must be exactly \"file\" or \"command\"",
                ))
            }
        };
        if argument.is_empty() {
            return Err(Error::validation("An argument is required"));
        }
        let frequency_secs = parse_frequency(frequency)?;

        self.db
            .rules()
            .create(&Rule::new(name, kind, argument, frequency_secs))
            .await
    }

    pub async fn get_rule(&self, name: &str) -> Result<Rule> {
        require_name(name)?;
        self.db.rules().get(name).await
    }

    pub async fn delete_rule(&self, name: &str) -> Result<bool> {
        require_name(name)?;
        self.db.rules().delete(name).await
    }

    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.db.rules().list_all().await
    }

    /// Run a rule and append its result to `logs`
    ///
    /// A failed run writes no log entry. Losing a same-timestamp race against
    /// a concurrent run of the same rule is not an error: the result is still
    /// returned.
    pub async fn run_rule(&self, name: &str, logs: &LogsRepository) -> Result<String> {
        self.run_rule_at(name, logs, Utc::now()).await
    }

    /// `run_rule` with the log timestamp pinned to `now`
    pub(crate) async fn run_rule_at(
        &self,
        name: &str,
        logs: &LogsRepository,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let rule = self.get_rule(name).await?;
        let runner = get_runner(rule.kind);

        let result = match runner.run(&rule).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Rule {} ({}) failed: {}", rule.name, runner.kind_name(), e);
                return Err(e);
            }
        };

        match logs.append(&rule.name, now, &result).await {
            Ok(_) => {}
            Err(Error::DuplicateLog { rule, timestamp }) => {
                warn!(
                    "Concurrent run of {} already logged at {}; keeping the other entry",
                    rule, timestamp
                );
            }
            Err(e) => return Err(e),
        }

        info!("Rule {} ({}) ran", rule.name, runner.kind_name());
        Ok(result)
    }

    /// Most recent result of a rule
    pub async fn last_run(&self, name: &str) -> Result<LogEntry> {
        require_name(name)?;
        self.db.logs().latest(name).await
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("The rule name must not be empty"));
    }
    Ok(())
}
