//! Background scheduler - runs rules whose frequency has elapsed

use chrono::{DateTime, Utc};
use dms_core::{Error, Result, Rule, SchedulerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::manager::RuleManager;

/// What a single tick did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Rules started during the tick, successful or not
    pub executed: Vec<String>,
    pub failures: usize,
}

/// Drives periodic rule execution
///
/// Works from a snapshot of the rule table that is refreshed every
/// `refresh_every_ticks` ticks, so rules created through the API are picked up
/// with a short delay rather than immediately.
pub struct Scheduler {
    manager: Arc<RuleManager>,
    config: SchedulerConfig,
    snapshot: Vec<Rule>,
    last_runs: HashMap<String, DateTime<Utc>>,
    ticks: u64,
}

impl Scheduler {
    pub fn new(manager: Arc<RuleManager>, config: SchedulerConfig) -> Self {
        Self {
            manager,
            config,
            snapshot: Vec::new(),
            last_runs: HashMap::new(),
            ticks: 0,
        }
    }

    /// Rules the scheduler currently knows about
    pub fn rules(&self) -> &[Rule] {
        &self.snapshot
    }

    pub fn last_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.last_runs.get(name).copied()
    }

    /// A rule is due when it is scheduled and has either never run or ran at
    /// least `frequency_secs` ago
    pub fn is_due(&self, rule: &Rule, now: DateTime<Utc>) -> bool {
        if !rule.is_scheduled() {
            return false;
        }
        match self.last_runs.get(&rule.name) {
            None => true,
            // Compared in whole seconds; a clock that went backwards is never due
            Some(last) => u64::try_from(now.signed_duration_since(*last).num_seconds())
                .map_or(false, |elapsed| elapsed >= rule.frequency_secs),
        }
    }

    /// Reload the rule snapshot, forgetting run times of deleted rules
    pub async fn refresh(&mut self) -> Result<usize> {
        let rules = self.manager.list_rules().await?;
        self.last_runs
            .retain(|name, _| rules.iter().any(|rule| &rule.name == name));
        self.snapshot = rules;
        debug!("Scheduler tracking {} rules", self.snapshot.len());
        Ok(self.snapshot.len())
    }

    /// Run every due rule once, then count the tick and refresh if needed
    ///
    /// Rules run one after another. A failing rule is logged and its run time
    /// still recorded so it is not retried before its next period.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let logs = self.manager.logs();

        let due: Vec<String> = self
            .snapshot
            .iter()
            .filter(|rule| self.is_due(rule, now))
            .map(|rule| rule.name.clone())
            .collect();

        for name in due {
            report.executed.push(name.clone());
            match self.manager.run_rule(&name, &logs).await {
                Ok(result) => {
                    debug!("Scheduled run of {} returned {:?}", name, result);
                    self.last_runs.insert(name, now);
                }
                Err(Error::RuleNotFound(_)) => {
                    // Deleted since the last refresh
                    report.failures += 1;
                    info!("Rule {} disappeared, skipping", name);
                    self.last_runs.remove(&name);
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("Scheduled run of {} failed: {}", name, e);
                    self.last_runs.insert(name, now);
                }
            }
        }

        self.ticks += 1;
        if self.ticks % self.config.refresh_every_ticks.max(1) == 0 {
            if let Err(e) = self.refresh().await {
                error!("Failed to refresh rules, keeping previous snapshot: {}", e);
            }
        }

        report
    }

    /// Tick until a shutdown signal arrives
    ///
    /// A tick in progress is allowed to finish before the loop exits.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if let Err(e) = self.refresh().await {
            error!("Initial rule load failed: {}", e);
        }
        info!(
            "Scheduler started with {} rules (tick {}ms, refresh every {} ticks)",
            self.snapshot.len(),
            self.config.tick_millis,
            self.config.refresh_every_ticks
        );

        let mut ticker = interval(Duration::from_millis(self.config.tick_millis.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if !report.executed.is_empty() {
                        debug!(
                            "Tick ran {} rules, {} failed",
                            report.executed.len(),
                            report.failures
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::RuleKind;
    use dms_db::Database;
    use tempfile::{tempdir, TempDir};

    fn config(refresh_every_ticks: u64) -> SchedulerConfig {
        SchedulerConfig {
            tick_millis: 10,
            refresh_every_ticks,
        }
    }

    async fn setup(refresh_every_ticks: u64) -> (Scheduler, Arc<RuleManager>, Database, TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let manager = Arc::new(RuleManager::new(db.clone()));
        let scheduler = Scheduler::new(manager.clone(), config(refresh_every_ticks));
        (scheduler, manager, db, dir)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_is_due() {
        let (mut scheduler, _manager, _db, _dir) = setup(14).await;
        let rule = Rule::new("r", RuleKind::Command, "true", 10);

        assert!(scheduler.is_due(&rule, at(0)));

        scheduler.last_runs.insert("r".to_string(), at(0));
        assert!(!scheduler.is_due(&rule, at(0)));
        assert!(!scheduler.is_due(&rule, at(9)));
        assert!(scheduler.is_due(&rule, at(10)));
        assert!(scheduler.is_due(&rule, at(100)));
    }

    #[tokio::test]
    async fn test_frequency_zero_is_never_due() {
        let (scheduler, _manager, _db, _dir) = setup(14).await;
        let rule = Rule::new("manual", RuleKind::Command, "true", 0);
        assert!(!scheduler.is_due(&rule, at(0)));
        assert!(!scheduler.is_due(&rule, at(1_000_000)));
    }

    #[tokio::test]
    async fn test_tick_respects_frequency() {
        let (mut scheduler, manager, db, _dir) = setup(1000).await;
        manager.create_rule("ping", "command", "echo ok", 10).await.unwrap();
        scheduler.refresh().await.unwrap();

        let report = scheduler.tick(at(0)).await;
        assert_eq!(report.executed, vec!["ping".to_string()]);
        assert_eq!(report.failures, 0);
        assert_eq!(scheduler.last_run("ping"), Some(at(0)));

        assert!(scheduler.tick(at(5)).await.executed.is_empty());
        assert_eq!(db.logs().list_for_rule("ping").await.unwrap().len(), 1);

        assert_eq!(scheduler.tick(at(10)).await.executed.len(), 1);
        assert_eq!(scheduler.last_run("ping"), Some(at(10)));
        assert_eq!(db.logs().list_for_rule("ping").await.unwrap().len(), 2);

        assert!(scheduler.tick(at(15)).await.executed.is_empty());
        assert_eq!(db.logs().list_for_rule("ping").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_huge_frequency_is_not_due_again() {
        let (mut scheduler, manager, db, _dir) = setup(1000).await;
        manager
            .create_rule("rare", "command", "echo ok", 100_000_000_000_000_000)
            .await
            .unwrap();
        scheduler.refresh().await.unwrap();

        assert_eq!(scheduler.tick(at(0)).await.executed, vec!["rare".to_string()]);
        assert!(scheduler.tick(at(1)).await.executed.is_empty());
        assert!(scheduler.tick(at(1_000_000)).await.executed.is_empty());
        assert_eq!(db.logs().list_for_rule("rare").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clock_going_backwards_is_not_due() {
        let (mut scheduler, _manager, _db, _dir) = setup(14).await;
        let rule = Rule::new("r", RuleKind::Command, "true", 10);
        scheduler.last_runs.insert("r".to_string(), at(100));
        assert!(!scheduler.is_due(&rule, at(50)));
        assert!(scheduler.is_due(&rule, at(110)));
    }

    #[tokio::test]
    async fn test_manual_rules_are_skipped() {
        let (mut scheduler, manager, db, _dir) = setup(1000).await;
        manager.create_rule("manual", "command", "echo ok", 0).await.unwrap();
        scheduler.refresh().await.unwrap();

        for i in 0..5 {
            assert!(scheduler.tick(at(i * 100)).await.executed.is_empty());
        }
        assert!(db.logs().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_still_records_run_time() {
        let (mut scheduler, manager, db, _dir) = setup(1000).await;
        manager.create_rule("broken", "command", "exit 2", 60).await.unwrap();
        scheduler.refresh().await.unwrap();

        let report = scheduler.tick(at(0)).await;
        assert_eq!(report.failures, 1);
        assert_eq!(scheduler.last_run("broken"), Some(at(0)));

        // Not retried before its period
        assert!(scheduler.tick(at(1)).await.executed.is_empty());
        assert!(db.logs().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rule_deleted_between_refreshes() {
        let (mut scheduler, manager, _db, _dir) = setup(1000).await;
        manager.create_rule("gone", "command", "true", 5).await.unwrap();
        scheduler.refresh().await.unwrap();
        scheduler.tick(at(0)).await;
        assert!(scheduler.last_run("gone").is_some());

        manager.delete_rule("gone").await.unwrap();
        let report = scheduler.tick(at(5)).await;
        assert_eq!(report.executed, vec!["gone".to_string()]);
        assert_eq!(report.failures, 1);
        assert!(scheduler.last_run("gone").is_none());
    }

    #[tokio::test]
    async fn test_refresh_every_n_ticks() {
        let (mut scheduler, manager, _db, _dir) = setup(3).await;
        scheduler.refresh().await.unwrap();
        manager.create_rule("late", "command", "true", 1).await.unwrap();

        // Not visible until the third tick triggers a refresh
        assert!(scheduler.tick(at(0)).await.executed.is_empty());
        assert!(scheduler.tick(at(1)).await.executed.is_empty());
        assert!(scheduler.tick(at(2)).await.executed.is_empty());
        assert_eq!(scheduler.rules().len(), 1);

        assert_eq!(scheduler.tick(at(3)).await.executed, vec!["late".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_prunes_deleted_rules() {
        let (mut scheduler, manager, _db, _dir) = setup(1000).await;
        manager.create_rule("a", "command", "true", 1).await.unwrap();
        manager.create_rule("b", "command", "true", 1).await.unwrap();
        scheduler.refresh().await.unwrap();
        scheduler.tick(at(0)).await;
        assert!(scheduler.last_run("a").is_some());

        manager.delete_rule("a").await.unwrap();
        assert_eq!(scheduler.refresh().await.unwrap(), 1);
        assert!(scheduler.last_run("a").is_none());
        assert!(scheduler.last_run("b").is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (scheduler, manager, db, _dir) = setup(14).await;
        manager.create_rule("ping", "command", "echo ok", 60).await.unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // Ran once on the first tick and was not due again within a minute
        assert_eq!(db.logs().list_for_rule("ping").await.unwrap().len(), 1);
    }
}
