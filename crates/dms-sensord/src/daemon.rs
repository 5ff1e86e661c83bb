//! Sensor orchestration: database, scheduler and REST server

use anyhow::{Context, Result};
use dms_auth::{AuthServiceClient, RightsService};
use dms_core::SensorConfig;
use dms_db::Database;
use dms_engine::{RuleManager, Scheduler};
use dms_web::{start_server, AppState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub struct Sensor {
    config: SensorConfig,
    db: Database,
    manager: Arc<RuleManager>,
    rights: Arc<AuthServiceClient>,
}

impl Sensor {
    pub async fn new(config: SensorConfig) -> Result<Self> {
        let db_path = config.database.resolved_path();
        let db = Database::new(&db_path)
            .await
            .with_context(|| format!("opening database {}", db_path.display()))?;
        info!("Database initialized at {}", db_path.display());

        let rights = Arc::new(AuthServiceClient::new(&config.auth_service)?);
        if rights.is_running().await {
            info!("Rights service reachable at {}", config.auth_service.base_url());
        } else {
            warn!(
                "Rights service at {} is not answering; requests will fail until it is up",
                config.auth_service.base_url()
            );
        }

        Ok(Self {
            manager: Arc::new(RuleManager::new(db.clone())),
            config,
            db,
            rights,
        })
    }

    /// Run scheduler and REST server until `shutdown` fires or the server dies
    pub async fn run(self, shutdown: broadcast::Sender<()>) -> Result<()> {
        let scheduler = Scheduler::new(self.manager.clone(), self.config.scheduler.clone());
        let scheduler_task = tokio::spawn(scheduler.run(shutdown.subscribe()));

        let rights: Arc<dyn RightsService> = self.rights.clone();
        let state = AppState::new(self.manager.clone(), rights);
        let bind_addr = self.config.server.bind_addr();
        let served = start_server(&bind_addr, state, shutdown.subscribe()).await;

        // Stop the scheduler as well when the server exits on its own
        let _ = shutdown.send(());
        if let Err(e) = scheduler_task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
        self.db.close().await;

        served.with_context(|| format!("serving on {}", bind_addr))
    }
}
