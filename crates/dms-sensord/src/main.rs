//! DMS Sensor Daemon - scheduled health checks behind a REST API

use anyhow::Result;
use clap::Parser;
use dms_core::SensorConfig;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod daemon;

use daemon::Sensor;

#[derive(Parser, Debug)]
#[command(name = "dms-sensord")]
#[command(version, about = "DMS sensor daemon")]
struct Args {
    /// Config file (toml, yaml or json); defaults to ~/.dms/sensor.*
    #[arg(short, long, env = "DMS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Also write daily-rotated log files here
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut SensorConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = self.database {
            config.database.path = Some(path);
        }
        if let Some(dir) = self.log_dir {
            config.logging.dir = Some(dir);
        }
    }
}

/// Install the subscriber; the guard must live as long as file logging is wanted
fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "dms_sensord=info,dms_engine=info,dms_web=info,dms_auth=info,tower_http=info".into()
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "sensor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let (mut config, source) = SensorConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let _guard = init_logging(config.logging.dir.as_deref())?;

    info!("DMS sensor starting...");
    match source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let sensor = Sensor::new(config).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let run = sensor.run(shutdown_tx.clone());
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            if let Err(e) = result {
                error!("Sensor error: {:#}", e);
                return Err(e);
            }
            info!("Sensor stopped");
            return Ok(());
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    let _ = shutdown_tx.send(());
    run.await?;

    info!("Sensor shutdown complete");
    Ok(())
}
