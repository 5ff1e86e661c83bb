//! DMS console - operator client for sensors and the rights service

use anyhow::Result;
use clap::Parser;
use dms_core::ClientConfig;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod client;
mod commands;
mod output;
mod session;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dmsctl={},dms_auth={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let (config, source) = ClientConfig::load(cli.config.as_deref())?;
    if let Some(path) = source {
        debug!("Loaded client config from {}", path.display());
    }

    let ctx = Context {
        config,
        url: cli.url,
        sensor: cli.sensor,
        user: cli.user,
        auth_url: cli.auth_url,
        session: cli.session,
    };

    match cli.command {
        Commands::Ping => ping::execute(&ctx).await,
        Commands::Rules(command) => rules::execute(&ctx, command).await,
        Commands::Logs(args) => logs::execute(&ctx, args).await,
        Commands::Rights(command) => rights::execute(&ctx, command).await,
        Commands::Users(command) => users::execute(&ctx, command).await,
        Commands::Login { user, password } => users::login(&ctx, &user, password.password).await,
        Commands::Logout => users::logout(&ctx).await,
    }
}
