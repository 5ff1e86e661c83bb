//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use dms_core::RuleKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dmsctl")]
#[command(version, about = "Operator console for DMS sensors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sensor to talk to, by name from the client config
    #[arg(short, long, global = true)]
    pub sensor: Option<String>,

    /// Sensor base URL, overriding the client config
    #[arg(long, global = true, env = "DMS_SENSOR_URL")]
    pub url: Option<String>,

    /// User the sensor checks rights for
    #[arg(short, long, global = true, env = "DMS_USER")]
    pub user: Option<String>,

    /// Rights service base URL, overriding the client config
    #[arg(long, global = true, env = "DMS_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Rights service session id; defaults to the one saved by `login`
    #[arg(long, global = true, env = "DMS_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Client config file; defaults to ~/.dms/client.*
    #[arg(short, long, global = true, env = "DMS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the sensor is up
    Ping,

    /// Manage monitoring rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Browse rule results
    Logs(LogsArgs),

    /// Query and manage user rights
    #[command(subcommand)]
    Rights(RightsCommand),

    /// Manage rights service users
    #[command(subcommand)]
    Users(UsersCommand),

    /// Open a rights service session and save it for later commands
    Login {
        user: String,

        #[command(flatten)]
        password: PasswordArg,
    },

    /// Close the saved rights service session
    Logout,
}

#[derive(Subcommand)]
pub enum RulesCommand {
    /// List all rules
    List,

    /// Show a single rule
    Show {
        name: String,
    },

    /// Create a rule
    Create(CreateRuleArgs),

    /// Delete a rule (its results are kept)
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run a rule now and print its result
    Run {
        name: String,
    },
}

#[derive(Args)]
pub struct CreateRuleArgs {
    pub name: String,

    /// What the rule checks
    #[arg(short, long, value_enum)]
    pub kind: KindArg,

    /// File path or shell command
    #[arg(short, long = "arg")]
    pub argument: String,

    /// Seconds between automatic runs, 0 for on demand only
    #[arg(short, long, default_value = "0")]
    pub frequency: u64,
}

/// Rule kinds that can be created remotely
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    File,
    Command,
}

impl From<KindArg> for RuleKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::File => RuleKind::File,
            KindArg::Command => RuleKind::Command,
        }
    }
}

#[derive(Args)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: Option<LogsCommand>,

    /// Only show results of this rule
    #[arg(short, long)]
    pub rule: Option<String>,
}

#[derive(Subcommand)]
pub enum LogsCommand {
    /// Most recent result of a rule
    Last {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum RightsCommand {
    /// Ask whether USER holds RIGHT
    Check(RightArgs),

    /// Give RIGHT to USER (needs a session)
    Grant(RightArgs),

    /// Take RIGHT away from USER (needs a session)
    Revoke(RightArgs),
}

#[derive(Args)]
pub struct RightArgs {
    pub user: String,

    /// AdminUsers, AdminRights, AdminSensors, AdminRules or ViewReports
    pub right: String,
}

#[derive(Subcommand)]
pub enum UsersCommand {
    /// Register a user with no rights (needs a session)
    Create {
        user: String,

        #[command(flatten)]
        password: PasswordArg,
    },
}

#[derive(Args)]
pub struct PasswordArg {
    /// Prompted for when omitted on a terminal
    #[arg(short, long, env = "DMS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}
