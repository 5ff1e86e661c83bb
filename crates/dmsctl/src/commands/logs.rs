//! Log commands

use anyhow::Result;

use super::Context;
use crate::cli::{LogsArgs, LogsCommand};
use crate::output::{print_log_entry, print_logs_table};

pub async fn execute(ctx: &Context, args: LogsArgs) -> Result<()> {
    let client = ctx.client()?;

    match args.command {
        Some(LogsCommand::Last { name }) => {
            print_log_entry(&client.latest_log(&name).await?);
        }
        None => {
            let entries = client.list_logs(args.rule.as_deref()).await?;
            print_logs_table(&entries);
        }
    }
    Ok(())
}
