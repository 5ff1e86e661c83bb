//! Rule commands

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::Context;
use crate::cli::{CreateRuleArgs, RulesCommand};
use crate::output::{
    is_json_mode, print_info, print_json, print_rule_detail, print_rules_table, print_run_result,
    print_success,
};

pub async fn execute(ctx: &Context, command: RulesCommand) -> Result<()> {
    match command {
        RulesCommand::List => list(ctx).await,
        RulesCommand::Show { name } => show(ctx, &name).await,
        RulesCommand::Create(args) => create(ctx, args).await,
        RulesCommand::Delete { name, yes } => delete(ctx, &name, yes).await,
        RulesCommand::Run { name } => run(ctx, &name).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let rules = ctx.client()?.list_rules().await?;
    print_rules_table(&rules);
    Ok(())
}

async fn show(ctx: &Context, name: &str) -> Result<()> {
    let rule = ctx.client()?.get_rule(name).await?;
    print_rule_detail(&rule);
    Ok(())
}

async fn create(ctx: &Context, args: CreateRuleArgs) -> Result<()> {
    let rule = ctx
        .client()?
        .create_rule(&args.name, args.kind.into(), &args.argument, args.frequency)
        .await?;

    if is_json_mode() {
        print_json(&rule);
    } else {
        print_success(&format!("Rule {} created", rule.name.bold()));
    }
    Ok(())
}

async fn delete(ctx: &Context, name: &str, yes: bool) -> Result<()> {
    if !yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("Refusing to delete rule {} without --yes in a non-interactive session", name);
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete rule {}? Its results are kept", name))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            print_info("Nothing deleted");
            return Ok(());
        }
    }

    ctx.client()?.delete_rule(name).await?;

    if is_json_mode() {
        print_json(&serde_json::json!({ "deleted": name }));
    } else {
        print_success(&format!("Rule {} deleted", name));
    }
    Ok(())
}

async fn run(ctx: &Context, name: &str) -> Result<()> {
    let client = ctx.client()?;

    let spinner = if !is_json_mode() && atty::is(atty::Stream::Stdout) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Running {}...", name));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    } else {
        None
    };

    let result = client.run_rule(name).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    print_run_result(name, &result?);
    Ok(())
}
