//! Rights commands

use anyhow::Result;
use dms_auth::RightsService;
use dms_core::{Error, Right};

use super::Context;
use crate::cli::{RightArgs, RightsCommand};
use crate::output::{is_json_mode, print_error, print_json, print_success};

pub async fn execute(ctx: &Context, command: RightsCommand) -> Result<()> {
    match command {
        RightsCommand::Check(args) => check(ctx, &args).await,
        RightsCommand::Grant(args) => grant(ctx, &args).await,
        RightsCommand::Revoke(args) => revoke(ctx, &args).await,
    }
}

async fn check(ctx: &Context, args: &RightArgs) -> Result<()> {
    let right: Right = args.right.parse()?;
    let user = args.user.as_str();

    let granted = match ctx.auth_client()?.has_right(user, right).await {
        Ok(granted) => granted,
        Err(Error::RightUnknown { .. }) => false,
        Err(e) => return Err(e.into()),
    };

    if is_json_mode() {
        print_json(&serde_json::json!({
            "user": user,
            "right": right.as_str(),
            "granted": granted,
        }));
    } else if granted {
        print_success(&format!("{} has {}", user, right));
    } else {
        print_error(&format!("{} does not have {}", user, right));
    }
    Ok(())
}

async fn grant(ctx: &Context, args: &RightArgs) -> Result<()> {
    let right: Right = args.right.parse()?;
    let session = ctx.session_id()?;
    ctx.auth_client()?.grant(&args.user, right, &session).await?;
    report(&args.user, right, true);
    Ok(())
}

async fn revoke(ctx: &Context, args: &RightArgs) -> Result<()> {
    let right: Right = args.right.parse()?;
    let session = ctx.session_id()?;
    ctx.auth_client()?.revoke(&args.user, right, &session).await?;
    report(&args.user, right, false);
    Ok(())
}

fn report(user: &str, right: Right, granted: bool) {
    if is_json_mode() {
        print_json(&serde_json::json!({
            "user": user,
            "right": right.as_str(),
            "granted": granted,
        }));
    } else if granted {
        print_success(&format!("Granted {} to {}", right, user));
    } else {
        print_success(&format!("Revoked {} from {}", right, user));
    }
}
