//! Rights service user and session commands

use anyhow::Result;
use dms_core::{session_path, Error};

use super::{read_password, Context};
use crate::cli::UsersCommand;
use crate::output::{is_json_mode, print_info, print_json, print_success};
use crate::session;

pub async fn execute(ctx: &Context, command: UsersCommand) -> Result<()> {
    match command {
        UsersCommand::Create { user, password } => {
            let session = ctx.session_id()?;
            let password = read_password(password.password, &format!("Password for {}", user))?;
            ctx.auth_client()?.create_user(&user, &password, &session).await?;

            if is_json_mode() {
                print_json(&serde_json::json!({ "created": user }));
            } else {
                print_success(&format!("User {} created", user));
            }
            Ok(())
        }
    }
}

pub async fn login(ctx: &Context, user: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password, "Password")?;
    let session_id = ctx.auth_client()?.login(user, &password).await?;
    session::save(&session_path(), &session_id)?;

    if is_json_mode() {
        print_json(&serde_json::json!({ "user": user, "session_id": session_id }));
    } else {
        print_success(&format!("Logged in as {}", user));
    }
    Ok(())
}

/// Close the session server side, then forget it locally
pub async fn logout(ctx: &Context) -> Result<()> {
    let path = session_path();
    let session_id = match ctx.session.clone() {
        Some(id) => id,
        None => match session::load(&path)? {
            Some(id) => id,
            None => {
                print_info("No session to close");
                return Ok(());
            }
        },
    };

    // A rejected session is already gone server side
    let expired = match ctx.auth_client()?.logout(&session_id).await {
        Ok(()) => false,
        Err(Error::SessionRejected) => true,
        Err(e) => return Err(e.into()),
    };
    session::clear(&path)?;

    if is_json_mode() {
        print_json(&serde_json::json!({ "logged_out": true }));
    } else if expired {
        print_info("Session had already expired");
    } else {
        print_success("Logged out");
    }
    Ok(())
}
