use anyhow::Result;
use bugtriage::prelude::*;
use serde_json::json;
use tracing::info;

use crate::cli::{
    AppContext, AuthArgs, AuthCommands,
    common::{confirm, password_or_prompt},
};

pub async fn handle(ctx: &AppContext, args: AuthArgs) -> Result<()> {
    match args.command {
        AuthCommands::Login { username, password } => login(ctx, &username, password).await,
        AuthCommands::Logout => logout(ctx),
        AuthCommands::Status => status(ctx).await,
        AuthCommands::Register {
            username,
            company,
            password,
        } => {
            let password = password_or_prompt(password, "New password")?;
            let registration = ctx.client.register(&username, &password, &company).await?;
            ctx.output.emit_json(&registration)
        }
        AuthCommands::ResetPassword { username, password } => {
            let password = password_or_prompt(password, "New password")?;
            ctx.client.reset_password(&username, &password).await?;
            ctx.output.emit_json(&json!({ "password_reset": username }))
        }
        AuthCommands::DeleteAccount {
            username,
            password,
            confirm: skip,
        } => {
            if !confirm(&format!("Delete account {username}?"), skip)? {
                return ctx.output.emit_json(&json!({ "deleted": false }));
            }
            let password = password_or_prompt(password, "Password")?;
            ctx.client.delete_account(&username, &password).await?;
            // the saved session may belong to the deleted user
            if !ctx.client.has_session() {
                Session::remove(&ctx.session_path)?;
            }
            ctx.output.emit_json(&json!({ "deleted": true }))
        }
    }
}

async fn login(ctx: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password, "Password")?;
    let session = ctx.client.login(username, &password).await?;
    session.save(&ctx.session_path)?;
    info!(path=?ctx.session_path, "session saved");
    let response = json!({
        "authenticated": true,
        "username": session.username,
        "company_id": session.company_id,
        "role": session.role,
    });
    ctx.client.set_session(session);
    ctx.output.emit_json(&response)
}

fn logout(ctx: &AppContext) -> Result<()> {
    ctx.client.logout();
    Session::remove(&ctx.session_path)?;
    ctx.output.emit_json(&json!({ "authenticated": false }))
}

async fn status(ctx: &AppContext) -> Result<()> {
    let Some(session) = ctx.client.session() else {
        return ctx.output.emit_json(&json!({
            "authenticated": false,
            "session_file": ctx.session_path,
        }));
    };
    // any authenticated call tells whether the backend still accepts the token
    let check = match ctx.client.overview().await {
        Ok(_) => "ok".to_string(),
        Err(err) if err.is_unauthenticated() => "session expired; log in again".to_string(),
        Err(err) => format!("check failed: {err}"),
    };
    ctx.output.emit_json(&json!({
        "authenticated": true,
        "username": session.username,
        "company_id": session.company_id,
        "role": session.role,
        "session_file": ctx.session_path,
        "check": check,
    }))
}
