use anyhow::Result;
use serde_json::json;

use crate::cli::{AppContext, BatchArgs, BatchCommands, common::confirm};

pub async fn handle(ctx: &AppContext, args: BatchArgs) -> Result<()> {
    match args.command {
        BatchCommands::List => {
            let batches = ctx.client.batches().await?;
            ctx.output.emit_table(&batches)
        }
        BatchCommands::Undo { id, confirm: skip } => {
            if !confirm(
                &format!("Undo batch {id}? Its records are deleted too."),
                skip,
            )? {
                return ctx.output.emit_json(&json!({ "undone": false }));
            }
            ctx.client.undo_batch(id).await?;
            ctx.output.emit_json(&json!({ "undone": id }))
        }
    }
}
