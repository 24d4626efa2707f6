use anyhow::Result;
use bugtriage::prelude::*;
use serde_json::json;

use crate::cli::{
    AppContext, RecordsArgs, RecordsCommands,
    common::{ensure_applied, loaded_explorer},
};

pub async fn handle(ctx: &AppContext, args: RecordsArgs) -> Result<()> {
    match args.command {
        RecordsCommands::List { query, page, all } => {
            let mut explorer = loaded_explorer(ctx, &query).await?;
            if all {
                let rows = all_rows(&mut explorer).await?;
                return ctx.output.emit_table(&rows);
            }
            if explorer.set_page(page) && explorer.mode() == FetchMode::ServerSide {
                ensure_applied(explorer.refresh(RefreshTrigger::QueryChange).await)?;
            }
            let view = explorer.view();
            ctx.output.emit_table_or(
                &view.rows,
                &json!({
                    "page": view.page,
                    "total_pages": view.total_pages,
                    "total": view.total,
                    "rows": view.rows,
                }),
            )
        }
        RecordsCommands::Export { query, file } => {
            let explorer = loaded_explorer(ctx, &query).await?;
            let bytes = explorer.export(&file).await?;
            ctx.output.emit_json(&json!({
                "path": file,
                "bytes": bytes,
                "mode": explorer.mode(),
            }))
        }
        RecordsCommands::Delete { id } => {
            let id = RecordId::from(id);
            ctx.client.delete_bug(&id).await?;
            ctx.output.emit_json(&json!({ "deleted": id }))
        }
    }
}

/// Every row the query selects. Server-side, walks the pages.
async fn all_rows(explorer: &mut RecordExplorer) -> Result<Vec<BugRow>> {
    if explorer.mode() == FetchMode::ClientSide {
        return Ok(explorer.selected_rows());
    }
    let mut rows = explorer.view().rows;
    while explorer.next_page() {
        ensure_applied(explorer.refresh(RefreshTrigger::QueryChange).await)?;
        rows.extend(explorer.view().rows);
    }
    Ok(rows)
}
