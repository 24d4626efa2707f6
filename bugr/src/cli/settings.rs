use anyhow::Result;
use serde_json::json;

use crate::{
    cli::{AppContext, ConfigArgs, ConfigCommands},
    config::CliConfig,
};

pub fn handle(ctx: &AppContext, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => ctx.output.emit_json(&json!({
            "config_file": ctx.config_path,
            "session_file": ctx.session_path,
            "url": ctx.config.url,
            "mode": ctx.config.mode,
            "effective_url": ctx.client.get_config().base_url,
            "effective_mode": ctx.client.get_config().mode,
        })),
        ConfigCommands::Set { url, mode } => {
            let mut config = ctx.config.clone();
            if let Some(url) = url {
                config.url = Some(url);
            }
            if let Some(mode) = mode {
                config.mode = Some(mode.to_mode());
            }
            config.save(&ctx.config_path)?;
            ctx.output.emit_json(&config)
        }
        ConfigCommands::Reset => {
            CliConfig::default().save(&ctx.config_path)?;
            ctx.output.emit_json(&CliConfig::default())
        }
    }
}
