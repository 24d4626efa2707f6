//! Local settings and paths
//!
//! `config.json` holds defaults for the backend url and fetch mode; command line
//! flags and environment variables override it. The login session is kept next to
//! it in `session.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bugtriage::prelude::FetchMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Config subdirectory under the platform config dir
const APP_DIR: &str = "bugr";

const SESSION_FILE: &str = "session.json";

const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Fetch mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FetchMode>,
}

impl CliConfig {
    /// Reads `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(?path, "no config file");
            return Ok(Self::default());
        }
        let text =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("write config {}", path.display()))
    }
}

fn app_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| anyhow!("no config directory; pass an explicit path"))?;
    Ok(dir.join(APP_DIR))
}

/// Where the login session is kept: `--session-file`, or `<config dir>/bugr/session.json`.
pub fn session_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(app_dir()?.join(SESSION_FILE)),
    }
}

/// Where defaults are kept: `--config`, or `<config dir>/bugr/config.json`.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(app_dir()?.join(CONFIG_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/tmp/custom-session.json");
        assert_eq!(session_path(Some(path.clone())).expect("path"), path);
        assert_eq!(config_path(Some(path.clone())).expect("path"), path);
    }

    #[test]
    fn missing_config_is_empty_and_saved_config_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        assert_eq!(CliConfig::load(&path).expect("load"), CliConfig::default());

        let config = CliConfig {
            url: Some("http://triage.local:8000".into()),
            mode: Some(FetchMode::ServerSide),
        };
        config.save(&path).expect("save");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"server\""));
        assert_eq!(CliConfig::load(&path).expect("reload"), config);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").expect("write");
        assert!(CliConfig::load(&path).is_err());
    }
}
