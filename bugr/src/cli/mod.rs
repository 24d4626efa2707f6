use std::path::PathBuf;

use anyhow::Result;
use bugtriage::prelude::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};

use crate::{
    config::{self, CliConfig},
    output::{Output, OutputFormat},
};

pub mod auth;
pub mod batches;
pub mod common;
pub mod explore;
pub mod records;
pub mod settings;
pub mod triage;

#[derive(Parser, Debug)]
#[command(name = "bugr")]
#[command(author, version, about = "bugr: explore, export, and triage bug reports", long_about = None)]
pub struct Cli {
    /// Backend URL. Default: environment `BUGTRIAGE_URL` or <http://127.0.0.1:8000>
    #[arg(short = 'u', long, env = "BUGTRIAGE_URL")]
    pub url: Option<String>,

    /// Fetch mode: `client` loads every record and filters locally, `server` asks the backend for one page at a time
    #[arg(short = 'm', long, env = "BUGTRIAGE_FETCH_MODE", value_enum)]
    pub mode: Option<FetchModeArg>,

    /// Session file. Default: `<config dir>/bugr/session.json`
    #[arg(long, env = "BUGR_SESSION_FILE", value_name = "FILE")]
    pub session_file: Option<PathBuf>,

    /// Config file with default url and mode. Default: `<config dir>/bugr/config.json`
    #[arg(long, env = "BUGR_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write output to file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// JSON output (default)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Table output format
    #[arg(short, long, global = true)]
    pub table: bool,

    /// Quiet mode - suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (repeat for more: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Append logs to this file instead of stderr. `explore` logs nowhere without it.
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Login, logout, and account management
    Auth(AuthArgs),

    /// List, export, and delete records
    #[command(alias = "record")]
    Records(RecordsArgs),

    /// Submit a new bug report
    Submit {
        /// one-line summary (required)
        summary: String,

        /// component, e.g. "Layout"
        #[arg(short, long, default_value = "")]
        component: String,

        /// severity label, e.g. S2. With --analyze, defaults to the predicted severity
        #[arg(short, long)]
        severity: Option<String>,

        /// status
        #[arg(long, default_value = bugtriage::bugs::DEFAULT_STATUS)]
        status: String,

        /// platform
        #[arg(long, default_value = bugtriage::bugs::DEFAULT_PLATFORM)]
        platform: String,

        /// predict severity and list similar reports before submitting.
        /// If --severity is also given and differs from the prediction, the correction is sent as feedback.
        #[arg(short, long)]
        analyze: bool,
    },

    /// Predict severity for a description and list similar reports
    Analyze {
        /// bug description
        text: String,
    },

    /// Report the actual severity of a report whose severity was predicted
    Feedback {
        /// report summary
        summary: String,

        /// predicted severity
        #[arg(long)]
        predicted: String,

        /// actual severity
        #[arg(long)]
        actual: String,
    },

    /// Dashboard totals, busiest components, and recent reports
    Overview,

    /// Training batch list and undo
    #[command(alias = "batch")]
    Batches(BatchArgs),

    /// Show or change saved defaults
    Config(ConfigArgs),

    /// Interactive record explorer (terminal ui)
    Explore {
        /// initial filter, applied without delay
        #[arg(short, long)]
        filter: Option<String>,

        /// seconds between background refreshes (0 disables)
        #[arg(long, default_value_t = 30)]
        refresh_secs: u64,
    },
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in and save the session
    Login {
        username: String,

        /// password (prompted if omitted)
        #[arg(long, env = "BUGR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Discard the saved session
    Logout,

    /// Display the saved session and whether the backend accepts it
    Status,

    /// Create an admin user together with a new company
    Register {
        username: String,

        /// company name (required)
        #[arg(long)]
        company: String,

        /// password (prompted if omitted)
        #[arg(long, env = "BUGR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Set a new password
    ResetPassword {
        username: String,

        /// new password (prompted if omitted)
        #[arg(long, env = "BUGR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Delete a user account
    DeleteAccount {
        username: String,

        /// password (prompted if omitted)
        #[arg(long, env = "BUGR_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// skip confirmation prompt
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Args, Debug)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsCommands,
}

/// Filter and sort shared by list and export
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// case-insensitive text matched against id, summary, component, severity and status
    #[arg(short, long)]
    pub filter: Option<String>,

    /// sort column
    #[arg(short, long, value_enum, default_value_t = SortKeyArg::Id)]
    pub sort: SortKeyArg,

    /// sort descending
    #[arg(long)]
    pub desc: bool,
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommands {
    /// List one page of records, or all with --all
    List {
        #[command(flatten)]
        query: QueryArgs,

        /// page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// every matching record, not just one page
        #[arg(long)]
        all: bool,
    },

    /// Export every matching record as CSV
    Export {
        #[command(flatten)]
        query: QueryArgs,

        /// output file
        #[arg(short = 'f', long, value_name = "FILE", default_value = EXPORT_FILE_NAME)]
        file: PathBuf,
    },

    /// Delete a record
    Delete {
        /// record id
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub command: BatchCommands,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// List training batches, newest first
    List,

    /// Delete a batch and every record it imported
    Undo {
        /// batch id
        id: i64,

        /// skip confirmation prompt
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print saved defaults and the file they live in
    Show,

    /// Save defaults used when --url and --mode are not given
    Set {
        /// backend url
        #[arg(long = "default-url", value_name = "URL")]
        url: Option<String>,

        /// fetch mode
        #[arg(long = "default-mode", value_enum, value_name = "MODE")]
        mode: Option<FetchModeArg>,
    },

    /// Remove saved defaults
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchModeArg {
    Client,
    Server,
}

impl FetchModeArg {
    pub fn to_mode(self) -> FetchMode {
        match self {
            Self::Client => FetchMode::ClientSide,
            Self::Server => FetchMode::ServerSide,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKeyArg {
    Id,
    Summary,
    Component,
    Severity,
    Status,
}

impl SortKeyArg {
    pub fn to_key(self) -> SortKey {
        match self {
            Self::Id => SortKey::Id,
            Self::Summary => SortKey::Summary,
            Self::Component => SortKey::Component,
            Self::Severity => SortKey::Severity,
            Self::Status => SortKey::Status,
        }
    }
}

pub struct AppContext {
    pub client: TriageClient,
    pub output: Output,
    pub session_path: PathBuf,
    pub config_path: PathBuf,
    pub config: CliConfig,
}

pub async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(resolve_output_format(&cli), cli.output.clone());
    let session_path = config::session_path(cli.session_file.clone())?;
    let config_path = config::config_path(cli.config.clone())?;
    let config = CliConfig::load(&config_path)?;
    let client = build_client(&cli, &config, &session_path)?;

    let ctx = AppContext {
        client,
        output,
        session_path,
        config_path,
        config,
    };

    match cli.command {
        Commands::Auth(args) => auth::handle(&ctx, args).await,
        Commands::Records(args) => records::handle(&ctx, args).await,
        Commands::Submit {
            summary,
            component,
            severity,
            status,
            platform,
            analyze,
        } => {
            let bug = NewBug::new(summary)
                .component(component)
                .status(status)
                .platform(platform);
            triage::submit(&ctx, bug, severity, analyze).await
        }
        Commands::Analyze { text } => triage::analyze(&ctx, &text).await,
        Commands::Feedback {
            summary,
            predicted,
            actual,
        } => triage::feedback(&ctx, &summary, &predicted, &actual).await,
        Commands::Overview => triage::overview(&ctx).await,
        Commands::Batches(args) => batches::handle(&ctx, args).await,
        Commands::Config(args) => settings::handle(&ctx, args),
        Commands::Explore {
            filter,
            refresh_secs,
        } => explore::run_explorer(&ctx, filter, refresh_secs).await,
    }
}

fn resolve_output_format(cli: &Cli) -> OutputFormat {
    if cli.quiet {
        OutputFormat::Quiet
    } else if cli.pretty {
        if cli.table {
            warn!("--pretty conflicts with --table. Using json pretty format");
        }
        OutputFormat::Pretty
    } else if cli.json {
        if cli.table {
            warn!("--json conflicts with --table. Using json format");
        }
        OutputFormat::Json
    } else if cli.table {
        OutputFormat::Table
    } else {
        OutputFormat::Json
    }
}

/// Client for the configured backend, with the saved session attached if there is one.
/// Flags and environment override the saved defaults.
fn build_client(cli: &Cli, saved: &CliConfig, session_path: &std::path::Path) -> Result<TriageClient> {
    let mut config = ClientConfig::default();
    if let Some(url) = cli.url.as_ref().or(saved.url.as_ref()) {
        config = config.base_url(url);
    }
    if let Some(mode) = cli.mode.map(FetchModeArg::to_mode).or(saved.mode) {
        config = config.mode(mode);
    }
    let client = TriageClient::with_config(config)?;
    if session_path.is_file() {
        match Session::load(session_path) {
            Ok(session) => client.set_session(session),
            Err(err) => warn!(error=%err, "ignoring unreadable session file"),
        }
    } else {
        debug!(path=?session_path, "no saved session");
    }
    Ok(client)
}
