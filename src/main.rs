use clap::{Parser, Subcommand};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use cursor_recall::boundary::FilterPolicy;
use cursor_recall::config::RecallConfig;
use cursor_recall::locate::{Platform, candidate_roots};
use cursor_recall::sessions::SessionProvider;
use cursor_recall::validate::WorkspaceValidator;
use cursor_recall::window::{CommitTimes, window_for};
use cursor_recall::{discover, pipeline};

/// Inspect Cursor's workspace chat stores and recall message history
/// over a time window.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/cursor-recall/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Explicit workspace-storage directory (skips auto-discovery).
    #[arg(long, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Print debug-level progress.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Report candidate workspace roots and their validation verdicts.
    Workspaces {
        /// Re-probe every root even if a cached verdict exists.
        #[arg(long)]
        refresh: bool,
    },
    /// Print chat messages whose sessions intersect a time window.
    Recall {
        /// Window start, epoch milliseconds.
        #[arg(long, value_name = "MS", requires = "end_ms")]
        start_ms: Option<i64>,
        /// Window end, epoch milliseconds.
        #[arg(long, value_name = "MS", requires = "start_ms")]
        end_ms: Option<i64>,
        /// Trailing window in hours, used when start/end are not given.
        #[arg(long, value_name = "HOURS", default_value_t = 24.0)]
        last_hours: f64,
        /// Scan every store chunk instead of only recently-modified ones.
        #[arg(long)]
        all_stores: bool,
        /// Emit JSON instead of a text listing.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Deserialize, Default)]
struct FileConfig {
    workspace_dir: Option<PathBuf>,
    boundary_policy: Option<String>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("cursor-recall/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Resolution order: CLI > environment > config file > defaults.
    let file_cfg = load_file_config(cli.config.as_deref())?;
    let mut config = RecallConfig::from_env();
    if let Some(path) = cli.workspace {
        config.workspace_override = Some(path);
    } else if config.workspace_override.is_none() {
        config.workspace_override = file_cfg.workspace_dir;
    }
    if let Some(raw) = file_cfg.boundary_policy
        && let Ok(policy) = raw.parse::<FilterPolicy>()
    {
        config.boundary_policy = policy;
    }

    match cli.command {
        Command::Workspaces { refresh } => run_workspaces(&config, refresh),
        Command::Recall {
            start_ms,
            end_ms,
            last_hours,
            all_stores,
            json,
        } => run_recall(config, start_ms, end_ms, last_hours, all_stores, json),
    }
}

fn run_workspaces(config: &RecallConfig, refresh: bool) -> Result<()> {
    let validator = WorkspaceValidator::new(config.validator_ttl);
    let roots = match &config.workspace_override {
        Some(path) => vec![path.clone()],
        None => candidate_roots(Platform::detect()?)?,
    };

    for root in &roots {
        let valid = validator.check(root, refresh);
        let stores = if valid {
            discover::discover_all(root).len()
        } else {
            0
        };
        println!(
            "{}  {}  ({} store file{})",
            if valid { "ok " } else { "bad" },
            root.display(),
            stores,
            if stores == 1 { "" } else { "s" },
        );
    }
    Ok(())
}

fn run_recall(
    mut config: RecallConfig,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
    last_hours: f64,
    all_stores: bool,
    json: bool,
) -> Result<()> {
    if all_stores {
        config.recency_window_hours = None;
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let times = match (start_ms, end_ms) {
        (Some(start), Some(end)) => CommitTimes {
            commit_ms: end,
            parent_ms: vec![start],
        },
        _ => CommitTimes {
            commit_ms: now_ms,
            parent_ms: vec![now_ms - (last_hours * 3_600_000.0) as i64],
        },
    };
    let window =
        window_for(Ok(times), now_ms).ok_or_else(|| eyre!("window bounds did not resolve"))?;

    let workspace = pipeline::resolve_workspace(&config)?;
    let provider = SessionProvider::new(&config);
    let messages = provider.get_messages(&workspace, &window);

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        for message in &messages {
            let when = message
                .timestamp_ms
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "[{when}] {} ({}): {}",
                message.role, message.session_name, message.content
            );
        }
        eprintln!("{} message(s)", messages.len());
    }
    Ok(())
}
