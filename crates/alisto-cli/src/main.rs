//! Alisto CLI - city services from the terminal.
//!
//! Browses news, tourist spots, hotlines and public projects, and keeps a
//! local queue of actions recorded while offline.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alisto_core::{ApiClient, Config, FileStore, KeyValueStore, Session, TtlCache};

/// Alisto - browse city news, services and hotlines, even offline
#[derive(Parser, Debug)]
#[command(name = "alisto")]
#[command(about = "City services from the terminal")]
#[command(version)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API base URL for this run (overrides config and ALISTO_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Latest city news
    News {
        /// Only this category (Festival, Health, ...)
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        featured: bool,
        #[arg(long)]
        search: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Tourist spots
    Spots {
        #[arg(long)]
        search: Option<String>,
    },
    /// Emergency hotlines (cached for a day)
    Hotlines,
    /// Public projects and their progress
    Projects {
        #[arg(long)]
        search: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Actions waiting for a connection
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
    /// Saved form drafts
    Draft {
        #[command(subcommand)]
        action: DraftCommand,
    },
    /// Local cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Show queued actions
    List,
    /// Queue an action, e.g. `queue add CREATE_ISSUE_REPORT '{"description": "..."}'`
    Add { kind: String, payload: String },
    /// Send an action now, queuing it if the server cannot be reached
    Submit { kind: String, payload: String },
    /// Send queued actions now if the server is reachable
    Drain,
    /// Discard every queued action
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    Save { form_id: String, data: String },
    Show { form_id: String },
    Clear { form_id: String },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove expired entries
    Sweep,
}

/// Shared services for a single command run.
pub struct Context {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub api: ApiClient,
    pub cache: TtlCache,
    pub session: Session,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG wins; otherwise warn, or debug with -v
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn build_context(cli: &Cli) -> Result<Context> {
    let config = Config::load().context("Failed to load config")?;
    let base_url = cli.api_url.clone().unwrap_or_else(|| config.api_base_url());

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.store_dir()?)?);
    let mut session = Session::new(Arc::clone(&store));
    session.load().await?;

    let mut api = ApiClient::new(&base_url, config.request_timeout())?;
    if let Some(token) = session.token() {
        api.set_token(token.to_string());
    }

    Ok(Context {
        cache: TtlCache::new(Arc::clone(&store)),
        config,
        store,
        api,
        session,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "Alisto CLI starting");

    let mut ctx = build_context(&cli).await?;
    commands::run(&mut ctx, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_add() {
        let cli = Cli::try_parse_from([
            "alisto",
            "queue",
            "add",
            "CREATE_ISSUE_REPORT",
            r#"{"description":"Pothole"}"#,
        ])
        .unwrap();
        match cli.command {
            Command::Queue {
                action: QueueCommand::Add { kind, payload },
            } => {
                assert_eq!(kind, "CREATE_ISSUE_REPORT");
                assert!(payload.contains("Pothole"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_queue_submit() {
        let cli = Cli::try_parse_from([
            "alisto",
            "queue",
            "submit",
            "MARK_NOTIFICATION_READ",
            r#"{"notificationId":"n1"}"#,
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Queue {
                action: QueueCommand::Submit { .. }
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["alisto", "news", "--pages", "2", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::News { pages: 2, .. }));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
