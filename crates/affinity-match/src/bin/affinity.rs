//! affinity: drive the match state machine from the command line.
//!
//! Talks to the REST tag store configured through `AFFINITY_*` variables, or
//! with `--offline <seed.json>` to an in-memory store loaded from (and
//! written back to) a JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use affinity_client::HttpTagStore;
use affinity_match::{
    ActionDispatcher, CelebrationLedger, DispatchConfig, FileLedger, HeartOutcome, MemoryTagStore,
    StoreSeed, Tag, TagStore, UserId,
};

#[derive(Parser)]
#[command(name = "affinity")]
#[command(author, version, about = "Approve, like, hide and match from the command line")]
#[command(propagate_version = true)]
struct Cli {
    /// Acting user id
    #[arg(short, long, global = true, default_value_t = 1)]
    viewer: i64,

    /// Use an in-memory store seeded from this JSON file instead of the API
    #[arg(long, global = true)]
    offline: Option<PathBuf>,

    /// Celebrated-match directory (overrides AFFINITY_LEDGER_DIR)
    #[arg(long, global = true)]
    ledger_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the relationship state toward one or more users
    State {
        /// Target user ids
        #[arg(required = true, num_args = 1..)]
        targets: Vec<i64>,
    },

    /// Press the heart button on a user
    Heart {
        /// Target user id
        target: i64,

        /// Send a like with this note when liking is allowed
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Toggle hiding a user
    Hide {
        /// Target user id
        target: i64,
    },

    /// Toggle any tag on a user (approve, like, hide, hot, maybe, save)
    Tag {
        /// Target user id
        target: i64,

        /// Tag name, case-insensitive
        tag: Tag,
    },

    /// Celebrate at most one new match
    Sweep,

    /// List users the viewer has tagged with a tag
    Tags {
        /// Tag name, case-insensitive
        tag: Tag,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let viewer = UserId(cli.viewer);

    let ledger: Arc<dyn CelebrationLedger> = Arc::new(match cli.ledger_dir {
        Some(ref dir) => FileLedger::new(dir),
        None => FileLedger::from_env(),
    });

    match cli.offline {
        Some(ref seed_path) => {
            let memory = load_seed(seed_path).await?;
            let store: Arc<dyn TagStore> = Arc::new(memory.clone());
            let dispatcher = ActionDispatcher::new(store, ledger, DispatchConfig::from_env());
            let result = run(&dispatcher, viewer, cli.command).await;
            save_seed(seed_path, &memory).await?;
            result
        }
        None => {
            let store: Arc<dyn TagStore> =
                Arc::new(HttpTagStore::from_env().context("Failed to configure tag store")?);
            let dispatcher = ActionDispatcher::new(store, ledger, DispatchConfig::from_env());
            run(&dispatcher, viewer, cli.command).await
        }
    }
}

async fn run(dispatcher: &ActionDispatcher, viewer: UserId, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::State { targets } => {
            let targets: Vec<UserId> = targets.into_iter().map(UserId).collect();
            let states = dispatcher.relationships(viewer, &targets).await;
            let rows: Vec<serde_json::Value> = states
                .into_iter()
                .map(|(target, state)| serde_json::json!({"target": target, "state": state}))
                .collect();
            print_json(&rows)
        }
        Commands::Heart { target, note } => {
            let target = UserId(target);
            let clicked = dispatcher.click_heart(viewer, target).await?;
            match (&clicked.outcome, note) {
                (HeartOutcome::NoteRequested, Some(note)) => {
                    let liked = dispatcher
                        .confirm_like(viewer, target, Some(note.as_str()))
                        .await?;
                    print_json(&liked)
                }
                _ => print_json(&clicked),
            }
        }
        Commands::Hide { target } => {
            print_json(&dispatcher.toggle_hide(viewer, UserId(target)).await?)
        }
        Commands::Tag { target, tag } => {
            print_json(&dispatcher.toggle_tag(viewer, UserId(target), tag).await?)
        }
        Commands::Sweep => {
            let celebration = dispatcher.sweep(viewer).await?;
            if celebration.is_none() {
                info!(viewer_id = %viewer, "No new matches");
            }
            print_json(&celebration)
        }
        Commands::Tags { tag } => {
            let users = dispatcher.tagged_users(viewer, tag).await?;
            print_json(&users)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_seed(path: &Path) -> anyhow::Result<MemoryTagStore> {
    let seed = match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str::<StoreSeed>(&raw)
            .with_context(|| format!("Invalid seed file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Seed file missing, starting empty");
            StoreSeed::default()
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    Ok(MemoryTagStore::from_seed(seed))
}

async fn save_seed(path: &Path, store: &MemoryTagStore) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(&store.to_seed())?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "affinity=info")
///
/// Console logs go to stderr so stdout stays valid JSON.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "affinity=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("affinity.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_seed_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = load_seed(&dir.path().join("absent.json")).await.unwrap();
        assert!(store.to_seed().relations.is_empty());
    }

    #[tokio::test]
    async fn test_seed_written_back_after_action() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{"relations": [{"viewer": 2, "target": 1, "tags": ["approve"]}]}"#,
        )
        .unwrap();

        let memory = load_seed(&path).await.unwrap();
        let dispatcher = ActionDispatcher::new(
            Arc::new(memory.clone()),
            Arc::new(FileLedger::new(dir.path().join("ledger"))),
            DispatchConfig::default(),
        );
        dispatcher.click_heart(UserId(1), UserId(2)).await.unwrap();
        save_seed(&path, &memory).await.unwrap();

        let reloaded = load_seed(&path).await.unwrap();
        assert_eq!(
            reloaded.peek(UserId(1), UserId(2)),
            affinity_match::TagSet::from([Tag::Approve])
        );
        assert_eq!(
            reloaded.peek(UserId(2), UserId(1)),
            affinity_match::TagSet::from([Tag::Approve])
        );
    }

    #[tokio::test]
    async fn test_invalid_seed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_seed(&path).await.is_err());
    }
}
