mod walk;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sift_core::{
    Backend, Config, build_backend, build_manager, build_searcher, default_embedder,
    resolve_config_path,
};
use sift_index::{IndexManager, IndexReport};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Structure-aware code indexing with hybrid lexical/semantic retrieval")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $SIFT_CONFIG or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that store-relative paths are computed from
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty store
    CreateStore {
        /// Store name (default: store.default_store)
        store: Option<String>,
    },
    /// List existing stores
    ListStores,
    /// Drop a store and everything in it
    DropStore { store: String },
    /// Index files and directories, skipping unchanged files
    Index {
        store: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Re-chunk files even when their content is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Delete documents by path and/or path prefix
    Delete {
        store: String,
        paths: Vec<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Clear a store and index the given paths from scratch
    Reindex {
        store: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove documents under the given paths whose files no longer exist
    Sync {
        store: String,
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,
    },
    /// Document and chunk counts
    Stats {
        /// Store name (default: store.default_store)
        store: Option<String>,
    },
    /// Hybrid lexical/semantic search
    Search {
        store: String,
        query: String,
        /// Maximum results (default: search.limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            return;
        }
        tracing::info!("interrupt received, cancelling");
        trigger.cancel();
    });
    token
}

fn source_files(root: &Path, paths: &[PathBuf]) -> anyhow::Result<walk::Loaded> {
    let found = walk::discover(root, paths)?;
    Ok(walk::load(root, &found))
}

fn with_unreadable(
    mut report: IndexReport,
    unreadable: Vec<(String, std::io::Error)>,
) -> IndexReport {
    for (path, e) in unreadable {
        report.record_failure(path, &e);
    }
    report
}

async fn ensure_store(manager: &IndexManager, store: &str) -> anyhow::Result<()> {
    manager
        .create_store(store)
        .await
        .with_context(|| format!("failed to create store {store}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;

    let backend = build_backend(&config.store).await?;
    run(cli.command, &cli.root, &config, &backend).await
}

async fn run(command: Command, root: &Path, config: &Config, backend: &Backend) -> anyhow::Result<()> {
    let embedder = default_embedder(config);
    let manager = build_manager(config, backend, embedder.clone());
    let default_store = || config.store.default_store.clone();

    match command {
        Command::CreateStore { store } => {
            let store = store.unwrap_or_else(default_store);
            ensure_store(&manager, &store).await?;
            print_json(&serde_json::json!({ "store": store, "created": true }))
        }
        Command::ListStores => print_json(&manager.list_stores().await?),
        Command::DropStore { store } => {
            manager.delete_store(&store).await?;
            print_json(&serde_json::json!({ "store": store, "deleted": true }))
        }
        Command::Index { store, paths, force } => {
            ensure_store(&manager, &store).await?;
            let loaded = source_files(root, &paths)?;
            let report = manager
                .index_files(&store, loaded.files, force, &cancel_on_ctrl_c())
                .await?;
            print_json(&with_unreadable(report, loaded.unreadable))
        }
        Command::Delete {
            store,
            paths,
            prefix,
        } => {
            let paths = paths
                .iter()
                .map(|p| walk::relative_path(root, Path::new(p)))
                .collect();
            let report = manager.delete_files(&store, paths, prefix.as_deref()).await?;
            print_json(&report)
        }
        Command::Reindex { store, paths } => {
            ensure_store(&manager, &store).await?;
            let loaded = source_files(root, &paths)?;
            let report = manager
                .reindex(&store, loaded.files, &cancel_on_ctrl_c())
                .await?;
            print_json(&with_unreadable(report, loaded.unreadable))
        }
        Command::Sync { store, paths } => {
            let scopes: Vec<String> = paths
                .iter()
                .map(|p| walk::relative_path(root, p))
                .collect();
            let report = manager
                .sync_missing_files(&store, |path| walk::still_present(root, &scopes, path))
                .await?;
            print_json(&report)
        }
        Command::Stats { store } => {
            let store = store.unwrap_or_else(default_store);
            print_json(&manager.stats(&store).await?)
        }
        Command::Search {
            store,
            query,
            limit,
        } => {
            let searcher = build_searcher(config, backend, embedder)?;
            let limit = limit.unwrap_or(config.search.limit);
            let hits = searcher
                .search_chunks(backend.documents.as_ref(), &store, &query, limit)
                .await?;
            print_json(&hits)
        }
    }
}
