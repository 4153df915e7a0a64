/// Clinic Outbox - operator console for the offline operation queue
mod config;

use crate::config::{AppConfig, StoreBackend};
use anyhow::Context;
use clap::{Parser, Subcommand};
use clinic_core::{ItemId, Operation, QueueStatus, QueueStore, ReachabilityProbe, Resource};
use clinic_server_client::ClinicServerClient;
use clinic_storage::{FileQueueStore, SqliteQueueStore};
use clinic_sync::{ConnectivityMonitor, QueueManager, SyncOutcome};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic-outbox")]
#[command(about = "Inspect and drive the clinic offline queue", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CLINIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show queue counts and connectivity
    Status,
    /// Dump items, identifier table and status as JSON
    Inspect,
    /// Queue an operation
    Enqueue {
        /// patient, appointment, vitalSign, supportContact or medication
        resource: Resource,
        /// create, update or delete
        operation: Operation,
        /// JSON object, e.g. '{"nombre": "Ana"}'
        payload: Value,
    },
    /// Run a sync pass now
    Sync,
    /// Put failed items back in line
    Retry {
        /// Item to retry
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Retry every failed item
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Remove one item from the queue
    Discard {
        /// Item to discard
        id: String,
    },
    /// Drop completed items
    Compact,
    /// Remove every item, failed ones included
    Clear {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
    /// Keep the queue running and print status changes until Ctrl-C
    Watch,
}

impl Commands {
    /// Whether the command needs to know if the server is reachable
    fn needs_network(&self) -> bool {
        matches!(self, Commands::Status | Commands::Sync | Commands::Watch)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_sync=info,clinic_outbox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let manager = open(&config, cli.command.needs_network()).await?;
    let result = run(&manager, cli.command).await;
    manager.shutdown().await;
    result
}

/// Build and initialize the queue manager from configuration
async fn open(config: &AppConfig, probe: bool) -> anyhow::Result<QueueManager> {
    let store: Arc<dyn QueueStore> = match config.storage.backend {
        StoreBackend::Sqlite => Arc::new(
            SqliteQueueStore::open(&config.storage.database_url)
                .await
                .with_context(|| format!("opening {}", config.storage.database_url))?,
        ),
        StoreBackend::File => Arc::new(FileQueueStore::new(config.storage.queue_file.clone())),
    };

    let client = Arc::new(ClinicServerClient::new(config.server_config())?);

    let online = if probe { client.probe().await } else { false };
    tracing::debug!(online, "Initial reachability");
    let monitor = Arc::new(ConnectivityMonitor::new(
        online,
        config.sync.connectivity_debounce(),
    ));

    let mut builder = QueueManager::builder(store, client.clone())
        .config(config.sync.clone())
        .monitor(monitor);
    if probe {
        builder = builder.probe(client);
    }

    let manager = builder.build();
    manager.initialize().await?;
    Ok(manager)
}

async fn run(manager: &QueueManager, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Status => {
            print_status(&manager.get_status().await);
        }
        Commands::Inspect => {
            let inspection = manager.inspect().await;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
        Commands::Enqueue {
            resource,
            operation,
            payload,
        } => {
            let id = manager.enqueue(resource, operation, payload).await?;
            println!("Queued {} {} as {}", operation, resource, id);
        }
        Commands::Sync => sync(manager).await?,
        Commands::Retry { id: Some(id), .. } => {
            manager.retry_item(&ItemId::new(id.clone())).await?;
            println!("Item {} is pending again", id);
        }
        Commands::Retry { id: None, .. } => {
            let count = manager.retry_failed().await?;
            println!("{} failed item(s) are pending again", count);
        }
        Commands::Discard { id } => {
            let removed = manager.remove_item(&ItemId::new(id)).await?;
            println!(
                "Discarded {} {} {} ({})",
                removed.id, removed.operation, removed.resource, removed.status
            );
        }
        Commands::Compact => {
            let removed = manager.compact().await?;
            println!("Removed {} completed item(s)", removed);
        }
        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to clear the queue without --yes");
            }
            let removed = manager.clear_queue().await?;
            println!("Removed {} item(s)", removed);
        }
        Commands::Watch => watch(manager).await?,
    }

    Ok(())
}

async fn sync(manager: &QueueManager) -> anyhow::Result<()> {
    match manager.sync_queue().await? {
        SyncOutcome::Completed(report) | SyncOutcome::Cancelled(report) => {
            println!(
                "Attempted {}, completed {}, rescheduled {}, failed {}, waiting on parents {}, backing off {}",
                report.attempted,
                report.completed,
                report.rescheduled,
                report.failed,
                report.deferred,
                report.backing_off
            );
        }
        SyncOutcome::Coalesced => println!("A sync pass is already running"),
        SyncOutcome::Offline => println!("Server unreachable, nothing sent"),
    }
    print_status(&manager.get_status().await);
    Ok(())
}

async fn watch(manager: &QueueManager) -> anyhow::Result<()> {
    let mut updates = manager.subscribe();
    print_status(&updates.borrow_and_update().clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = updates.borrow_and_update().clone();
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn print_status(status: &QueueStatus) {
    println!(
        "{} | total {} | pending {} | completed {} | failed {}{}",
        if status.is_online { "online" } else { "offline" },
        status.total,
        status.pending,
        status.completed,
        status.failed,
        if status.syncing { " | syncing" } else { "" }
    );
    if let Some(at) = status.last_sync_at {
        println!("  last sync: {}", at.to_rfc3339());
    }
    if let Some(warning) = &status.last_warning {
        println!("  warning: {}", warning);
    }
}
