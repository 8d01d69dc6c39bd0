//! Command-line entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `inventory_core` linkage.
//! - Run a local demo of the sync engine against the in-process mirror.

use clap::{Parser, Subcommand};
use inventory_core::{
    init_logging, CatalogView, Item, LocalStore, LogLevel, MemoryRemoteMirror, RemoteMirror,
    SyncConfig, SyncEngine,
};
use log::info;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "inventory", version, about = "Local-first inventory catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Checks that the core crate is linked.
    Ping,
    /// Prints the core crate version.
    Version,
    /// Runs a short sync session against an in-process mirror.
    Demo {
        /// SQLite file for the local store; in-memory when omitted.
        #[arg(long)]
        db: Option<PathBuf>,
        /// Directory for rolling log files; logging stays off when omitted.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    match Cli::parse().command {
        Command::Ping => println!("inventory_core ping={}", inventory_core::ping()),
        Command::Version => println!("inventory_core version={}", inventory_core::core_version()),
        Command::Demo { db, log_dir } => run_demo(db, log_dir).await?,
    }
    Ok(())
}

async fn run_demo(db: Option<PathBuf>, log_dir: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = log_dir {
        init_logging(LogLevel::default_for_build().as_str(), &dir.to_string_lossy())?;
    }

    let store = Arc::new(match db {
        Some(path) => LocalStore::open(path)?,
        None => LocalStore::open_in_memory()?,
    });
    let mirror = Arc::new(MemoryRemoteMirror::new());
    let remote: Arc<dyn RemoteMirror> = mirror.clone();
    let engine = SyncEngine::start(store, remote, SyncConfig::default()).await?;
    info!("event=demo_start module=cli status=ok");

    engine.add_item("Keyboard", 2, 49.9).await?;
    let mouse = engine.add_item("Mouse", 3, 20.0).await?;

    // Another client edits the mouse and adds a cable.
    let cable = Uuid::new_v4();
    mirror.put_document(
        mouse.id.to_string(),
        json!({
            "name": mouse.name,
            "quantity": 7,
            "unitPrice": mouse.unit_price,
            "updatedAt": mouse.updated_at + 1,
        }),
    );
    mirror.put_document(
        cable.to_string(),
        json!({ "name": "Cable", "quantity": 10, "unitPrice": 2.5, "updatedAt": 1 }),
    );

    let mut view = engine.observe_catalog();
    let arrived = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(items) = view.changed().await {
            if items.iter().any(|item| item.id == cable) {
                break;
            }
        }
    })
    .await;
    if arrived.is_err() {
        println!("remote changes did not arrive in time");
    }

    print_catalog(&view);
    engine.shutdown().await;
    println!("remote documents={}", mirror.len());
    Ok(())
}

fn print_catalog(view: &CatalogView) {
    for Item {
        id,
        name,
        quantity,
        unit_price,
        ..
    } in view.current().iter()
    {
        println!("{id} {name:<12} qty={quantity:<4} price={unit_price:.2}");
    }
    let summary = view.summary();
    println!(
        "items={} stock_value={:.2}",
        summary.total_items, summary.total_stock_value
    );
}
