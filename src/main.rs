use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::error;

use stocksync::services::Services;
use stocksync::{config, db, events};

#[derive(Parser)]
#[command(
    name = "stocksync",
    about = "Dirty-tracked stock availability cache for ERP inventory schemas",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the availability log table and flag the whole catalog dirty
    Install,
    /// Recompute dirty products, optionally restricted to the given ids
    Sync { product_ids: Vec<i32> },
    /// Purge availability log entries newer entries have superseded
    Vacuum,
    /// Flag products for recomputation on the next sync
    MarkDirty { product_ids: Vec<i32> },
    /// Print the cached and freshly computed figures for one product
    Show { product_id: i32 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    tokio::spawn(events::process_events(event_rx));
    let services = Services::new(
        Arc::clone(&db),
        &cfg,
        Some(events::EventSender::new(event_tx)),
    );

    match cli.command {
        Commands::Install => {
            let backfilled = services.sync.install().await?;
            println!("installed; {backfilled} product(s) flagged for the first sync");
        }
        Commands::Sync { product_ids } => {
            let filter = (!product_ids.is_empty()).then_some(product_ids.as_slice());
            let report = services.sync.sync(filter).await?;
            println!(
                "run {}: synced {} product(s) in {} batch(es)",
                report.run_id, report.products_synced, report.batches
            );
        }
        Commands::Vacuum => {
            let purged = services.dirty_log.vacuum(db.as_ref()).await?;
            println!("purged {purged} superseded log entries");
        }
        Commands::MarkDirty { product_ids } => {
            let flagged = services
                .dirty_log
                .mark_dirty(db.as_ref(), &product_ids)
                .await?;
            println!("flagged {flagged} product(s) dirty");
        }
        Commands::Show { product_id } => {
            let cached = services
                .dirty_log
                .cached_availability(db.as_ref(), &[product_id])
                .await?;
            match cached.get(&product_id) {
                Some(entry) => println!("cached: {}", serde_json::to_string_pretty(entry)?),
                None => println!("cached: none (product {product_id} not in the log)"),
            }

            let fresh = services
                .availability
                .compute_one(db.as_ref(), product_id)
                .await?;
            println!("fresh:  {}", serde_json::to_string_pretty(&fresh)?);
        }
    }

    Ok(())
}
