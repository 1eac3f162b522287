use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, TransactionError, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{availability_log, product};
use crate::errors::StockSyncError;
use crate::events::{Event, EventSender};
use crate::services::availability::AvailabilityService;
use crate::services::dirty_log::DirtyLogService;

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub products_synced: u64,
    pub batches: u64,
}

/// Drives the cache back to clean in bounded transactions.
///
/// Each batch recomputes and publishes up to `batch_size` products inside
/// its own transaction. A crash mid-run loses nothing: finished batches are
/// already clean, unfinished products stay dirty and the next run picks
/// them up. Products marked dirty after the initial scan keep their dirty
/// flag, because their mark entry is newer than the figures this run
/// publishes.
pub struct SyncService {
    db: Arc<DatabaseConnection>,
    availability: Arc<AvailabilityService>,
    dirty_log: Arc<DirtyLogService>,
    batch_size: usize,
    events: Option<EventSender>,
}

impl SyncService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        availability: Arc<AvailabilityService>,
        dirty_log: Arc<DirtyLogService>,
        batch_size: usize,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            availability,
            dirty_log,
            batch_size: batch_size.max(1),
            events,
        }
    }

    /// Recomputes every dirty product, optionally restricted to `ids`.
    /// Products that are already clean are not touched at all.
    #[instrument(skip_all)]
    pub async fn sync(&self, ids: Option<&[i32]>) -> Result<SyncReport, StockSyncError> {
        let run_id = Uuid::new_v4();
        let dirty = self.dirty_log.list_dirty(self.db.as_ref(), ids).await?;
        if dirty.is_empty() {
            info!(%run_id, "availability cache already clean");
            return Ok(SyncReport {
                run_id,
                products_synced: 0,
                batches: 0,
            });
        }

        info!(
            %run_id,
            dirty = dirty.len(),
            batch_size = self.batch_size,
            "starting availability sync"
        );

        let mut products_synced = 0u64;
        let mut batches = 0u64;
        for chunk in dirty.chunks(self.batch_size) {
            let availability = Arc::clone(&self.availability);
            let dirty_log = Arc::clone(&self.dirty_log);
            let batch: Vec<i32> = chunk.to_vec();
            let batch_len = batch.len() as u64;

            self.db
                .transaction::<_, (), StockSyncError>(move |txn| {
                    Box::pin(async move {
                        // Stamp the published rows with the moment reading
                        // begins; marks landing mid-recompute stay newer.
                        let started_at = Utc::now();
                        let figures = availability.compute(txn, &batch).await?;
                        dirty_log.publish_clean(txn, &figures, started_at).await?;
                        Ok(())
                    })
                })
                .await
                .map_err(|e| match e {
                    TransactionError::Connection(db_err) => StockSyncError::DatabaseError(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                })?;

            products_synced += batch_len;
            batches += 1;
            info!(%run_id, batch = batches, products = batch_len, "synced batch");
        }

        if let Some(events) = &self.events {
            if let Err(e) = events
                .send(Event::SyncCompleted {
                    run_id,
                    products_synced,
                    batches,
                })
                .await
            {
                warn!(%run_id, error = %e, "failed to emit sync event");
            }
        }

        info!(%run_id, products_synced, batches, "availability sync complete");
        Ok(SyncReport {
            run_id,
            products_synced,
            batches,
        })
    }

    /// Prepares a database for availability tracking: runs the migrations,
    /// then flags every product the log has never seen as dirty so the
    /// first sync covers the whole catalog. Idempotent.
    pub async fn install(&self) -> Result<u64, StockSyncError> {
        crate::db::run_migrations(self.db.as_ref()).await?;

        let known = Query::select()
            .column(availability_log::Column::ProductId)
            .from(availability_log::Entity)
            .to_owned();

        let missing: Vec<i32> = product::Entity::find()
            .select_only()
            .column(product::Column::Id)
            .filter(
                Expr::col((product::Entity, product::Column::Id)).not_in_subquery(known),
            )
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        let backfilled = self
            .dirty_log
            .mark_dirty(self.db.as_ref(), &missing)
            .await?;
        info!(backfilled, "availability tracking installed");
        Ok(backfilled)
    }
}
