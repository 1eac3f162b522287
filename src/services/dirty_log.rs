use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Condition, Expr, JoinType, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, Set};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entities::availability_log;
use crate::errors::StockSyncError;
use crate::events::{Event, EventSender};
use crate::services::availability::ProductAvailability;

/// The authoritative cache entry for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedAvailability {
    pub product_id: i32,
    pub as_of: DateTime<Utc>,
    pub dirty: bool,
    pub qty_available: Decimal,
    pub virtual_available: Decimal,
    pub incoming_qty: Decimal,
    pub outgoing_qty: Decimal,
}

impl From<availability_log::Model> for CachedAvailability {
    fn from(row: availability_log::Model) -> Self {
        Self {
            product_id: row.product_id,
            as_of: row.update_time,
            dirty: row.dirty,
            qty_available: row.cached_qty_available,
            virtual_available: row.cached_virtual_available,
            incoming_qty: row.cached_incoming_qty,
            outgoing_qty: row.cached_outgoing_qty,
        }
    }
}

/// Append-only dirty tracking over the availability log.
///
/// Writers only ever insert; the current state of a product is whichever of
/// its rows is greatest by `(update_time, dirty, id)`. All reads go through
/// an anti-join that discards superseded rows, so marking, publishing and
/// reading need no row locks and tolerate concurrent writers.
pub struct DirtyLogService {
    events: Option<EventSender>,
}

impl DirtyLogService {
    pub fn new(events: Option<EventSender>) -> Self {
        Self { events }
    }

    /// Flags products for recomputation by appending dirty entries.
    /// Duplicate ids collapse to one entry. Returns how many products were
    /// flagged.
    pub async fn mark_dirty<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_ids: &[i32],
    ) -> Result<u64, StockSyncError> {
        let ids: BTreeSet<i32> = product_ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let rows: Vec<availability_log::ActiveModel> = ids
            .iter()
            .map(|id| availability_log::ActiveModel {
                product_id: Set(*id),
                update_time: Set(now),
                dirty: Set(true),
                cached_qty_available: Set(Decimal::ZERO),
                cached_virtual_available: Set(Decimal::ZERO),
                cached_incoming_qty: Set(Decimal::ZERO),
                cached_outgoing_qty: Set(Decimal::ZERO),
                ..Default::default()
            })
            .collect();
        let flagged = rows.len() as u64;

        availability_log::Entity::insert_many(rows).exec(conn).await?;
        debug!(products = flagged, "marked products dirty");
        Ok(flagged)
    }

    /// Publishes freshly computed figures as clean entries, superseding the
    /// dirty rows that triggered the recomputation.
    ///
    /// `as_of` must be the instant the recomputation started reading, not
    /// the current time. Marks stamped after that instant sort newer than
    /// the published rows (equal stamps resolve to dirty), so a product
    /// flagged while its figures were being computed stays dirty.
    pub async fn publish_clean<C: ConnectionTrait>(
        &self,
        conn: &C,
        figures: &HashMap<i32, ProductAvailability>,
        as_of: DateTime<Utc>,
    ) -> Result<u64, StockSyncError> {
        if figures.is_empty() {
            return Ok(0);
        }

        let mut ids: Vec<i32> = figures.keys().copied().collect();
        ids.sort_unstable();

        let rows: Vec<availability_log::ActiveModel> = ids
            .iter()
            .map(|id| {
                let f = &figures[id];
                availability_log::ActiveModel {
                    product_id: Set(*id),
                    update_time: Set(as_of),
                    dirty: Set(false),
                    cached_qty_available: Set(f.qty_available),
                    cached_virtual_available: Set(f.virtual_available),
                    cached_incoming_qty: Set(f.incoming_qty),
                    cached_outgoing_qty: Set(f.outgoing_qty),
                    ..Default::default()
                }
            })
            .collect();
        let published = rows.len() as u64;

        availability_log::Entity::insert_many(rows).exec(conn).await?;
        debug!(products = published, "published clean availability figures");
        Ok(published)
    }

    /// Lists products whose authoritative entry is dirty, ascending by id.
    /// `filter` restricts the scan to the given products; an empty filter
    /// matches nothing.
    pub async fn list_dirty<C: ConnectionTrait>(
        &self,
        conn: &C,
        filter: Option<&[i32]>,
    ) -> Result<Vec<i32>, StockSyncError> {
        if matches!(filter, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let l = log_alias();
        let mut query = authoritative_entries();
        query
            .column((l.clone(), availability_log::Column::ProductId))
            .and_where(Expr::col((l.clone(), availability_log::Column::Dirty)).eq(true));
        if let Some(ids) = filter {
            query.and_where(
                Expr::col((l.clone(), availability_log::Column::ProductId))
                    .is_in(ids.iter().copied()),
            );
        }
        query.order_by((l, availability_log::Column::ProductId), Order::Asc);

        let stmt = conn.get_database_backend().build(&query);
        let rows = DirtyProductId::find_by_statement(stmt).all(conn).await?;
        Ok(rows.into_iter().map(|row| row.product_id).collect())
    }

    /// Reads the authoritative cache entries for the given products.
    /// Products that never entered the log are absent from the result.
    pub async fn cached_availability<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_ids: &[i32],
    ) -> Result<HashMap<i32, CachedAvailability>, StockSyncError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let l = log_alias();
        let mut query = authoritative_entries();
        query
            .columns(log_columns().map(|col| (l.clone(), col)))
            .and_where(
                Expr::col((l, availability_log::Column::ProductId))
                    .is_in(product_ids.iter().copied()),
            );

        let stmt = conn.get_database_backend().build(&query);
        let rows = availability_log::Model::find_by_statement(stmt)
            .all(conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.product_id, CachedAvailability::from(row)))
            .collect())
    }

    /// Deletes every log entry that a newer entry for the same product has
    /// superseded. The surviving row per product is exactly the one reads
    /// resolve to, so the dirty set and the cached figures are unchanged.
    pub async fn vacuum<C: ConnectionTrait>(&self, conn: &C) -> Result<u64, StockSyncError> {
        let mut keep = authoritative_entries();
        keep.column((log_alias(), availability_log::Column::Id));

        let delete = Query::delete()
            .from_table(availability_log::Entity)
            .and_where(Expr::col(availability_log::Column::Id).not_in_subquery(keep))
            .to_owned();

        let stmt = conn.get_database_backend().build(&delete);
        let purged = conn.execute(stmt).await?.rows_affected();
        info!(purged, "vacuumed availability log");

        if let Some(events) = &self.events {
            if let Err(e) = events
                .send(Event::LogVacuumed {
                    entries_purged: purged,
                })
                .await
            {
                warn!(error = %e, "failed to emit vacuum event");
            }
        }

        Ok(purged)
    }
}

#[derive(Debug, FromQueryResult)]
struct DirtyProductId {
    product_id: i32,
}

fn log_alias() -> Alias {
    Alias::new("l")
}

fn newer_alias() -> Alias {
    Alias::new("newer")
}

fn log_columns() -> [availability_log::Column; 8] {
    use availability_log::Column::*;
    [
        Id,
        ProductId,
        UpdateTime,
        Dirty,
        CachedQtyAvailable,
        CachedVirtualAvailable,
        CachedIncomingQty,
        CachedOutgoingQty,
    ]
}

/// Anti-join skeleton selecting only authoritative log rows: rows for which
/// no other row of the same product is greater by `(update_time, dirty,
/// id)`. Dirty breaking the tie means a mark and a publish landing on the
/// same timestamp resolve to dirty, so a concurrent mark is never lost.
/// Callers add their own columns, filters and ordering.
fn authoritative_entries() -> SelectStatement {
    use availability_log::Column;

    let l = log_alias();
    let newer = newer_alias();

    let newer_wins = Condition::any()
        .add(
            Expr::col((newer.clone(), Column::UpdateTime))
                .gt(Expr::col((l.clone(), Column::UpdateTime))),
        )
        .add(
            Condition::all()
                .add(
                    Expr::col((newer.clone(), Column::UpdateTime))
                        .equals((l.clone(), Column::UpdateTime)),
                )
                .add(Expr::col((newer.clone(), Column::Dirty)).gt(Expr::col((l.clone(), Column::Dirty)))),
        )
        .add(
            Condition::all()
                .add(
                    Expr::col((newer.clone(), Column::UpdateTime))
                        .equals((l.clone(), Column::UpdateTime)),
                )
                .add(Expr::col((newer.clone(), Column::Dirty)).equals((l.clone(), Column::Dirty)))
                .add(Expr::col((newer.clone(), Column::Id)).gt(Expr::col((l.clone(), Column::Id)))),
        );

    Query::select()
        .from_as(availability_log::Entity, l.clone())
        .join_as(
            JoinType::LeftJoin,
            availability_log::Entity,
            newer.clone(),
            Condition::all()
                .add(Expr::col((newer.clone(), Column::ProductId)).equals((l, Column::ProductId)))
                .add(newer_wins),
        )
        .and_where(Expr::col((newer, Column::Id)).is_null())
        .to_owned()
}
