use std::sync::Arc;

use sea_orm::sea_query::Condition;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::{debug, instrument, warn};

use crate::entities::{product, product_uom, stock_location, stock_move};
use crate::errors::StockSyncError;
use crate::events::{Event, EventSender};
use crate::services::conversion::UomConverter;
use crate::services::dirty_log::DirtyLogService;
use crate::services::locations::InternalLocationResolver;

/// Classifies host ERP changes into sets of products to mark dirty.
///
/// The host calls one hook per row change, passing the row's before and
/// after images (`None` on the missing side of an insert or delete). Hooks
/// run in the caller's transaction when it provides one, so marks roll back
/// with the change that caused them. Each hook returns how many products it
/// flagged.
pub struct ChangeEventService {
    dirty_log: Arc<DirtyLogService>,
    conversion: Arc<UomConverter>,
    locations: Arc<InternalLocationResolver>,
    events: Option<EventSender>,
}

impl ChangeEventService {
    pub fn new(
        dirty_log: Arc<DirtyLogService>,
        conversion: Arc<UomConverter>,
        locations: Arc<InternalLocationResolver>,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            dirty_log,
            conversion,
            locations,
            events,
        }
    }

    /// A stock move was inserted, updated or deleted. Both the before and
    /// after product are affected; an update that reassigns the move to a
    /// different product dirties both.
    #[instrument(skip_all)]
    pub async fn stock_move_changed<C: ConnectionTrait>(
        &self,
        conn: &C,
        old: Option<&stock_move::Model>,
        new: Option<&stock_move::Model>,
    ) -> Result<u64, StockSyncError> {
        let affected: Vec<i32> = old
            .map(|mv| mv.product_id)
            .into_iter()
            .chain(new.map(|mv| mv.product_id))
            .collect();
        self.mark(conn, affected).await
    }

    /// A product row changed. Recomputation covers default-unit edits,
    /// which change what every cached figure is expressed in.
    #[instrument(skip_all)]
    pub async fn product_changed<C: ConnectionTrait>(
        &self,
        conn: &C,
        old: Option<&product::Model>,
        new: Option<&product::Model>,
    ) -> Result<u64, StockSyncError> {
        let affected: Vec<i32> = old
            .map(|p| p.id)
            .into_iter()
            .chain(new.map(|p| p.id))
            .collect();
        self.mark(conn, affected).await
    }

    /// A storage location changed. The memoized internal set is dropped
    /// unconditionally; every product with a move touching the location is
    /// flagged, since the move's boundary classification may have flipped.
    #[instrument(skip_all)]
    pub async fn location_changed<C: ConnectionTrait>(
        &self,
        conn: &C,
        old: Option<&stock_location::Model>,
        _new: Option<&stock_location::Model>,
    ) -> Result<u64, StockSyncError> {
        self.locations.invalidate().await;

        let Some(old) = old else {
            // A brand new location has no moves yet, so nothing to flag.
            return Ok(0);
        };

        let affected: Vec<i32> = stock_move::Entity::find()
            .select_only()
            .column(stock_move::Column::ProductId)
            .distinct()
            .filter(
                Condition::any()
                    .add(stock_move::Column::LocationId.eq(old.id))
                    .add(stock_move::Column::LocationDestId.eq(old.id)),
            )
            .into_tuple()
            .all(conn)
            .await?;
        debug!(
            location_id = old.id,
            products = affected.len(),
            "location change touches products"
        );
        self.mark(conn, affected).await
    }

    /// A unit of measure changed. The converter's cached metadata for the
    /// unit is dropped and every product with moves expressed in it is
    /// flagged.
    #[instrument(skip_all)]
    pub async fn uom_changed<C: ConnectionTrait>(
        &self,
        conn: &C,
        old: Option<&product_uom::Model>,
        new: Option<&product_uom::Model>,
    ) -> Result<u64, StockSyncError> {
        for uom in [old, new].into_iter().flatten() {
            self.conversion.invalidate(uom.id);
        }

        let Some(old) = old else {
            return Ok(0);
        };

        let affected: Vec<i32> = stock_move::Entity::find()
            .select_only()
            .column(stock_move::Column::ProductId)
            .distinct()
            .filter(stock_move::Column::ProductUom.eq(old.id))
            .into_tuple()
            .all(conn)
            .await?;
        debug!(
            uom_id = old.id,
            products = affected.len(),
            "unit change touches products"
        );
        self.mark(conn, affected).await
    }

    async fn mark<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_ids: Vec<i32>,
    ) -> Result<u64, StockSyncError> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let flagged = self.dirty_log.mark_dirty(conn, &product_ids).await?;
        if flagged > 0 {
            if let Some(events) = &self.events {
                if let Err(e) = events
                    .send(Event::ProductsMarkedDirty { count: flagged })
                    .await
                {
                    warn!(error = %e, "failed to emit dirty event");
                }
            }
        }
        Ok(flagged)
    }
}
