use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::entities::{stock_location, stock_warehouse};
use crate::errors::StockSyncError;

/// Resolves which storage locations count as internal stock.
///
/// Every warehouse contributes the nested-set interval rooted at its
/// `lot_stock_id` location; the union over all warehouses is the internal
/// set. The set is memoized until `invalidate` is called, which the change
/// hooks do on any location edit. Concurrent refreshes may race but both
/// compute the same set, so last-writer-wins is fine.
pub struct InternalLocationResolver {
    cache: RwLock<Option<Arc<HashSet<i32>>>>,
}

impl InternalLocationResolver {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(None),
        }
    }

    /// Returns the set of internal location ids, scanning the location tree
    /// on first use after an invalidation.
    pub async fn internal_location_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Arc<HashSet<i32>>, StockSyncError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let fresh = Arc::new(self.scan(conn).await?);
        *self.cache.write().await = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Forgets the memoized set; the next lookup rescans the tree.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn scan<C: ConnectionTrait>(&self, conn: &C) -> Result<HashSet<i32>, StockSyncError> {
        let warehouses = stock_warehouse::Entity::find().all(conn).await?;

        let mut internal = HashSet::new();
        for warehouse in warehouses {
            let Some(root_id) = warehouse.lot_stock_id else {
                continue;
            };
            let Some(root) = stock_location::Entity::find_by_id(root_id).one(conn).await? else {
                warn!(
                    warehouse_id = warehouse.id,
                    location_id = root_id,
                    "warehouse stock location does not exist, skipping"
                );
                continue;
            };

            // Interval-overlap form of the subtree test, matching how the
            // host ERP scopes stock to a warehouse. Besides descendants it
            // admits the root's ancestors, whose intervals enclose it.
            let ids: Vec<i32> = stock_location::Entity::find()
                .select_only()
                .column(stock_location::Column::Id)
                .filter(stock_location::Column::ParentLeft.lt(root.parent_right))
                .filter(stock_location::Column::ParentRight.gte(root.parent_left))
                .into_tuple()
                .all(conn)
                .await?;
            internal.extend(ids);
        }

        debug!(locations = internal.len(), "resolved internal location set");
        Ok(internal)
    }
}

impl Default for InternalLocationResolver {
    fn default() -> Self {
        Self::new()
    }
}
