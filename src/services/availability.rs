use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::sea_query::Condition;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::entities::stock_move::MoveState;
use crate::entities::{product, stock_move};
use crate::errors::StockSyncError;
use crate::services::conversion::UomConverter;
use crate::services::locations::InternalLocationResolver;

/// Availability figures for one product, expressed in its default unit.
///
/// `qty_available` counts completed inbound minus completed outbound stock.
/// `virtual_available` additionally nets pending moves. `incoming_qty` and
/// `outgoing_qty` are the pending in and out totals as positive magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub qty_available: Decimal,
    pub virtual_available: Decimal,
    pub incoming_qty: Decimal,
    pub outgoing_qty: Decimal,
}

/// Which way a move crosses the internal-stock boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    In,
    Out,
}

/// Recomputes availability figures from the stock move ledger.
///
/// Only moves that cross the internal-location boundary count; moves that
/// shuffle stock between two internal locations, or pass entirely outside,
/// cancel out of every figure. Quantities are summed per (unit, direction,
/// state) group first so each group converts to the product's default unit
/// exactly once.
pub struct AvailabilityService {
    conversion: Arc<UomConverter>,
    locations: Arc<InternalLocationResolver>,
}

impl AvailabilityService {
    pub fn new(conversion: Arc<UomConverter>, locations: Arc<InternalLocationResolver>) -> Self {
        Self {
            conversion,
            locations,
        }
    }

    /// Computes fresh figures for `product_ids`.
    ///
    /// Every requested id gets an entry in the result; products without
    /// counted moves, including ids unknown to the catalog, come back all
    /// zero. Products missing from the catalog have no default unit, so
    /// their figures stay in whatever units their moves carry.
    #[instrument(skip_all, fields(products = product_ids.len()))]
    pub async fn compute<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_ids: &[i32],
    ) -> Result<HashMap<i32, ProductAvailability>, StockSyncError> {
        let requested: BTreeSet<i32> = product_ids.iter().copied().collect();
        let mut figures: HashMap<i32, ProductAvailability> = requested
            .iter()
            .map(|id| (*id, ProductAvailability::default()))
            .collect();
        if requested.is_empty() {
            return Ok(figures);
        }

        let internal = self.locations.internal_location_ids(conn).await?;
        let internal_ids: Vec<i32> = internal.iter().copied().collect();

        // A move counts when exactly one endpoint is internal.
        let boundary_crossing = Condition::any()
            .add(
                Condition::all()
                    .add(stock_move::Column::LocationId.is_not_in(internal_ids.clone()))
                    .add(stock_move::Column::LocationDestId.is_in(internal_ids.clone())),
            )
            .add(
                Condition::all()
                    .add(stock_move::Column::LocationId.is_in(internal_ids.clone()))
                    .add(stock_move::Column::LocationDestId.is_not_in(internal_ids)),
            );

        let moves = stock_move::Entity::find()
            .filter(stock_move::Column::ProductId.is_in(requested.iter().copied()))
            .filter(stock_move::Column::State.is_in(MoveState::COUNTED))
            .filter(boundary_crossing)
            .all(conn)
            .await?;
        debug!(moves = moves.len(), "loaded counted stock moves");

        // Sum per (product, unit, direction, state) before converting.
        let mut groups: HashMap<(i32, i32, Direction, MoveState), Decimal> = HashMap::new();
        for mv in moves {
            let direction = if internal.contains(&mv.location_id) {
                Direction::Out
            } else {
                Direction::In
            };
            *groups
                .entry((mv.product_id, mv.product_uom, direction, mv.state))
                .or_insert(Decimal::ZERO) += mv.product_qty;
        }

        let default_uoms: HashMap<i32, i32> = product::Entity::find()
            .filter(product::Column::Id.is_in(requested.iter().copied()))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p.default_uom_id))
            .collect();

        for ((product_id, move_uom, direction, state), qty) in groups {
            let to_uom = default_uoms.get(&product_id).copied();
            let converted = self
                .conversion
                .convert(conn, Some(move_uom), qty, to_uom)
                .await
                .map_err(|e| {
                    error!(
                        product_id,
                        from_uom = move_uom,
                        to_uom,
                        error = %e,
                        "unit conversion failed while aggregating availability"
                    );
                    e
                })?;

            let Some(entry) = figures.get_mut(&product_id) else {
                continue;
            };
            let signed = match direction {
                Direction::In => converted,
                Direction::Out => -converted,
            };

            if state.is_done() {
                entry.qty_available += signed;
                entry.virtual_available += signed;
            } else {
                entry.virtual_available += signed;
                match direction {
                    Direction::In => entry.incoming_qty += converted,
                    Direction::Out => entry.outgoing_qty += converted,
                }
            }
        }

        Ok(figures)
    }

    /// Convenience wrapper for a single product.
    pub async fn compute_one<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: i32,
    ) -> Result<ProductAvailability, StockSyncError> {
        let mut figures = self.compute(conn, &[product_id]).await?;
        Ok(figures.remove(&product_id).unwrap_or_default())
    }
}
