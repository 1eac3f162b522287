use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use tracing::debug;

use crate::entities::product_uom;
use crate::errors::StockSyncError;

/// Metadata needed to convert through a unit: its category, its ratio to
/// the category base unit and its counting increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UomMeta {
    pub category_id: i32,
    pub factor: Decimal,
    pub rounding: Decimal,
}

/// Quantity conversion between units of measure.
///
/// Unit metadata is cached per process, including negative lookups, so a
/// sync run touching thousands of moves hits the database once per distinct
/// unit. `ChangeEventService` drops entries when the host edits a unit.
pub struct UomConverter {
    cache: DashMap<i32, Option<UomMeta>>,
}

impl UomConverter {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Converts `qty` from one unit to another.
    ///
    /// Follows the host ERP's rule: divide by the source factor to reach
    /// the category base unit, multiply by the target factor, then round to
    /// the target unit's increment. A missing unit on either side, a zero
    /// quantity or identical unit ids return the quantity unchanged.
    pub async fn convert<C: ConnectionTrait>(
        &self,
        conn: &C,
        from_uom: Option<i32>,
        qty: Decimal,
        to_uom: Option<i32>,
    ) -> Result<Decimal, StockSyncError> {
        let (from_id, to_id) = match (normalize(from_uom), normalize(to_uom)) {
            (Some(from_id), Some(to_id)) => (from_id, to_id),
            _ => return Ok(qty),
        };
        if qty.is_zero() || from_id == to_id {
            return Ok(qty);
        }

        let from = self
            .meta(conn, from_id)
            .await?
            .ok_or(StockSyncError::UomNotFound { uom_id: from_id })?;
        let to = self
            .meta(conn, to_id)
            .await?
            .ok_or(StockSyncError::UomNotFound { uom_id: to_id })?;

        if from.category_id != to.category_id {
            return Err(StockSyncError::UomCategoryMismatch {
                from_uom: from_id,
                to_uom: to_id,
            });
        }
        if from.factor <= Decimal::ZERO {
            return Err(StockSyncError::UomFactorInvalid { uom_id: from_id });
        }

        Ok(ratio_convert(qty, &from, &to))
    }

    /// Drops the cached metadata for one unit.
    pub fn invalidate(&self, uom_id: i32) {
        self.cache.remove(&uom_id);
    }

    /// Drops all cached metadata.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    async fn meta<C: ConnectionTrait>(
        &self,
        conn: &C,
        uom_id: i32,
    ) -> Result<Option<UomMeta>, StockSyncError> {
        if let Some(cached) = self.cache.get(&uom_id) {
            return Ok(*cached);
        }

        let fetched = product_uom::Entity::find_by_id(uom_id)
            .one(conn)
            .await?
            .map(|uom| UomMeta {
                category_id: uom.category_id,
                factor: uom.factor,
                rounding: uom.rounding,
            });
        debug!(
            uom_id,
            found = fetched.is_some(),
            "cached unit of measure metadata"
        );
        self.cache.insert(uom_id, fetched);
        Ok(fetched)
    }
}

impl Default for UomConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// One-off conversion for callers outside the sync pipeline. Builds a
/// throwaway converter, so every call pays its metadata reads; hold a
/// [`UomConverter`] instead when converting in a loop.
pub async fn convert_units<C: ConnectionTrait>(
    conn: &C,
    from_uom: Option<i32>,
    qty: Decimal,
    to_uom: Option<i32>,
) -> Result<Decimal, StockSyncError> {
    UomConverter::new().convert(conn, from_uom, qty, to_uom).await
}

/// Treats unset or non-positive unit ids as "no unit".
fn normalize(uom: Option<i32>) -> Option<i32> {
    uom.filter(|id| *id > 0)
}

fn ratio_convert(qty: Decimal, from: &UomMeta, to: &UomMeta) -> Decimal {
    round_to_increment(qty / from.factor * to.factor, to.rounding)
}

/// Rounds `value` to the nearest multiple of `increment`, ties to even.
/// A non-positive increment means the unit is uncounted and the value
/// passes through untouched.
pub fn round_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    (value / increment).round() * increment
}
