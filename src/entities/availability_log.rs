use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only availability ledger, the one table this crate owns.
///
/// Rows are never updated in place. Marking a product dirty appends a
/// `dirty = true` row with zeroed figures; publishing recomputed figures
/// appends a `dirty = false` row carrying them. The authoritative entry per
/// product is the maximum by `(update_time, dirty, id)`; preferring dirty
/// on equal timestamps keeps a concurrent mark from being shadowed by a
/// clean row published in the same instant. Superseded rows linger until
/// `vacuum` sweeps them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_availability_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_id: i32,
    pub update_time: DateTime<Utc>,
    pub dirty: bool,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub cached_qty_available: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub cached_virtual_available: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub cached_incoming_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub cached_outgoing_qty: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
