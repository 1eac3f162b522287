use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a stock move. Only `Confirmed`, `Waiting`, `Assigned`
/// and `Done` contribute to availability; draft and cancelled moves are
/// invisible to the aggregator.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase")]
pub enum MoveState {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "waiting")]
    Waiting,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl MoveState {
    /// States the aggregator counts.
    pub const COUNTED: [MoveState; 4] = [
        MoveState::Confirmed,
        MoveState::Waiting,
        MoveState::Assigned,
        MoveState::Done,
    ];

    pub fn is_done(&self) -> bool {
        matches!(self, MoveState::Done)
    }
}

/// A stock move in the host ERP: `product_qty` of `product_id`, expressed
/// in `product_uom`, travelling from `location_id` to `location_dest_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_move")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub product_id: i32,
    pub product_uom: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub product_qty: Decimal,
    pub location_id: i32,
    pub location_dest_id: i32,
    pub state: MoveState,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
