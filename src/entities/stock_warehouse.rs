use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Warehouse master data. `lot_stock_id` points at the root storage
/// location whose subtree counts as internal stock; it is nullable because
/// freshly created warehouses may not have one assigned yet.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_warehouse")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub lot_stock_id: Option<i32>,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_location::Entity",
        from = "Column::LotStockId",
        to = "super::stock_location::Column::Id"
    )]
    LotStock,
}

impl Related<super::stock_location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LotStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
