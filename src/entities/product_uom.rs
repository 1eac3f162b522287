use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Unit of measure reference data.
///
/// `factor` relates the unit to its category's base unit: dividing a
/// quantity by the source factor expresses it in base units, multiplying by
/// the target factor expresses it in the target unit. `rounding` is the
/// smallest increment the unit is counted in.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_uom")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub category_id: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 6)))")]
    pub factor: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub rounding: Decimal,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
