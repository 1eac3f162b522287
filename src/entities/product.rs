use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product master data, reduced to what availability tracking needs: the
/// default unit cached figures are expressed in.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_product")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub default_uom_id: i32,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_uom::Entity",
        from = "Column::DefaultUomId",
        to = "super::product_uom::Column::Id"
    )]
    DefaultUom,
}

impl Related<super::product_uom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DefaultUom.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
