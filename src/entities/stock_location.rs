use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Storage location tree, nested-set encoded.
///
/// `parent_left` and `parent_right` carry the host ERP's preorder interval
/// numbering. The internal-location resolver works off these bounds alone;
/// `parent_id` is kept for completeness but never walked.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_location")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub parent_id: Option<i32>,
    pub parent_left: i32,
    pub parent_right: i32,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
