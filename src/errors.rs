use sea_orm::error::DbErr;
use thiserror::Error;

/// Errors surfaced by the availability services.
///
/// Database failures propagate untouched so callers can distinguish an
/// unreachable pool from bad reference data. Unit-of-measure problems get
/// their own variants because they are data errors an operator has to fix
/// in the host ERP, not conditions a retry will clear.
#[derive(Error, Debug)]
pub enum StockSyncError {
    #[error("database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("unit of measure {uom_id} does not exist")]
    UomNotFound { uom_id: i32 },

    #[error("cannot convert between unit {from_uom} and unit {to_uom}: different categories")]
    UomCategoryMismatch { from_uom: i32, to_uom: i32 },

    #[error("unit of measure {uom_id} has a non-positive factor")]
    UomFactorInvalid { uom_id: i32 },
}
