//! SeaORM entities.
//!
//! `availability_log` is the only table this crate owns. The remaining
//! entities mirror the host ERP's inventory schema and are read-only here;
//! their columns cover exactly what availability computation needs.

pub mod availability_log;
pub mod product;
pub mod product_uom;
pub mod stock_location;
pub mod stock_move;
pub mod stock_warehouse;
