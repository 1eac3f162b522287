//! Stocksync
//!
//! A dirty-tracked availability cache for ERP inventory schemas. The host
//! ERP reports row changes through [`services::ChangeEventService`]; an
//! append-only log remembers which products are stale; [`services::SyncService`]
//! recomputes their availability figures from stock moves in bounded
//! batches and publishes them back to the log, where ERP clients read them
//! without touching the move ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

pub use config::AppConfig;
pub use errors::StockSyncError;
pub use services::{ProductAvailability, Services, SyncReport};
