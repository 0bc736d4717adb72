//! Read-only queries against the blockchain telemetry warehouse.
//!
//! The warehouse is an ETL-maintained Postgres + PostGIS database. This crate
//! never writes to it. Every windowed query covers the `window` blocks ending
//! at `max_block` (`max_block - window < block <= max_block`), so a report for
//! a given issue comes out the same whenever it is generated.

pub mod error;
mod warehouse;

pub use error::{Result, WarehouseError};
pub use warehouse::Warehouse;
