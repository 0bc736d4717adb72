//! Denylist tracker: polls the change-request repository, resolves submitted
//! hotspots against the warehouse inventory and generates per-entry reports.

pub mod export;
pub mod inventory;
pub mod links;
pub mod parser;
pub mod poll;
pub mod reconcile;
pub mod reports;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
