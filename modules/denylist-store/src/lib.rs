pub mod artifacts;
pub mod error;
mod rows;
pub mod store;

pub use artifacts::ArtifactStore;
pub use error::{Result, StoreError};
pub use store::{DenylistStore, UnparsedIssue};
