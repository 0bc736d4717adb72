pub mod config;
pub mod error;
pub mod reports;
pub mod types;

pub use config::{ArtifactLocation, Config};
pub use error::DenylistError;
pub use reports::*;
pub use types::*;
