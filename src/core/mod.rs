//! Core functionality for the toolkit

pub mod config;
pub mod extract;
pub mod ingest;
pub mod matcher;
pub mod network;
pub mod store;
pub mod summary;
pub mod tabular;
pub mod workspace;

pub use config::{CacheStrategy, Config};
pub use store::Store;
pub use workspace::Workspace;
