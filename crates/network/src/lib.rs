//! HTTP clients for the block explorer and off-chain token metadata.
#![allow(missing_docs)]

pub mod explorer;
pub mod http_retry;
pub mod metadata;

pub use explorer::ExplorerClient;
pub use metadata::MetadataClient;
