//! nfascope `ClickHouse` persistence
#![allow(missing_docs)]

pub mod conversions;
pub mod models;
pub mod reader;
pub mod schema;
pub mod store;
pub mod types;
pub mod writer;

pub use reader::ClickhouseReader;
pub use store::ClickhouseStore;
pub use types::{AddressBytes, HashBytes};
pub use writer::ClickhouseWriter;
