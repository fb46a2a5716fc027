//! Runtime utilities for nfascope: the operational HTTP server and shutdown handling.
#![allow(missing_docs)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cognitive_complexity)]

pub mod health;
pub mod shutdown;
