//! HTTP API module.
//!
//! This module provides the HTTP server, its response types, and the run log
//! every engine stage writes to.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
