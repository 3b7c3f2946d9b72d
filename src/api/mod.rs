//! HTTP API module.
//!
//! The axum server, its wire types, and the SSE log broadcaster.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
