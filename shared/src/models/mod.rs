//! Data models
//!
//! Shared between dash-server and dash-client (via API and the realtime feed).
//! All IDs are opaque strings.

pub mod dish;
pub mod order;
pub mod session;

// Re-exports
pub use dish::*;
pub use order::*;
pub use session::*;
