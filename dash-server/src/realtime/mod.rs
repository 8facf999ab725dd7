//! Realtime Update Channel
//!
//! ```text
//! broker (orders:new, orders:updated)
//!     └─ OrderRelay ── ack after hand-off ──▶ OrderHub (broadcast)
//!                                                 └─ /ws/orders sockets (one JSON Order per text frame)
//! ```

mod hub;
mod relay;
pub mod ws;

pub use hub::OrderHub;
pub use relay::OrderRelay;
