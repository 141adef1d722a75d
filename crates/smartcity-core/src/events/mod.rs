//! Real-time record event bus.
//!
//! Write paths publish a [`RecordEvent`] after every successful change; the
//! WebSocket fan-out subscribes and pushes each event to connected clients.
//!
//! ```text
//! write path ──► EventBroadcaster (tokio broadcast) ──► /ws client 1
//!                                                   ──► /ws client 2
//! ```
//!
//! The bus is fire-and-forget: publishing never blocks and slow receivers
//! skip events they lagged behind on.

mod broadcaster;
mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{RecordEvent, RecordEventKind};
