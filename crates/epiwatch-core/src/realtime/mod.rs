//! Real-time delivery layer
//!
//! The presence registry tracks connected users, the events module defines
//! the wire protocol, and the ws module binds both to an axum WebSocket.

mod events;
mod presence;
mod ws;

pub use events::{ClientMessage, LiveEvent};
pub use presence::{PresenceRegistry, Session};
pub use ws::ws_handler;
