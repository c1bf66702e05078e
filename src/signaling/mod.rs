//! Single-broadcaster signaling
//!
//! This module owns the connection directory (who is connected, who is the
//! broadcaster) and the relay that forwards handshake messages between the
//! broadcaster and its watchers. Payloads are never inspected; the relay
//! only routes them and stamps the verified sender id.

pub mod directory;
pub mod protocol;
pub mod relay;

pub use directory::{ConnectionDirectory, Role};
pub use protocol::{ClientMessage, ConnectionId, ServerMessage};
pub use relay::SignalingRelay;
