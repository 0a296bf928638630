//! WebSocket Real-Time Streaming
//!
//! Pushes weather updates to dashboard clients via WebSocket.
//!
//! ## Architecture
//!
//! - **SubscriberRegistry**: Tracks live subscribers and fans payloads out to them
//! - **ConnectionSession**: Relays one subscriber's queue to its socket
//! - **Handler**: Upgrades `/ws` requests and starts a session
//! - **Messages**: The payload type carried to subscribers
//!
//! ## Usage
//!
//! The dashboard page uses the htmx WebSocket extension:
//!
//! ```html
//! <div hx-ext="ws" ws-connect="/ws">
//!   <span id="weather-data-temp"></span>
//! </div>
//! ```
//!
//! Every frame is a set of `hx-swap-oob` fragments keyed by element id.

mod handler;
mod messages;
mod registry;
mod session;

pub use handler::{websocket_handler, WebSocketTransport};
pub use messages::Payload;
pub use registry::{
    BroadcastReport, RegistryConfig, RegistryError, Subscriber, SubscriberId, SubscriberRegistry,
};
pub use session::{
    ConnectionSession, SessionConfig, SessionError, SessionState, Transport, TransportError,
};
