//! Real-time presence and chat relay.
//!
//! Connections authenticate with a session token, register presence,
//! join rooms for the chats they belong to, and exchange typed events.
//! Messages are persisted before fan-out; typing and read receipts are
//! relayed without persistence beyond the read markers themselves.

pub mod connection;
pub mod error;
pub mod events;
pub mod presence;
pub mod rooms;
pub mod services;
pub mod socket;
pub mod state;
pub mod typing;

pub use connection::{connect, disconnect, handle_client_event, ConnectionContext};
pub use error::{AuthRejection, RealtimeError, RealtimeResult};
pub use events::{ClientEvent, ServerEvent};
pub use presence::{ConnectionId, PresenceRegistry};
pub use rooms::RoomRegistry;
pub use state::{RealtimeState, SessionTokenAuthenticator, TokenAuthenticator};
pub use typing::TypingTracker;
