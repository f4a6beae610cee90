//! SQLite persistence for the Urlyn realtime backend.
//!
//! Owns the connection pool setup, embedded migrations, row entities and
//! the repositories the relay and auth layers build on.

pub mod connection;
pub mod entities;
pub mod errors;
pub mod migrations;
pub mod repos;
pub mod test_utils;

pub use connection::prepare_database;
pub use entities::{
    direct_key, Chat, ChatMember, ChatMessage, ChatType, MemberRole, MessageAttachment,
    MessageReaction, NewAttachment, NewGroupChat, NewMessage, ReadReceipt, User,
};
pub use errors::{StoreError, StoreResult};
pub use migrations::{run_migrations, MIGRATOR};
pub use repos::{ChatRepository, MemberRepository, MessageRepository, UserRepository};
