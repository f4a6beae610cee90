//! Row types shared across the workspace.

pub mod chat;
pub mod member;
pub mod message;
pub mod user;

pub use chat::{direct_key, Chat, ChatType, NewGroupChat};
pub use member::{ChatMember, MemberRole};
pub use message::{
    ChatMessage, MessageAttachment, MessageReaction, NewAttachment, NewMessage, ReadReceipt,
};
pub use user::User;
