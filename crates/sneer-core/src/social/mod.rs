//! Views derived from the tuple stream: parties, contacts, profiles and
//! conversations
//!
//! None of these hold durable state. Each is rebuilt by folding store
//! subscriptions, so replaying the tuple log is enough to restore them.

mod contact;
mod conversation;
mod party;
mod profile;

pub use contact::{Contact, ContactRegistry};
pub use conversation::{conversation_id, Conversation, ConversationArena, Message};
pub use party::{Party, PartyArena};
pub use profile::{Profile, ProfileArena};

pub(crate) use conversation::ConversationsFold;
