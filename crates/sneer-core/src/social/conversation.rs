//! Conversations derived from message tuples
//!
//! A [`Conversation`] is nothing but a filter: every `chat/message` tuple one
//! side addressed to the other, in store order. There is one per contact,
//! interned by party.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::contact::PartiesFold;
use super::party::{Party, PartyArena};
use crate::error::SneerResult;
use crate::identity::PublicKey;
use crate::space::{Fold, LiveView, TupleSpace};
use crate::tuple::{types, Tuple, Value};

const CONVERSATION_FIELD: &str = "conversation";

/// Stable identifier shared by both sides: BLAKE3 over the sorted key pair.
pub fn conversation_id(a: &PublicKey, b: &PublicKey) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = blake3::Hasher::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// One message in a conversation
#[derive(Debug, Clone)]
pub struct Message {
    tuple: Arc<Tuple>,
    is_own: bool,
}

impl Message {
    pub fn content(&self) -> Option<&Value> {
        self.tuple.payload()
    }

    /// Text content, if the message carries text
    pub fn text(&self) -> Option<&str> {
        self.content().and_then(Value::as_text)
    }

    pub fn sender(&self) -> &PublicKey {
        self.tuple.author()
    }

    /// Author's timestamp in milliseconds
    pub fn timestamp(&self) -> i64 {
        self.tuple.timestamp()
    }

    /// Whether this runtime sent the message
    pub fn is_own(&self) -> bool {
        self.is_own
    }

    pub fn tuple(&self) -> &Arc<Tuple> {
        &self.tuple
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.tuple == other.tuple
    }
}

impl Eq for Message {}

/// Message exchange with one contact
pub struct Conversation {
    party: Arc<Party>,
    id: String,
    space: TupleSpace,
}

impl Conversation {
    pub fn party(&self) -> &Arc<Party> {
        &self.party
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Message list snapshots: the current list, then one per new message.
    pub fn messages(&self) -> LiveView<Vec<Message>> {
        let me = self.space.identity();
        self.space
            .filter()
            .tuple_type(types::CHAT_MESSAGE)
            .between(me, *self.party.public_key())
            .fold(MessagesFold {
                me,
                messages: Vec::new(),
            })
    }

    /// Publish a message addressed to the other party.
    pub fn send_message(&self, content: impl Into<Value>) -> SneerResult<Message> {
        let tuple = self
            .space
            .publisher()
            .tuple_type(types::CHAT_MESSAGE)
            .audience(*self.party.public_key())
            .field(CONVERSATION_FIELD, self.id.as_str())
            .publish(content)?;
        debug!(party = %self.party.public_key().short(), "Sent message");
        Ok(Message {
            tuple,
            is_own: true,
        })
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("party", &self.party)
            .finish()
    }
}

struct MessagesFold {
    me: PublicKey,
    messages: Vec<Message>,
}

impl Fold for MessagesFold {
    type Snapshot = Vec<Message>;

    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool {
        self.messages.push(Message {
            tuple: tuple.clone(),
            is_own: *tuple.author() == self.me,
        });
        true
    }

    fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

/// One conversation per party, created on first request
pub struct ConversationArena {
    space: TupleSpace,
    parties: Arc<PartyArena>,
    conversations: Mutex<HashMap<PublicKey, Arc<Conversation>>>,
}

impl ConversationArena {
    pub fn new(space: TupleSpace, parties: Arc<PartyArena>) -> Self {
        Self {
            space,
            parties,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn produce(&self, party: PublicKey) -> Arc<Conversation> {
        let me = self.space.identity();
        self.conversations
            .lock()
            .entry(party)
            .or_insert_with(|| {
                Arc::new(Conversation {
                    party: self.parties.produce(party),
                    id: conversation_id(&me, &party),
                    space: self.space.clone(),
                })
            })
            .clone()
    }

    pub(crate) fn resolve(&self, parties: &[PublicKey]) -> Vec<Arc<Conversation>> {
        parties.iter().map(|party| self.produce(*party)).collect()
    }
}

/// Conversation list following the contact list, changing only when a
/// contact is added.
pub(crate) struct ConversationsFold {
    parties: PartiesFold,
    arena: Arc<ConversationArena>,
}

impl ConversationsFold {
    pub fn new(arena: Arc<ConversationArena>) -> Self {
        Self {
            parties: PartiesFold::default(),
            arena,
        }
    }
}

impl Fold for ConversationsFold {
    type Snapshot = Vec<Arc<Conversation>>;

    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool {
        self.parties.absorb(tuple)
    }

    fn snapshot(&self) -> Vec<Arc<Conversation>> {
        self.arena.resolve(&self.parties.snapshot())
    }
}
