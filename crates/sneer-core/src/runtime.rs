//! The runtime: one identity, one tuple store, and the views built on them
//!
//! ```text
//! Runtime
//! ├── TupleSpace ──────── TupleStore ◀── Transport
//! ├── PartyArena
//! ├── ContactRegistry     (folds sneer/contact)
//! ├── ProfileArena        (profile/* by author)
//! └── ConversationArena   (chat/message between self and party)
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{SneerError, SneerResult};
use crate::identity::{Keyring, PrivateKey, PublicKey};
use crate::network::{Endpoint, Transport};
use crate::social::{
    Contact, ContactRegistry, Conversation, ConversationArena, ConversationsFold, Party,
    PartyArena, Profile, ProfileArena,
};
use crate::space::{LiveView, TupleSpace};
use crate::store::TupleStore;
use crate::tuple::{types, Value};

/// Field carrying a session number on locally published tuples
pub const SESSION_FIELD: &str = "session";

struct RuntimeInner {
    identity: PublicKey,
    keyring: Keyring,
    store: Arc<TupleStore>,
    space: TupleSpace,
    transport: Option<Arc<dyn Transport>>,
    parties: Arc<PartyArena>,
    self_party: Arc<Party>,
    contacts: Arc<ContactRegistry>,
    profiles: ProfileArena,
    conversations: Arc<ConversationArena>,
}

/// A running Sneer node. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Build the runtime over an opened store and attach it to `transport`.
    ///
    /// Group keys are restored from the store before attaching, so the
    /// transport's backfill already covers every group the runtime is in.
    pub(crate) fn start(
        key: PrivateKey,
        store: Arc<TupleStore>,
        transport: Option<Arc<dyn Transport>>,
    ) -> SneerResult<Self> {
        let identity = key.public_key();
        let keyring = Keyring::new();
        let space = TupleSpace::new(key, keyring.clone(), store.clone(), transport.clone());

        let group_keys = space
            .filter()
            .tuple_type(types::GROUP_KEY)
            .local_tuples()
            .audience(identity)
            .collect();
        for tuple in group_keys {
            let seed = tuple.payload().and_then(Value::as_bytes).ok_or_else(|| {
                SneerError::Crypto("Group key tuple carries no key".to_string())
            })?;
            keyring.insert(PrivateKey::from_bytes(seed)?);
        }

        let parties = Arc::new(PartyArena::new());
        let self_party = parties.produce(identity);
        let contacts = ContactRegistry::new(space.clone(), parties.clone());
        let profiles = ProfileArena::new(space.clone(), parties.clone());
        let conversations = Arc::new(ConversationArena::new(space.clone(), parties.clone()));

        if let Some(transport) = &transport {
            transport.attach(Endpoint::new(space.viewer(), &store));
        }

        info!(
            identity = %identity.short(),
            tuples = store.len(),
            groups = keyring.len(),
            "Runtime started"
        );

        Ok(Self {
            inner: Arc::new(RuntimeInner {
                identity,
                keyring,
                store,
                space,
                transport,
                parties,
                self_party,
                contacts,
                profiles,
                conversations,
            }),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Parties and Contacts
    // ═══════════════════════════════════════════════════════════════════════

    /// The party of this runtime's own identity
    pub fn self_party(&self) -> &Arc<Party> {
        &self.inner.self_party
    }

    /// The one party instance for `public_key`
    pub fn produce_party(&self, public_key: PublicKey) -> Arc<Party> {
        self.inner.parties.produce(public_key)
    }

    /// Register `party` under `nickname`.
    ///
    /// # Errors
    ///
    /// Returns `SneerError::NameConflict` if the nickname is bound to another
    /// party, `SneerError::InvalidNickname` if it is empty, and a storage
    /// error if the binding could not be persisted.
    pub fn add_contact(&self, nickname: &str, party: &Arc<Party>) -> SneerResult<Arc<Contact>> {
        self.inner.contacts.add_contact(nickname, party)
    }

    /// Rename an existing contact.
    pub fn set_nickname(&self, contact: &Contact, nickname: &str) -> SneerResult<()> {
        self.inner.contacts.add_contact(nickname, contact.party())?;
        Ok(())
    }

    pub fn find_contact(&self, party: &Party) -> Option<Arc<Contact>> {
        self.inner.contacts.find_contact(party)
    }

    pub fn find_contact_by_nickname(&self, nickname: &str) -> Option<Arc<Contact>> {
        self.inner.contacts.find_by_nickname(nickname)
    }

    /// Contact list snapshots: the current list, then one per change.
    pub fn contacts(&self) -> LiveView<Vec<Arc<Contact>>> {
        self.inner.contacts.watch()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conversations and Profiles
    // ═══════════════════════════════════════════════════════════════════════

    /// Conversation list snapshots, aligned with the contact list.
    pub fn conversations(&self) -> LiveView<Vec<Arc<Conversation>>> {
        self.inner
            .contacts
            .filter()
            .fold(ConversationsFold::new(self.inner.conversations.clone()))
    }

    /// The conversation with a contact's party, if it is a contact.
    pub fn conversation_with(&self, party: &Party) -> Option<Arc<Conversation>> {
        self.find_contact(party)?;
        Some(self.inner.conversations.produce(*party.public_key()))
    }

    pub fn profile_for(&self, party: &Party) -> Arc<Profile> {
        self.inner.profiles.produce(*party.public_key())
    }

    /// Display name: contact nickname, else the party's preferred nickname,
    /// else the abbreviated key.
    pub fn party_name(&self, party: &Party) -> String {
        if let Some(contact) = self.find_contact(party) {
            return contact.current_nickname();
        }
        self.profile_for(party)
            .current_preferred_nickname()
            .unwrap_or_else(|| party.public_key().short())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tuple Space and Groups
    // ═══════════════════════════════════════════════════════════════════════

    pub fn tuple_space(&self) -> &TupleSpace {
        &self.inner.space
    }

    /// Become a member of the group whose private key is `group`.
    ///
    /// The key is persisted as a local tuple addressed to this runtime that
    /// never reaches the transport, then the transport is asked to deliver what the group has published so far.
    pub fn join_group(&self, group: &PrivateKey) -> SneerResult<()> {
        let group_key = group.public_key();
        if self.inner.keyring.holds(&group_key) {
            return Ok(());
        }

        self.inner
            .space
            .publisher()
            .tuple_type(types::GROUP_KEY)
            .audience(self.inner.identity)
            .local()
            .publish(group.to_bytes().to_vec())?;
        self.inner.keyring.insert(group.clone());
        info!(group = %group_key.short(), "Joined group");

        if let Some(transport) = &self.inner.transport {
            transport.refresh(&self.inner.identity);
        }
        Ok(())
    }

    pub fn groups(&self) -> Vec<PublicKey> {
        self.inner.keyring.public_keys()
    }

    /// Session number to use next: one past the highest `session` field on
    /// local tuples, or 0.
    pub fn next_session_id(&self) -> i64 {
        self.inner
            .space
            .filter()
            .local_tuples()
            .collect()
            .iter()
            .filter_map(|tuple| tuple.get(SESSION_FIELD).and_then(Value::as_int))
            .max()
            .map_or(0, |last| last + 1)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Detach from the transport and close the store. Open subscriptions
    /// drain and then end.
    pub(crate) fn stop(&self) -> SneerResult<()> {
        if let Some(transport) = &self.inner.transport {
            transport.detach(&self.inner.identity);
        }
        self.inner.store.close()?;
        debug!(identity = %self.inner.identity.short(), "Runtime stopped");
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.store.is_closed()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("identity", &self.inner.identity)
            .field("store", &self.inner.store)
            .finish()
    }
}
