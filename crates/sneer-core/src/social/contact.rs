//! Contacts: nicknamed, locally registered parties
//!
//! The registry holds no state of its own beyond a cache. Every binding is a
//! self-addressed `sneer/contact` tuple; the registry folds its own
//! subscription over those tuples before answering any query, so after a
//! restart it rebuilds itself from the store alone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::party::{Party, PartyArena};
use crate::error::{SneerError, SneerResult};
use crate::identity::PublicKey;
use crate::space::{Fold, LiveView, TupleFilter, TupleSpace, TupleSubscription};
use crate::tuple::{types, Tuple};

const PARTY_FIELD: &str = "party";
const NICKNAME_FIELD: &str = "nickname";

/// `(party, nickname)` carried by a contact tuple
fn binding(tuple: &Tuple) -> Option<(PublicKey, String)> {
    let party = tuple.get(PARTY_FIELD)?.as_key()?;
    let nickname = tuple.get(NICKNAME_FIELD)?.as_text()?;
    Some((*party, nickname.to_string()))
}

fn contact_tuples(space: &TupleSpace) -> TupleFilter {
    space
        .filter()
        .tuple_type(types::CONTACT)
        .local_tuples()
        .audience(space.identity())
}

/// A party with a local nickname
pub struct Contact {
    party: Arc<Party>,
    nickname: RwLock<String>,
    space: TupleSpace,
}

impl Contact {
    pub fn party(&self) -> &Arc<Party> {
        &self.party
    }

    /// Nickname as of the last registry sync
    pub fn current_nickname(&self) -> String {
        self.nickname.read().clone()
    }

    /// The current nickname, then every rename in publish order.
    pub fn nickname(&self) -> LiveView<String> {
        contact_tuples(&self.space)
            .field(PARTY_FIELD, *self.party.public_key())
            .fold(NicknameFold::default())
    }
}

impl std::fmt::Debug for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contact")
            .field("party", &self.party)
            .field("nickname", &*self.nickname.read())
            .finish()
    }
}

#[derive(Default)]
struct NicknameFold {
    nickname: String,
}

impl Fold for NicknameFold {
    type Snapshot = String;

    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool {
        match binding(tuple) {
            Some((_, nickname)) if nickname != self.nickname => {
                self.nickname = nickname;
                true
            }
            _ => false,
        }
    }

    fn snapshot(&self) -> String {
        self.nickname.clone()
    }
}

struct RegistryState {
    tuples: TupleSubscription,
    contacts: Vec<Arc<Contact>>,
    by_party: HashMap<PublicKey, usize>,
    by_nickname: HashMap<String, PublicKey>,
}

/// Nickname ⇄ party bindings of one runtime.
pub struct ContactRegistry {
    space: TupleSpace,
    parties: Arc<PartyArena>,
    state: Mutex<RegistryState>,
}

impl ContactRegistry {
    pub fn new(space: TupleSpace, parties: Arc<PartyArena>) -> Arc<Self> {
        let tuples = contact_tuples(&space).tuples();
        let registry = Arc::new(Self {
            space,
            parties,
            state: Mutex::new(RegistryState {
                tuples,
                contacts: Vec::new(),
                by_party: HashMap::new(),
                by_nickname: HashMap::new(),
            }),
        });
        let count = registry.contacts().len();
        info!(contacts = count, "Loaded contact registry");
        registry
    }

    fn sync(&self, state: &mut RegistryState) {
        while let Some(tuple) = state.tuples.try_next() {
            match binding(&tuple) {
                Some((party, nickname)) => self.apply(state, party, nickname),
                None => warn!(author_seq = tuple.author_seq(), "Ignoring malformed contact tuple"),
            }
        }
    }

    fn apply(&self, state: &mut RegistryState, party: PublicKey, nickname: String) {
        match state.by_party.get(&party) {
            Some(&index) => {
                let contact = &state.contacts[index];
                let old = std::mem::replace(&mut *contact.nickname.write(), nickname.clone());
                if state.by_nickname.get(&old) == Some(&party) {
                    state.by_nickname.remove(&old);
                }
            }
            None => {
                state.by_party.insert(party, state.contacts.len());
                state.contacts.push(Arc::new(Contact {
                    party: self.parties.produce(party),
                    nickname: RwLock::new(nickname.clone()),
                    space: self.space.clone(),
                }));
            }
        }
        state.by_nickname.insert(nickname, party);
    }

    /// Bind `nickname` to `party`.
    ///
    /// Binding a party that already is a contact renames it. Fails with
    /// [`SneerError::NameConflict`] if the nickname belongs to another party,
    /// leaving every binding untouched.
    pub fn add_contact(&self, nickname: &str, party: &Arc<Party>) -> SneerResult<Arc<Contact>> {
        if nickname.trim().is_empty() {
            return Err(SneerError::InvalidNickname(
                "Nickname must not be empty".to_string(),
            ));
        }
        let key = *party.public_key();

        let mut state = self.state.lock();
        self.sync(&mut state);

        match state.by_nickname.get(nickname) {
            Some(owner) if *owner != key => {
                return Err(SneerError::NameConflict(nickname.to_string()));
            }
            Some(_) => {
                let index = state.by_party[&key];
                return Ok(state.contacts[index].clone());
            }
            None => {}
        }

        let renaming = state.by_party.contains_key(&key);
        self.space
            .publisher()
            .tuple_type(types::CONTACT)
            .audience(self.space.identity())
            .field(PARTY_FIELD, key)
            .field(NICKNAME_FIELD, nickname)
            .publish_empty()?;
        self.sync(&mut state);

        if renaming {
            info!(party = %key.short(), nickname, "Renamed contact");
        } else {
            info!(party = %key.short(), nickname, "Added contact");
        }

        let index = state.by_party.get(&key).copied().ok_or_else(|| {
            SneerError::Storage(format!("Contact tuple for {} was not stored", key.short()))
        })?;
        Ok(state.contacts[index].clone())
    }

    pub fn find_contact(&self, party: &Party) -> Option<Arc<Contact>> {
        let mut state = self.state.lock();
        self.sync(&mut state);
        state
            .by_party
            .get(party.public_key())
            .map(|&index| state.contacts[index].clone())
    }

    pub fn find_by_nickname(&self, nickname: &str) -> Option<Arc<Contact>> {
        let mut state = self.state.lock();
        self.sync(&mut state);
        let party = state.by_nickname.get(nickname)?;
        state
            .by_party
            .get(party)
            .map(|&index| state.contacts[index].clone())
    }

    /// Contacts in the order they were first added
    pub fn contacts(&self) -> Vec<Arc<Contact>> {
        let mut state = self.state.lock();
        self.sync(&mut state);
        state.contacts.clone()
    }

    fn resolve(&self, parties: &[PublicKey]) -> Vec<Arc<Contact>> {
        let mut state = self.state.lock();
        self.sync(&mut state);
        parties
            .iter()
            .filter_map(|key| state.by_party.get(key).map(|&index| state.contacts[index].clone()))
            .collect()
    }

    /// Contact list snapshots: the current list, then one per addition or
    /// rename.
    pub fn watch(self: &Arc<Self>) -> LiveView<Vec<Arc<Contact>>> {
        contact_tuples(&self.space).fold(ContactsFold {
            registry: self.clone(),
            order: Vec::new(),
            nicknames: HashMap::new(),
        })
    }

    /// Filter over the contact tuples this registry folds
    pub(crate) fn filter(&self) -> TupleFilter {
        contact_tuples(&self.space)
    }
}

struct ContactsFold {
    registry: Arc<ContactRegistry>,
    order: Vec<PublicKey>,
    nicknames: HashMap<PublicKey, String>,
}

impl Fold for ContactsFold {
    type Snapshot = Vec<Arc<Contact>>;

    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool {
        let Some((party, nickname)) = binding(tuple) else {
            return false;
        };
        match self.nicknames.insert(party, nickname.clone()) {
            None => {
                self.order.push(party);
                true
            }
            Some(old) => old != nickname,
        }
    }

    fn snapshot(&self) -> Vec<Arc<Contact>> {
        self.registry.resolve(&self.order)
    }
}

/// Contact parties in order of first addition; renames are not changes.
#[derive(Default)]
pub(crate) struct PartiesFold {
    order: Vec<PublicKey>,
}

impl Fold for PartiesFold {
    type Snapshot = Vec<PublicKey>;

    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool {
        match binding(tuple) {
            Some((party, _)) if !self.order.contains(&party) => {
                self.order.push(party);
                true
            }
            _ => false,
        }
    }

    fn snapshot(&self) -> Vec<PublicKey> {
        self.order.clone()
    }
}

impl std::fmt::Debug for ContactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactRegistry")
            .field("contacts", &self.state.lock().contacts.len())
            .finish()
    }
}
