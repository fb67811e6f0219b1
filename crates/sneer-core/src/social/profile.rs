//! Self-published profile attributes

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::party::{Party, PartyArena};
use crate::error::{SneerError, SneerResult};
use crate::identity::PublicKey;
use crate::space::{TupleSpace, Values};
use crate::tuple::{types, Tuple, Value};

const PREFERRED_NICKNAME: &str = "preferred-nickname";

/// Reactive attributes a party publishes about itself.
///
/// Attributes are open `profile/<name>` tuples authored by the party. Only
/// the runtime's own profile can be written; other profiles fill in as their
/// party's tuples arrive.
pub struct Profile {
    party: Arc<Party>,
    is_self: bool,
    space: TupleSpace,
}

impl Profile {
    pub fn party(&self) -> &Arc<Party> {
        &self.party
    }

    /// Whether this is the runtime's own profile
    pub fn is_self(&self) -> bool {
        self.is_self
    }

    /// Publish a new value for `attribute`.
    pub fn set_attribute(&self, attribute: &str, value: impl Into<Value>) -> SneerResult<Arc<Tuple>> {
        if !self.is_self {
            return Err(SneerError::InvalidOperation(format!(
                "Cannot set attribute '{}' on the profile of {}",
                attribute,
                self.party.public_key().short()
            )));
        }
        let tuple = self
            .space
            .publisher()
            .tuple_type(types::profile(attribute))
            .publish(value)?;
        info!(attribute, "Updated profile");
        Ok(tuple)
    }

    /// Every value published for `attribute`, in arrival order.
    pub fn attribute(&self, attribute: &str) -> Values<Value> {
        self.space
            .filter()
            .tuple_type(types::profile(attribute))
            .author(*self.party.public_key())
            .values(|tuple| tuple.payload().cloned())
    }

    /// Latest value of `attribute` received so far
    pub fn current_attribute(&self, attribute: &str) -> Option<Value> {
        self.attribute(attribute).current()
    }

    pub fn set_preferred_nickname(&self, nickname: &str) -> SneerResult<Arc<Tuple>> {
        if nickname.trim().is_empty() {
            return Err(SneerError::InvalidNickname(
                "Preferred nickname must not be empty".to_string(),
            ));
        }
        self.set_attribute(PREFERRED_NICKNAME, nickname)
    }

    /// Preferred nickname values in arrival order. Empty until the party's
    /// first profile tuple is received.
    pub fn preferred_nickname(&self) -> Values<String> {
        self.space
            .filter()
            .tuple_type(types::PREFERRED_NICKNAME)
            .author(*self.party.public_key())
            .values(|tuple| tuple.payload().and_then(Value::as_text).map(str::to_string))
    }

    pub fn current_preferred_nickname(&self) -> Option<String> {
        self.preferred_nickname().current()
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("party", &self.party)
            .field("is_self", &self.is_self)
            .finish()
    }
}

/// One profile per party, created on first request
pub struct ProfileArena {
    space: TupleSpace,
    parties: Arc<PartyArena>,
    profiles: Mutex<HashMap<PublicKey, Arc<Profile>>>,
}

impl ProfileArena {
    pub fn new(space: TupleSpace, parties: Arc<PartyArena>) -> Self {
        Self {
            space,
            parties,
            profiles: Mutex::new(HashMap::new()),
        }
    }

    pub fn produce(&self, party: PublicKey) -> Arc<Profile> {
        let me = self.space.identity();
        self.profiles
            .lock()
            .entry(party)
            .or_insert_with(|| {
                Arc::new(Profile {
                    party: self.parties.produce(party),
                    is_self: party == me,
                    space: self.space.clone(),
                })
            })
            .clone()
    }
}
