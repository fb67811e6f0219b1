//! Audience visibility and filter criteria

use std::collections::BTreeMap;

use crate::identity::{Keyring, PublicKey};
use crate::tuple::{Tuple, Value};

/// Who is looking at the tuple space: an identity plus the group keys it holds.
#[derive(Debug, Clone)]
pub struct Viewer {
    identity: PublicKey,
    keyring: Keyring,
}

impl Viewer {
    pub fn new(identity: PublicKey, keyring: Keyring) -> Self {
        Self { identity, keyring }
    }

    pub fn identity(&self) -> &PublicKey {
        &self.identity
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Whether `tuple` may be shown to this viewer.
    ///
    /// Open tuples are visible to everyone. Addressed tuples are visible to
    /// their audience, to whoever holds the audience's private key, and always
    /// to their author.
    pub fn can_see(&self, tuple: &Tuple) -> bool {
        match tuple.audience() {
            None => true,
            Some(audience) => {
                *audience == self.identity
                    || *tuple.author() == self.identity
                    || self.keyring.holds(audience)
            }
        }
    }
}

/// Predicates accumulated by a [`TupleFilter`](super::TupleFilter), ANDed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Criteria {
    pub tuple_type: Option<String>,
    pub audience: Option<PublicKey>,
    pub author: Option<PublicKey>,
    pub local_only: bool,
    pub between: Option<(PublicKey, PublicKey)>,
    pub fields: BTreeMap<String, Value>,
}

impl Criteria {
    /// Visibility is checked first; nothing else about an invisible tuple is
    /// ever inspected.
    pub fn matches(&self, viewer: &Viewer, tuple: &Tuple) -> bool {
        if !viewer.can_see(tuple) {
            return false;
        }

        if let Some(tuple_type) = &self.tuple_type {
            if tuple.tuple_type() != tuple_type {
                return false;
            }
        }

        if let Some(audience) = &self.audience {
            if tuple.audience() != Some(audience) {
                return false;
            }
        }

        if let Some(author) = &self.author {
            if tuple.author() != author {
                return false;
            }
        }

        if self.local_only && tuple.author() != viewer.identity() {
            return false;
        }

        if let Some((a, b)) = &self.between {
            let forward = tuple.author() == a && tuple.audience() == Some(b);
            let backward = tuple.author() == b && tuple.audience() == Some(a);
            if !(forward || backward) {
                return false;
            }
        }

        self.fields
            .iter()
            .all(|(name, value)| tuple.get(name) == Some(value))
    }
}
