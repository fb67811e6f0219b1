//! Interned party handles

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::identity::PublicKey;

/// Stable handle for a correspondent's public key.
///
/// Within one runtime there is exactly one `Arc<Party>` per key, so
/// `Arc::ptr_eq` and key equality always agree.
#[derive(PartialEq, Eq, Hash)]
pub struct Party {
    public_key: PublicKey,
}

impl Party {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({})", self.public_key.short())
    }
}

/// Lookup-or-insert arena of parties keyed by public key
#[derive(Default)]
pub struct PartyArena {
    parties: Mutex<HashMap<PublicKey, Arc<Party>>>,
}

impl PartyArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// The party for `public_key`, created on first request.
    pub fn produce(&self, public_key: PublicKey) -> Arc<Party> {
        self.parties
            .lock()
            .entry(public_key)
            .or_insert_with(|| Arc::new(Party { public_key }))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.parties.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.lock().is_empty()
    }
}
