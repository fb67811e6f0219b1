//! The tuple space: publish and filter over one runtime's store
//!
//! ```text
//! TuplePublisher ──publish──▶ TupleSpace ──append──▶ TupleStore
//!                                  │                     │
//!                                  └──broadcast──▶ Transport (unless local)
//!
//! TupleFilter ──tuples()──▶ TupleSubscription ◀──head── TupleStore
//!                               (Viewer + Criteria)
//! ```
//!
//! Publishing is serialized per runtime: the author sequence lock is held
//! from signing until the transport has been handed the tuple, so every
//! peer receives one author's tuples in publish order.
//!
//! Author sequences are counted per audience. Anyone able to see one tuple
//! of an audience sees all of them, so the counter a viewer observes has no
//! gaps left by tuples addressed elsewhere.

mod filter;
mod matcher;
mod publisher;
mod subscription;

pub use filter::TupleFilter;
pub use matcher::Viewer;
pub use publisher::TuplePublisher;
pub use subscription::{Fold, LiveView, TupleSubscription, Values};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::SneerResult;
use crate::identity::{Keyring, PrivateKey, PublicKey};
use crate::network::Transport;
use crate::store::TupleStore;
use crate::tuple::{Tuple, TupleDraft, Value};

struct SpaceInner {
    identity: PrivateKey,
    keyring: Keyring,
    store: Arc<TupleStore>,
    transport: Option<Arc<dyn Transport>>,
    author_seq: Mutex<HashMap<Option<PublicKey>, u64>>,
}

/// Handle to one runtime's tuple space. Cheap to clone.
#[derive(Clone)]
pub struct TupleSpace {
    inner: Arc<SpaceInner>,
}

impl TupleSpace {
    pub(crate) fn new(
        identity: PrivateKey,
        keyring: Keyring,
        store: Arc<TupleStore>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let public_key = identity.public_key();
        let mut author_seq: HashMap<Option<PublicKey>, u64> = HashMap::new();
        for tuple in store.snapshot().iter().filter(|t| *t.author() == public_key) {
            let next = author_seq.entry(tuple.audience().copied()).or_default();
            *next = (*next).max(tuple.author_seq() + 1);
        }
        debug!(
            identity = %public_key.short(),
            audiences = author_seq.len(),
            "Recovered author sequences"
        );

        Self {
            inner: Arc::new(SpaceInner {
                identity,
                keyring,
                store,
                transport,
                author_seq: Mutex::new(author_seq),
            }),
        }
    }

    pub fn publisher(&self) -> TuplePublisher {
        TuplePublisher::new(self.clone())
    }

    pub fn filter(&self) -> TupleFilter {
        TupleFilter::new(self.clone())
    }

    /// Public key every tuple published here is authored by
    pub fn identity(&self) -> PublicKey {
        self.inner.identity.public_key()
    }

    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.identity(), self.inner.keyring.clone())
    }

    pub(crate) fn store(&self) -> &Arc<TupleStore> {
        &self.inner.store
    }

    pub(crate) fn publish(
        &self,
        tuple_type: String,
        audience: Option<PublicKey>,
        fields: BTreeMap<String, Value>,
        payload: Option<Value>,
        broadcast: bool,
    ) -> SneerResult<Arc<Tuple>> {
        let mut sequences = self.inner.author_seq.lock();
        let author_seq = sequences.entry(audience).or_default();

        let tuple = Tuple::sign(
            &self.inner.identity,
            TupleDraft {
                audience,
                tuple_type,
                fields,
                payload,
                author_seq: *author_seq,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        )?;
        let appended = self.inner.store.append(tuple)?;
        *author_seq += 1;

        if let Some(transport) = self.inner.transport.as_ref().filter(|_| broadcast) {
            transport.broadcast(&appended.tuple);
        }
        Ok(appended.tuple)
    }
}

impl std::fmt::Debug for TupleSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleSpace")
            .field("identity", &self.identity())
            .field("store", &self.inner.store)
            .finish()
    }
}
