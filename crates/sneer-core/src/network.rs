//! Transport seam and the in-process network simulator
//!
//! How bytes reach peers is outside the core. A [`Transport`] only has to
//! honor the tuple-space rules: a peer is handed a tuple only if its
//! [`Viewer`] may see it, so nothing addressed to a key a peer lacks ever
//! leaves the sender's side.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::identity::PublicKey;
use crate::space::Viewer;
use crate::store::TupleStore;
use crate::tuple::{Tuple, TupleId};

/// A runtime attached to a transport: who it is and where tuples go.
#[derive(Clone)]
pub struct Endpoint {
    pub viewer: Viewer,
    pub store: Weak<TupleStore>,
}

impl Endpoint {
    pub fn new(viewer: Viewer, store: &Arc<TupleStore>) -> Self {
        Self {
            viewer,
            store: Arc::downgrade(store),
        }
    }

    pub fn identity(&self) -> &PublicKey {
        self.viewer.identity()
    }

    /// Append `tuple` to the endpoint's store if its viewer may see it.
    /// Returns `true` when the store gained a tuple.
    fn deliver(&self, tuple: &Tuple) -> bool {
        if !self.viewer.can_see(tuple) {
            return false;
        }
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        match store.append(tuple.clone()) {
            Ok(appended) => appended.inserted,
            Err(e) => {
                warn!(
                    peer = %self.identity().short(),
                    tuple_type = tuple.tuple_type(),
                    error = %e,
                    "Failed to deliver tuple"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("identity", self.identity())
            .finish()
    }
}

/// Moves tuples between runtimes.
///
/// Delivery failures are the transport's concern; they never fail the
/// publisher.
pub trait Transport: Send + Sync {
    /// Start delivering to `endpoint`, including what it missed.
    fn attach(&self, endpoint: Endpoint);

    /// Stop delivering to the endpoint with this identity.
    fn detach(&self, identity: &PublicKey);

    /// Hand a freshly published tuple to every peer allowed to see it.
    fn broadcast(&self, tuple: &Arc<Tuple>);

    /// Re-deliver anything the endpoint can now see, e.g. after it joined a
    /// group.
    fn refresh(&self, identity: &PublicKey);
}

#[derive(Default)]
struct SimulatorState {
    retained: Vec<Arc<Tuple>>,
    seen: HashSet<TupleId>,
    endpoints: HashMap<PublicKey, Endpoint>,
}

/// In-process network that connects every attached runtime.
///
/// Retains every tuple ever broadcast so late joiners and restarted runtimes
/// catch up. Delivery is synchronous: when `broadcast` returns, every
/// attached peer that may see the tuple has it in its store.
#[derive(Default)]
pub struct NetworkSimulator {
    state: Mutex<SimulatorState>,
}

impl NetworkSimulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peer_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    pub fn retained_count(&self) -> usize {
        self.state.lock().retained.len()
    }

    fn backfill(endpoint: &Endpoint, retained: &[Arc<Tuple>]) -> usize {
        retained
            .iter()
            .filter(|tuple| endpoint.deliver(tuple))
            .count()
    }
}

impl Transport for NetworkSimulator {
    fn attach(&self, endpoint: Endpoint) {
        let mut state = self.state.lock();
        let delivered = Self::backfill(&endpoint, &state.retained);
        info!(
            peer = %endpoint.identity().short(),
            delivered,
            "Peer attached to simulated network"
        );
        state.endpoints.insert(*endpoint.identity(), endpoint);
    }

    fn detach(&self, identity: &PublicKey) {
        if self.state.lock().endpoints.remove(identity).is_some() {
            info!(peer = %identity.short(), "Peer detached from simulated network");
        }
    }

    fn broadcast(&self, tuple: &Arc<Tuple>) {
        let id = match tuple.id() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Dropping unencodable tuple");
                return;
            }
        };

        let mut state = self.state.lock();
        if !state.seen.insert(id) {
            return;
        }
        state.retained.push(tuple.clone());

        state.endpoints.retain(|_, endpoint| endpoint.store.strong_count() > 0);
        let delivered = state
            .endpoints
            .values()
            .filter(|endpoint| endpoint.deliver(tuple))
            .count();
        debug!(
            tuple_type = tuple.tuple_type(),
            author = %tuple.author().short(),
            delivered,
            "Broadcast tuple"
        );
    }

    fn refresh(&self, identity: &PublicKey) {
        let state = self.state.lock();
        if let Some(endpoint) = state.endpoints.get(identity) {
            let delivered = Self::backfill(endpoint, &state.retained);
            debug!(peer = %identity.short(), delivered, "Refreshed peer");
        }
    }
}

impl std::fmt::Debug for NetworkSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NetworkSimulator")
            .field("peers", &state.endpoints.len())
            .field("retained", &state.retained.len())
            .finish()
    }
}
