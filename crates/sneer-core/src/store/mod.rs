//! Append-only, content-addressed tuple store.
//!
//! The store is the single source of truth of a runtime. Every tuple it
//! accepts gets the next sequence number, is written through its
//! [`TupleLog`] and only then becomes visible to readers.
//!
//! ```text
//! append ──▶ verify signature ──▶ dedup by TupleId ──▶ TupleLog::append
//!                                                          │
//!                         subscriptions ◀── head watch ◀───┘
//! ```
//!
//! Readers never see a partially appended tuple: the in-memory log only
//! grows under the write lock, after the durable write succeeded.

mod log;
mod redb_log;

pub use log::{MemoryLog, TupleLog};
pub use redb_log::RedbLog;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{SneerError, SneerResult};
use crate::identity::PublicKey;
use crate::tuple::{Tuple, TupleId};

/// Length and open state of a store, broadcast to subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHead {
    pub len: u64,
    pub closed: bool,
}

/// Result of an append
#[derive(Debug, Clone)]
pub struct Appended {
    pub id: TupleId,
    pub seq: u64,
    pub tuple: Arc<Tuple>,
    /// `false` when the tuple was already stored
    pub inserted: bool,
}

struct StoreState {
    entries: Vec<Arc<Tuple>>,
    index: HashMap<TupleId, u64>,
    closed: bool,
}

/// Append-only tuple collection owned by one identity
pub struct TupleStore {
    owner: PublicKey,
    log: Box<dyn TupleLog>,
    state: RwLock<StoreState>,
    head: watch::Sender<StoreHead>,
}

impl TupleStore {
    /// Open a store over `log`, reloading every tuple it holds.
    pub fn open(owner: PublicKey, log: Box<dyn TupleLog>) -> SneerResult<Arc<Self>> {
        let tuples = log.load()?;

        let mut entries = Vec::with_capacity(tuples.len());
        let mut index = HashMap::with_capacity(tuples.len());
        for (seq, tuple) in tuples.into_iter().enumerate() {
            index.insert(tuple.id()?, seq as u64);
            entries.push(Arc::new(tuple));
        }

        let len = entries.len() as u64;
        let (head, _) = watch::channel(StoreHead { len, closed: false });
        info!(owner = %owner.short(), tuples = len, "Opened tuple store");

        Ok(Arc::new(Self {
            owner,
            log,
            state: RwLock::new(StoreState {
                entries,
                index,
                closed: false,
            }),
            head,
        }))
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Append a tuple.
    ///
    /// The author's signature is checked first. A tuple already present is
    /// not stored twice; its existing sequence number is returned instead.
    pub fn append(&self, tuple: Tuple) -> SneerResult<Appended> {
        tuple.verify()?;
        let id = tuple.id()?;

        let appended = {
            let mut state = self.state.write();
            if state.closed {
                return Err(SneerError::Storage("Tuple store is closed".to_string()));
            }

            if let Some(&seq) = state.index.get(&id) {
                return Ok(Appended {
                    id,
                    seq,
                    tuple: state.entries[seq as usize].clone(),
                    inserted: false,
                });
            }

            let seq = state.entries.len() as u64;
            self.log.append(seq, &tuple)?;

            let tuple = Arc::new(tuple);
            state.entries.push(tuple.clone());
            state.index.insert(id, seq);
            // Published under the lock so a concurrent close is never overwritten
            self.head.send_replace(StoreHead {
                len: seq + 1,
                closed: state.closed,
            });
            Appended {
                id,
                seq,
                tuple,
                inserted: true,
            }
        };

        debug!(
            seq = appended.seq,
            tuple_type = appended.tuple.tuple_type(),
            author = %appended.tuple.author().short(),
            "Appended tuple"
        );
        Ok(appended)
    }

    /// Tuple at `seq`, if any
    pub fn get(&self, seq: u64) -> Option<Arc<Tuple>> {
        self.state.read().entries.get(seq as usize).cloned()
    }

    pub fn contains(&self, id: &TupleId) -> bool {
        self.state.read().index.contains_key(id)
    }

    pub fn len(&self) -> u64 {
        self.state.read().entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored tuple in sequence order
    pub fn snapshot(&self) -> Vec<Arc<Tuple>> {
        self.state.read().entries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Close the store and its log. Open subscriptions drain and end.
    pub fn close(&self) -> SneerResult<()> {
        {
            let mut state = self.state.write();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            self.head.send_replace(StoreHead {
                len: state.entries.len() as u64,
                closed: true,
            });
        }

        let result = self.log.close();
        if let Err(e) = &result {
            warn!(error = %e, "Failed to close tuple log");
        }
        info!(owner = %self.owner.short(), "Closed tuple store");
        result
    }

    pub(crate) fn watch(&self) -> watch::Receiver<StoreHead> {
        self.head.subscribe()
    }

    /// Advance `cursor` past the next tuple accepted by `accept` and return it.
    pub(crate) fn next_matching(
        &self,
        cursor: &mut u64,
        accept: impl Fn(&Tuple) -> bool,
    ) -> Option<Arc<Tuple>> {
        let state = self.state.read();
        while let Some(tuple) = state.entries.get(*cursor as usize) {
            *cursor += 1;
            if accept(tuple.as_ref()) {
                return Some(tuple.clone());
            }
        }
        None
    }
}

impl std::fmt::Debug for TupleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleStore")
            .field("owner", &self.owner)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
