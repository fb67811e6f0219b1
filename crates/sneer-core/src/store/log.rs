//! Durable log seam and the in-memory implementation

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{SneerError, SneerResult};
use crate::tuple::Tuple;

/// Append-only backing log of a [`TupleStore`](super::TupleStore).
///
/// `append` must not return `Ok` until the tuple would survive a restart
/// of the owning store.
pub trait TupleLog: Send + Sync {
    /// Persist `tuple` at sequence `seq`. Sequences arrive dense and in order.
    fn append(&self, seq: u64, tuple: &Tuple) -> SneerResult<()>;

    /// Every persisted tuple, in sequence order.
    fn load(&self) -> SneerResult<Vec<Tuple>>;

    /// Release underlying resources. Further appends fail.
    fn close(&self) -> SneerResult<()> {
        Ok(())
    }
}

/// Log kept in process memory.
///
/// Clones share the same entries, so an admin can hand a clone to each
/// store it boots and a restart sees everything the previous store wrote.
#[derive(Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<Tuple>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TupleLog for MemoryLog {
    fn append(&self, seq: u64, tuple: &Tuple) -> SneerResult<()> {
        let mut entries = self.entries.lock();
        if seq != entries.len() as u64 {
            return Err(SneerError::Storage(format!(
                "Out of order append: expected sequence {}, got {}",
                entries.len(),
                seq
            )));
        }
        entries.push(tuple.clone());
        Ok(())
    }

    fn load(&self) -> SneerResult<Vec<Tuple>> {
        Ok(self.entries.lock().clone())
    }
}
