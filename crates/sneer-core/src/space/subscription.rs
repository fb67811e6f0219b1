//! Live query results
//!
//! A [`TupleSubscription`] first replays every visible matching tuple already
//! in the store, in sequence order, then follows new appends as they happen.
//! Each subscription owns its cursor; dropping it affects nobody else.
//!
//! [`Values`] and [`LiveView`] are derived streams layered on a subscription.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;

use super::matcher::{Criteria, Viewer};
use crate::store::{StoreHead, TupleStore};
use crate::tuple::Tuple;

/// Continuous, replayed query over a tuple store.
pub struct TupleSubscription {
    store: Arc<TupleStore>,
    viewer: Viewer,
    criteria: Criteria,
    cursor: u64,
    head: watch::Receiver<StoreHead>,
}

impl TupleSubscription {
    pub(crate) fn new(store: Arc<TupleStore>, viewer: Viewer, criteria: Criteria) -> Self {
        let head = store.watch();
        Self {
            store,
            viewer,
            criteria,
            cursor: 0,
            head,
        }
    }

    /// Next matching tuple already in the store, without waiting.
    pub fn try_next(&mut self) -> Option<Arc<Tuple>> {
        // Mark the head as seen before scanning so an append racing the scan
        // still wakes the next `changed()`.
        self.head.borrow_and_update();
        let viewer = &self.viewer;
        let criteria = &self.criteria;
        self.store
            .next_matching(&mut self.cursor, |tuple| criteria.matches(viewer, tuple))
    }

    /// Every matching tuple available right now.
    pub fn drain(&mut self) -> Vec<Arc<Tuple>> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next matching tuple.
    ///
    /// Returns `None` only once the store has been closed and everything
    /// appended before the close has been delivered.
    pub async fn next(&mut self) -> Option<Arc<Tuple>> {
        loop {
            if let Some(tuple) = self.try_next() {
                return Some(tuple);
            }
            if self.head.borrow().closed {
                return None;
            }
            if self.head.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<Tuple>> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription.next().await.map(|tuple| (tuple, subscription))
        })
    }
}

impl std::fmt::Debug for TupleSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleSubscription")
            .field("viewer", self.viewer.identity())
            .field("criteria", &self.criteria)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Every matching tuple mapped to a value, replayed in arrival order.
///
/// Tuples the mapping rejects are skipped.
pub struct Values<T> {
    subscription: TupleSubscription,
    map: Box<dyn Fn(&Tuple) -> Option<T> + Send + Sync>,
}

impl<T> Values<T> {
    pub(crate) fn new(
        subscription: TupleSubscription,
        map: impl Fn(&Tuple) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            subscription,
            map: Box::new(map),
        }
    }

    pub fn try_next(&mut self) -> Option<T> {
        while let Some(tuple) = self.subscription.try_next() {
            if let Some(value) = (self.map)(&tuple) {
                return Some(value);
            }
        }
        None
    }

    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub async fn next(&mut self) -> Option<T> {
        loop {
            let tuple = self.subscription.next().await?;
            if let Some(value) = (self.map)(&tuple) {
                return Some(value);
            }
        }
    }

    /// Latest value available right now, consuming everything before it.
    pub fn current(&mut self) -> Option<T> {
        self.drain().pop()
    }
}

impl<T: Send + 'static> Values<T> {
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        futures::stream::unfold(self, |mut values| async move {
            values.next().await.map(|value| (value, values))
        })
    }
}

/// Incremental state folded from a tuple stream.
pub trait Fold: Send {
    type Snapshot;

    /// Absorb one tuple. Returns `true` when the snapshot changed.
    fn absorb(&mut self, tuple: &Arc<Tuple>) -> bool;

    fn snapshot(&self) -> Self::Snapshot;
}

/// Snapshot stream: the state as of subscription first, then one snapshot per
/// change, in store order.
pub struct LiveView<S> {
    subscription: TupleSubscription,
    fold: Box<dyn Fold<Snapshot = S>>,
    initial: bool,
}

impl<S> LiveView<S> {
    pub(crate) fn new(
        mut subscription: TupleSubscription,
        mut fold: impl Fold<Snapshot = S> + 'static,
    ) -> Self {
        for tuple in subscription.drain() {
            fold.absorb(&tuple);
        }
        Self {
            subscription,
            fold: Box::new(fold),
            initial: true,
        }
    }

    /// Next snapshot available without waiting.
    pub fn try_next(&mut self) -> Option<S> {
        if std::mem::take(&mut self.initial) {
            return Some(self.fold.snapshot());
        }
        while let Some(tuple) = self.subscription.try_next() {
            if self.fold.absorb(&tuple) {
                return Some(self.fold.snapshot());
            }
        }
        None
    }

    /// Every snapshot available right now, in order.
    pub fn drain(&mut self) -> Vec<S> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub async fn next(&mut self) -> Option<S> {
        if std::mem::take(&mut self.initial) {
            return Some(self.fold.snapshot());
        }
        loop {
            let tuple = self.subscription.next().await?;
            if self.fold.absorb(&tuple) {
                return Some(self.fold.snapshot());
            }
        }
    }

    /// Absorb everything available and return the resulting state, without
    /// emitting the intermediate snapshots.
    pub fn current(&mut self) -> S {
        for tuple in self.subscription.drain() {
            self.fold.absorb(&tuple);
        }
        self.initial = false;
        self.fold.snapshot()
    }
}

impl<S: Send + 'static> LiveView<S> {
    pub fn into_stream(self) -> impl Stream<Item = S> + Send {
        futures::stream::unfold(self, |mut view| async move {
            view.next().await.map(|snapshot| (snapshot, view))
        })
    }
}
