//! Read path: tuple filter builder

use std::sync::Arc;

use super::matcher::Criteria;
use super::subscription::{Fold, LiveView, TupleSubscription, Values};
use super::TupleSpace;
use crate::identity::PublicKey;
use crate::tuple::{Tuple, Value};

/// Accumulates predicates for a live query. All predicates are ANDed; an
/// empty filter matches every tuple the runtime may see.
#[derive(Clone)]
pub struct TupleFilter {
    space: TupleSpace,
    criteria: Criteria,
}

impl TupleFilter {
    pub(crate) fn new(space: TupleSpace) -> Self {
        Self {
            space,
            criteria: Criteria::default(),
        }
    }

    pub fn tuple_type(mut self, tuple_type: impl Into<String>) -> Self {
        self.criteria.tuple_type = Some(tuple_type.into());
        self
    }

    pub fn audience(mut self, audience: PublicKey) -> Self {
        self.criteria.audience = Some(audience);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.criteria.author = Some(author);
        self
    }

    /// Only tuples authored by this runtime's own identity.
    pub fn local_tuples(mut self) -> Self {
        self.criteria.local_only = true;
        self
    }

    /// Tuples one of `a`, `b` addressed to the other, in either direction.
    pub fn between(mut self, a: PublicKey, b: PublicKey) -> Self {
        self.criteria.between = Some((a, b));
        self
    }

    /// Field `name` must equal `value`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria.fields.insert(name.into(), value.into());
        self
    }

    /// Start a new, independent live query, replayed from the beginning.
    pub fn tuples(&self) -> TupleSubscription {
        TupleSubscription::new(
            self.space.store().clone(),
            self.space.viewer(),
            self.criteria.clone(),
        )
    }

    /// Matching tuples mapped through `map`.
    pub fn values<T>(
        &self,
        map: impl Fn(&Tuple) -> Option<T> + Send + Sync + 'static,
    ) -> Values<T> {
        Values::new(self.tuples(), map)
    }

    /// Matching tuples folded into snapshots.
    pub fn fold<F: Fold + 'static>(&self, fold: F) -> LiveView<F::Snapshot> {
        LiveView::new(self.tuples(), fold)
    }

    /// Matching tuples available right now.
    pub fn collect(&self) -> Vec<Arc<Tuple>> {
        self.tuples().drain()
    }
}

impl std::fmt::Debug for TupleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleFilter")
            .field("criteria", &self.criteria)
            .finish()
    }
}
