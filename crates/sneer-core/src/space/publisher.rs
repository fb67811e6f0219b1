//! Write path: fluent tuple publisher

use std::collections::BTreeMap;
use std::sync::Arc;

use super::TupleSpace;
use crate::error::{SneerError, SneerResult};
use crate::identity::PublicKey;
use crate::tuple::{Tuple, Value};

/// Immutable tuple builder.
///
/// Every option returns a new builder, so a partially configured publisher
/// can be cloned and reused:
///
/// ```ignore
/// let tweets = space.publisher().tuple_type("tweet");
/// tweets.publish("hello")?;
/// tweets.clone().field("lang", "pt").publish("olá")?;
/// ```
#[derive(Clone)]
pub struct TuplePublisher {
    space: TupleSpace,
    tuple_type: Option<String>,
    audience: Option<PublicKey>,
    fields: BTreeMap<String, Value>,
    local: bool,
}

impl TuplePublisher {
    pub(crate) fn new(space: TupleSpace) -> Self {
        Self {
            space,
            tuple_type: None,
            audience: None,
            fields: BTreeMap::new(),
            local: false,
        }
    }

    pub fn tuple_type(mut self, tuple_type: impl Into<String>) -> Self {
        self.tuple_type = Some(tuple_type.into());
        self
    }

    /// Restrict visibility to holders of `audience`'s private key.
    pub fn audience(mut self, audience: PublicKey) -> Self {
        self.audience = Some(audience);
        self
    }

    /// Set a field. A later call with the same name wins.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Keep the tuple in the local store only; it is never handed to the
    /// transport.
    pub(crate) fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Sign, durably append and broadcast a tuple carrying `payload`.
    ///
    /// Returns only after the local store has accepted the tuple.
    pub fn publish(&self, payload: impl Into<Value>) -> SneerResult<Arc<Tuple>> {
        self.commit(Some(payload.into()))
    }

    /// Publish a marker tuple with no payload.
    pub fn publish_empty(&self) -> SneerResult<Arc<Tuple>> {
        self.commit(None)
    }

    fn commit(&self, payload: Option<Value>) -> SneerResult<Arc<Tuple>> {
        let tuple_type = self.tuple_type.clone().ok_or_else(|| {
            SneerError::InvalidOperation("Cannot publish a tuple without a type".to_string())
        })?;
        self.space.publish(
            tuple_type,
            self.audience,
            self.fields.clone(),
            payload,
            !self.local,
        )
    }
}

impl std::fmt::Debug for TuplePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuplePublisher")
            .field("tuple_type", &self.tuple_type)
            .field("audience", &self.audience)
            .field("fields", &self.fields)
            .field("local", &self.local)
            .finish()
    }
}
