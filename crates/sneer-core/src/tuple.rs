//! Immutable, signed, addressed records
//!
//! A [`Tuple`] is the only kind of fact the system exchanges. Once signed it
//! is never mutated; its [`TupleId`] is the BLAKE3 hash of its canonical
//! postcard encoding, so two tuples are equal exactly when their content is.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SneerError, SneerResult};
use crate::identity::{PrivateKey, PublicKey, Signature};

/// Well-known tuple types
pub mod types {
    /// Self-addressed contact binding: fields `party`, `nickname`
    pub const CONTACT: &str = "sneer/contact";
    /// Self-addressed group key: payload is the group's private key seed
    pub const GROUP_KEY: &str = "sneer/group-key";
    /// Prefix of self-published profile attributes
    pub const PROFILE_PREFIX: &str = "profile/";
    /// Preferred nickname profile attribute
    pub const PREFERRED_NICKNAME: &str = "profile/preferred-nickname";
    /// Conversation message addressed to the other party
    pub const CHAT_MESSAGE: &str = "chat/message";

    /// Tuple type for a named profile attribute
    pub fn profile(attribute: &str) -> String {
        format!("{}{}", PROFILE_PREFIX, attribute)
    }
}

/// Scalar value carried in tuple fields and payloads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Key(PublicKey),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&PublicKey> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<PublicKey> for Value {
    fn from(k: PublicKey) -> Self {
        Value::Key(k)
    }
}

/// Content address of a tuple
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleId([u8; 32]);

impl TupleId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TupleId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Everything a tuple carries except its signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleDraft {
    pub audience: Option<PublicKey>,
    pub tuple_type: String,
    pub fields: BTreeMap<String, Value>,
    pub payload: Option<Value>,
    pub author_seq: u64,
    pub timestamp: i64,
}

/// Borrowed view of the signed content, in canonical field order
#[derive(Serialize)]
struct SignedContent<'a> {
    author: &'a PublicKey,
    author_seq: u64,
    audience: &'a Option<PublicKey>,
    tuple_type: &'a str,
    fields: &'a BTreeMap<String, Value>,
    payload: &'a Option<Value>,
    timestamp: i64,
}

fn canonical(content: &SignedContent<'_>) -> SneerResult<Vec<u8>> {
    postcard::to_allocvec(content).map_err(|e| SneerError::Serialization(e.to_string()))
}

/// Immutable, signed, addressed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    author: PublicKey,
    author_seq: u64,
    audience: Option<PublicKey>,
    tuple_type: String,
    fields: BTreeMap<String, Value>,
    payload: Option<Value>,
    timestamp: i64,
    signature: Signature,
}

impl Tuple {
    /// Sign a draft with the author's key.
    pub fn sign(key: &PrivateKey, draft: TupleDraft) -> SneerResult<Self> {
        let author = key.public_key();
        let signature = key.sign(&canonical(&SignedContent {
            author: &author,
            author_seq: draft.author_seq,
            audience: &draft.audience,
            tuple_type: &draft.tuple_type,
            fields: &draft.fields,
            payload: &draft.payload,
            timestamp: draft.timestamp,
        })?);

        Ok(Self {
            author,
            author_seq: draft.author_seq,
            audience: draft.audience,
            tuple_type: draft.tuple_type,
            fields: draft.fields,
            payload: draft.payload,
            timestamp: draft.timestamp,
            signature,
        })
    }

    fn signed_bytes(&self) -> SneerResult<Vec<u8>> {
        canonical(&SignedContent {
            author: &self.author,
            author_seq: self.author_seq,
            audience: &self.audience,
            tuple_type: &self.tuple_type,
            fields: &self.fields,
            payload: &self.payload,
            timestamp: self.timestamp,
        })
    }

    /// Check the author's signature over the content.
    pub fn verify(&self) -> SneerResult<()> {
        let bytes = self.signed_bytes()?;
        self.author.verify(&bytes, &self.signature)
    }

    /// Content address: BLAKE3 over the full canonical encoding.
    pub fn id(&self) -> SneerResult<TupleId> {
        let bytes = self.to_bytes()?;
        Ok(TupleId(*blake3::hash(&bytes).as_bytes()))
    }

    pub fn to_bytes(&self) -> SneerResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| SneerError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> SneerResult<Self> {
        postcard::from_bytes(bytes).map_err(|e| SneerError::Serialization(e.to_string()))
    }

    pub fn author(&self) -> &PublicKey {
        &self.author
    }

    /// The author's own publish counter
    pub fn author_seq(&self) -> u64 {
        self.author_seq
    }

    /// Key required to see this tuple; `None` means open
    pub fn audience(&self) -> Option<&PublicKey> {
        self.audience.as_ref()
    }

    pub fn tuple_type(&self) -> &str {
        &self.tuple_type
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Milliseconds since the Unix epoch, as stamped by the author
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
