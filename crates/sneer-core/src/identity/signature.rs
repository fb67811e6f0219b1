//! Detached Ed25519 signature

use ed25519_dalek::Signature as DalekSignature;
use serde::{Deserialize, Serialize};

use crate::error::{SneerError, SneerResult};

/// Detached signature over a tuple's canonical bytes.
///
/// Stored as a byte vector so it serializes without array size limits;
/// the length is checked when the signature is verified.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub(crate) fn from_dalek(sig: &DalekSignature) -> Self {
        Self(sig.to_bytes().to_vec())
    }

    pub(crate) fn to_dalek(&self) -> SneerResult<DalekSignature> {
        let bytes: [u8; 64] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| SneerError::Crypto(format!("Signature must be 64 bytes (got {})", self.0.len())))?;
        Ok(DalekSignature::from_bytes(&bytes))
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..self.0.len().min(8)]))
    }
}
