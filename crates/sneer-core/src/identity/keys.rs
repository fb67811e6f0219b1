//! Ed25519 private/public keys

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::signature::Signature;
use crate::error::{SneerError, SneerResult};

/// Public half of an identity.
///
/// Byte-comparable and usable as a map key. Displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Parse and validate 32 raw key bytes.
    pub fn from_bytes(bytes: &[u8]) -> SneerResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SneerError::Crypto(format!("Public key must be 32 bytes (got {})", bytes.len())))?;
        VerifyingKey::from_bytes(&arr)
            .map_err(|e| SneerError::Crypto(format!("Invalid public key: {}", e)))?;
        Ok(Self(arr))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> SneerResult<()> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| SneerError::Crypto(format!("Invalid public key: {}", e)))?;
        let sig = signature.to_dalek()?;
        key.verify(message, &sig)
            .map_err(|_| SneerError::Crypto(format!("Signature does not match key {}", self.short())))
    }

    /// First characters of the base58 form, for logs and fallback names.
    pub fn short(&self) -> String {
        self.to_string().chars().take(8).collect()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

impl FromStr for PublicKey {
    type Err = SneerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SneerError::Crypto(format!("Invalid base58 key '{}': {}", s, e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Private half of an identity. Signs tuples.
#[derive(Clone)]
pub struct PrivateKey {
    signing: SigningKey,
}

impl PrivateKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).expect("Failed to get random bytes");
        Self::from_seed(&seed)
    }

    /// Restore a key from its 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Restore a key from a seed slice, validating its length
    pub fn from_bytes(bytes: &[u8]) -> SneerResult<Self> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SneerError::Crypto(format!("Private key must be 32 bytes (got {})", bytes.len())))?;
        Ok(Self::from_seed(&seed))
    }

    /// The 32-byte seed
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// The one public key derived from this private key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_dalek(&self.signing.sign(message))
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(public: {})", self.public_key().short())
    }
}
