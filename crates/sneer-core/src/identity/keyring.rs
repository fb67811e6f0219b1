//! Group keys held by a runtime

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{PrivateKey, PublicKey};

/// Shared set of group private keys.
///
/// Cloning shares the same underlying set, so the runtime, its tuple space
/// and its network endpoint all observe a key the moment it is inserted.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: Arc<RwLock<HashMap<PublicKey, PrivateKey>>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group key. Returns `false` if it was already held.
    pub fn insert(&self, key: PrivateKey) -> bool {
        self.keys.write().insert(key.public_key(), key).is_none()
    }

    /// Whether the private key for `public_key` is held.
    pub fn holds(&self, public_key: &PublicKey) -> bool {
        self.keys.read().contains_key(public_key)
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring").field("groups", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_keys() {
        let ring = Keyring::new();
        let shared = ring.clone();
        let group = PrivateKey::generate();

        assert!(ring.insert(group.clone()));
        assert!(!ring.insert(group.clone()));
        assert!(shared.holds(&group.public_key()));
        assert_eq!(shared.len(), 1);
    }
}
