//! Identity module
//!
//! Opaque asymmetric identities for the tuple space. A [`PrivateKey`] signs
//! tuples and derives exactly one [`PublicKey`]; public keys are the
//! addresses used for authors and audiences.
//!
//! ## Example
//!
//! ```rust
//! use sneer_core::identity::PrivateKey;
//!
//! let key = PrivateKey::generate();
//! let public_key = key.public_key();
//!
//! let signature = key.sign(b"hello");
//! assert!(public_key.verify(b"hello", &signature).is_ok());
//! ```
//!
//! ## Groups
//!
//! A group is nothing more than a key pair. Tuples addressed to a group's
//! public key are visible to whoever holds the group's private key; the
//! [`Keyring`] is the set of such keys a runtime holds.

mod keyring;
mod keys;
mod signature;

pub use keyring::Keyring;
pub use keys::{PrivateKey, PublicKey};
pub use signature::Signature;
