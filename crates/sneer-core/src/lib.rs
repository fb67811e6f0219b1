//! Sneer Core Library
//!
//! Identity-addressed tuple space for peer-to-peer social messaging.
//!
//! ## Overview
//!
//! Every fact parties exchange (chat messages, profile updates, contact
//! bindings, group keys) is an immutable, signed, typed [`Tuple`] published
//! into a [`TupleSpace`] and read back through continuous, replayed queries.
//! Contacts, profiles and conversations are views folded from those queries.
//!
//! ## Core Principles
//!
//! - **Capability visibility**: holding an audience's private key is what
//!   lets a peer see tuples addressed to it; there are no membership lists
//! - **Log is the truth**: derived views are rebuilt by replaying the store
//! - **Push, not poll**: subscriptions wake on append
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use sneer_core::{NetworkSimulator, PrivateKey, SneerAdmin, SneerConfig, Transport};
//!
//! # fn main() -> sneer_core::SneerResult<()> {
//! let network: Arc<dyn Transport> = NetworkSimulator::new();
//! let alice = SneerAdmin::initialize(PrivateKey::generate(), SneerConfig::in_memory(), Some(network.clone()))?;
//! let bob = SneerAdmin::initialize(PrivateKey::generate(), SneerConfig::in_memory(), Some(network))?;
//!
//! let sneer = alice.sneer();
//! let bob_party = sneer.produce_party(bob.private_key().public_key());
//! sneer.add_contact("bob", &bob_party)?;
//!
//! if let Some(conversation) = sneer.conversation_with(&bob_party) {
//!     conversation.send_message("ping")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod identity;
pub mod network;
pub mod runtime;
pub mod social;
pub mod space;
pub mod store;
pub mod tuple;

// Re-exports
pub use admin::SneerAdmin;
pub use config::{SneerConfig, StorageConfig};
pub use error::{SneerError, SneerResult};
pub use identity::{Keyring, PrivateKey, PublicKey, Signature};
pub use network::{Endpoint, NetworkSimulator, Transport};
pub use runtime::{Runtime, SESSION_FIELD};
pub use social::{Contact, Conversation, Message, Party, Profile};
pub use space::{Fold, LiveView, TupleFilter, TuplePublisher, TupleSpace, TupleSubscription, Values, Viewer};
pub use store::{MemoryLog, RedbLog, TupleLog, TupleStore};
pub use tuple::{types, Tuple, TupleId, Value};
