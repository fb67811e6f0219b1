//! Admin: owns one identity and the lifecycle of its runtime
//!
//! The admin is constructed once by the embedding process and passed by
//! reference to whoever needs the runtime. `restart` closes the store and
//! rebuilds the runtime from the tuple log alone.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::{SneerConfig, StorageConfig};
use crate::error::SneerResult;
use crate::identity::PrivateKey;
use crate::network::Transport;
use crate::runtime::Runtime;
use crate::store::{MemoryLog, RedbLog, TupleLog, TupleStore};

enum Backend {
    Durable(PathBuf),
    Memory(MemoryLog),
}

impl Backend {
    fn open_log(&self, key: &PrivateKey) -> SneerResult<Box<dyn TupleLog>> {
        let log: Box<dyn TupleLog> = match self {
            Backend::Durable(data_dir) => Box::new(RedbLog::open(data_dir, &key.public_key())?),
            Backend::Memory(log) => Box::new(log.clone()),
        };
        Ok(log)
    }
}

/// Owner of one identity's runtime
pub struct SneerAdmin {
    key: PrivateKey,
    config: SneerConfig,
    transport: Option<Arc<dyn Transport>>,
    backend: Backend,
    runtime: Runtime,
}

impl SneerAdmin {
    /// Open storage for `key` and start its runtime.
    ///
    /// With a transport, the runtime attaches immediately and receives
    /// everything the transport retained that it may see.
    pub fn initialize(
        key: PrivateKey,
        config: SneerConfig,
        transport: Option<Arc<dyn Transport>>,
    ) -> SneerResult<Self> {
        let backend = match &config.storage {
            StorageConfig::Durable { data_dir } => Backend::Durable(data_dir.clone()),
            StorageConfig::InMemory => Backend::Memory(MemoryLog::new()),
        };
        let runtime = Self::boot(&key, &backend, transport.clone())?;
        info!(identity = %key.public_key().short(), storage = ?config.storage, "Initialized admin");

        Ok(Self {
            key,
            config,
            transport,
            backend,
            runtime,
        })
    }

    fn boot(
        key: &PrivateKey,
        backend: &Backend,
        transport: Option<Arc<dyn Transport>>,
    ) -> SneerResult<Runtime> {
        let log = backend.open_log(key)?;
        let store = TupleStore::open(key.public_key(), log)?;
        Runtime::start(key.clone(), store, transport)
    }

    pub fn sneer(&self) -> &Runtime {
        &self.runtime
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn config(&self) -> &SneerConfig {
        &self.config
    }

    /// Close storage and rebuild the runtime from the tuple log.
    ///
    /// Handles to the previous runtime stay valid but see a closed store.
    /// On error the admin keeps the stopped runtime and `restart` may be
    /// called again.
    pub fn restart(&mut self) -> SneerResult<()> {
        info!(identity = %self.key.public_key().short(), "Restarting runtime");
        self.runtime.stop()?;
        self.runtime = Self::boot(&self.key, &self.backend, self.transport.clone())?;
        Ok(())
    }

    /// Detach from the transport and close storage.
    pub fn shutdown(self) -> SneerResult<()> {
        info!(identity = %self.key.public_key().short(), "Shutting down admin");
        self.runtime.stop()
    }
}

impl std::fmt::Debug for SneerAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SneerAdmin")
            .field("identity", &self.key.public_key())
            .field("config", &self.config)
            .finish()
    }
}
