//! Persistent tuple log using redb.
//!
//! One database file per identity: `<data_dir>/<owner-base58>.redb`.
//!
//! - `tuples`: sequence number → postcard-encoded [`Tuple`]
//! - `meta`: the owner's public key, checked on every open

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info};

use super::log::TupleLog;
use crate::error::{SneerError, SneerResult};
use crate::identity::PublicKey;
use crate::tuple::Tuple;

const TUPLES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tuples");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const OWNER_KEY: &str = "owner";

/// redb-backed [`TupleLog`]
pub struct RedbLog {
    path: PathBuf,
    db: RwLock<Option<Database>>,
}

impl RedbLog {
    /// Path of the database file for `owner` inside `data_dir`.
    pub fn path_for(data_dir: impl AsRef<Path>, owner: &PublicKey) -> PathBuf {
        data_dir.as_ref().join(format!("{}.redb", owner))
    }

    /// Open (or create) the log for `owner`.
    ///
    /// This will:
    /// - Create the data directory if it doesn't exist
    /// - Create both tables
    /// - Record the owner on first open, and refuse a file owned by someone else
    pub fn open(data_dir: impl AsRef<Path>, owner: &PublicKey) -> SneerResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let path = Self::path_for(data_dir, owner);
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TUPLES_TABLE)?;
            let mut meta = write_txn.open_table(META_TABLE)?;

            let stored = meta.get(OWNER_KEY)?.map(|v| v.value().to_vec());
            match stored {
                Some(bytes) if bytes.as_slice() != owner.as_bytes() => {
                    return Err(SneerError::Storage(format!(
                        "Tuple log at {} belongs to another identity",
                        path.display()
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert(OWNER_KEY, owner.as_bytes().as_slice())?;
                }
            }
        }
        write_txn.commit()?;

        info!(path = %path.display(), "Opened tuple log");
        Ok(Self {
            path,
            db: RwLock::new(Some(db)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn closed_error(&self) -> SneerError {
        SneerError::Storage(format!("Tuple log at {} is closed", self.path.display()))
    }
}

impl TupleLog for RedbLog {
    fn append(&self, seq: u64, tuple: &Tuple) -> SneerResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or_else(|| self.closed_error())?;

        let data = tuple.to_bytes()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(TUPLES_TABLE)?;
            table.insert(seq, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load(&self) -> SneerResult<Vec<Tuple>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or_else(|| self.closed_error())?;

        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(TUPLES_TABLE)?;

        let mut tuples = Vec::new();
        for (expected, entry) in table.iter()?.enumerate() {
            let (seq, value) = entry?;
            if seq.value() != expected as u64 {
                return Err(SneerError::Storage(format!(
                    "Tuple log has a gap at sequence {}",
                    expected
                )));
            }
            tuples.push(Tuple::from_bytes(value.value())?);
        }
        debug!(count = tuples.len(), "Loaded tuple log");
        Ok(tuples)
    }

    fn close(&self) -> SneerResult<()> {
        // Dropping the database releases the file lock so it can be reopened
        if self.db.write().take().is_some() {
            info!(path = %self.path.display(), "Closed tuple log");
        }
        Ok(())
    }
}
