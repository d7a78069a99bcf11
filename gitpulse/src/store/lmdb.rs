//! LMDB-backed store.
//!
//! One memory-mapped environment per store, with a single named database
//! acting as the bucket. LMDB gives us exactly the write discipline the
//! stale layer assumes: write transactions are serialized, and a committed
//! write is atomically visible to subsequent read transactions.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::error::Error;
use crate::store::KVStore;

/// Persistent key-value store backed by an LMDB environment.
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Opens (creating if needed) the environment at `path` with a named
    /// database `bucket`.
    ///
    /// `map_size` bounds the on-disk size of the environment in bytes.
    pub fn open(path: &Path, bucket: &str, map_size: usize) -> Result<Self, Error> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Internal(format!("creating store directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path)
        }
        .map_err(|e| Error::Internal(format!("opening store environment: {e}")))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| Error::Internal(format!("opening store transaction: {e}")))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(bucket))
            .map_err(|e| Error::Internal(format!("creating store bucket: {e}")))?;
        wtxn.commit()
            .map_err(|e| Error::Internal(format!("committing store bucket: {e}")))?;

        Ok(Self { env, db })
    }
}

impl KVStore for LmdbStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| Error::Internal(format!("reading from store: {e}")))?;
        let data = self
            .db
            .get(&rtxn, key)
            .map_err(|e| Error::Internal(format!("reading from store: {e}")))?;

        Ok(data.map(<[u8]>::to_vec))
    }

    fn write(&self, key: &[u8], data: &[u8]) -> Result<(), Error> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| Error::Internal(format!("writing to store: {e}")))?;
        self.db
            .put(&mut wtxn, key, data)
            .map_err(|e| Error::Internal(format!("writing to store: {e}")))?;
        wtxn.commit()
            .map_err(|e| Error::Internal(format!("writing to store: {e}")))
    }
}
