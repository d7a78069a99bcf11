//! Key-value persistence for cached upstream responses.
//!
//! The stale-data layer only needs two operations, so the store contract is
//! deliberately small: byte keys to byte values, read-your-writes, a missing
//! key reads as `Ok(None)`, and a single write is atomically visible.
//! Closing follows Rust ownership: the environment shuts down when its last
//! owner drops it, which keeps the "caller closes the store after all users"
//! rule from ever being violated at compile time.

mod lmdb;
mod memory;

pub use lmdb::LmdbStore;
pub use memory::MemoryStore;

use crate::error::Error;

/// Minimal key-value store contract.
///
/// Reads and writes may block briefly for disk I/O; implementations must
/// serialize overlapping writes to the same key.
pub trait KVStore: Send + Sync {
    /// Returns the data stored under `key`, or `None` when absent.
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Stores `data` under `key`, overwriting any previous value.
    fn write(&self, key: &[u8], data: &[u8]) -> Result<(), Error>;
}
