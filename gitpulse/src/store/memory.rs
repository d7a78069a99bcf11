//! In-memory store for tests and throwaway deployments.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::error::Error;
use crate::store::KVStore;

/// Hash-map-backed [`KVStore`] with read/write counters.
///
/// The counters let tests observe how many times the layers above actually
/// touched persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<Vec<u8>, Vec<u8>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KVStore for MemoryStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &[u8], data: &[u8]) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.insert(key.to_vec(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_counters() {
        let store = MemoryStore::new();

        assert_eq!(store.read(b"pr/go").unwrap(), None);
        store.write(b"pr/go", b"data").unwrap();
        assert_eq!(store.read(b"pr/go").unwrap(), Some(b"data".to_vec()));

        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 1);
    }
}
