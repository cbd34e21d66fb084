use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::{Blob, DocKey, DocStore};

type Slots = OrdMap<DocKey, Blob>;

/// In-memory document store with copy-on-write snapshots.
///
/// Readers load the current map without blocking; writers serialize on a
/// single mutex, build a new map, and swap it in. A reader that started
/// before a swap keeps iterating its own snapshot.
pub struct MemoryStore {
    slots: ArcSwap<Slots>,
    write_lock: Mutex<()>,
    next_key: AtomicU64,
    data_size: AtomicU64,
    removed: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            slots: ArcSwap::new(Arc::new(OrdMap::new())),
            write_lock: Mutex::new(()),
            next_key: AtomicU64::new(0),
            data_size: AtomicU64::new(0),
            removed: AtomicUsize::new(0),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire_write_lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }
}

impl DocStore for MemoryStore {
    fn insert(&self, blob: Vec<u8>) -> Result<DocKey, StoreError> {
        let _guard = self.acquire_write_lock()?;
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let size = blob.len() as u64;

        let mut slots = (**self.slots.load()).clone();
        slots.insert(key, Blob::from(blob));
        self.slots.store(Arc::new(slots));

        self.data_size.fetch_add(size, Ordering::Relaxed);
        Ok(key)
    }

    fn fetch(&self, key: DocKey) -> Result<Option<Blob>, StoreError> {
        Ok(self.slots.load().get(&key).cloned())
    }

    fn replace(&self, key: DocKey, blob: Vec<u8>) -> Result<(), StoreError> {
        let _guard = self.acquire_write_lock()?;
        let mut slots = (**self.slots.load()).clone();

        let old = slots
            .insert(key, Blob::from(blob))
            .ok_or(StoreError::KeyNotFound(key))?;
        let new_size = slots.get(&key).map(|b| b.len() as u64).unwrap_or(0);
        self.slots.store(Arc::new(slots));

        self.data_size.fetch_add(new_size, Ordering::Relaxed);
        self.data_size.fetch_sub(old.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: DocKey) -> Result<Option<Blob>, StoreError> {
        let _guard = self.acquire_write_lock()?;
        let mut slots = (**self.slots.load()).clone();

        let old = slots.remove(&key);
        if let Some(blob) = &old {
            self.slots.store(Arc::new(slots));
            self.data_size.fetch_sub(blob.len() as u64, Ordering::Relaxed);
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(old)
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (DocKey, Blob)> + Send> {
        let snapshot = self.slots.load_full();
        Box::new((*snapshot).clone().into_iter())
    }

    fn len(&self) -> usize {
        self.slots.load().len()
    }

    fn data_size(&self) -> u64 {
        self.data_size.load(Ordering::Relaxed)
    }

    fn removed_count(&self) -> usize {
        self.removed.load(Ordering::Relaxed)
    }
}
