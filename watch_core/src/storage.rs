//! Reference [`PersistentStore`] implementations.
//!
//! `MemoryStore` keeps entities in a map and is what the tests use.
//! `JsonFileStore` keeps the whole watchlist in one JSON array on disk and
//! rewrites it on every change; the watchlist is small (tens of entries) so a
//! rewrite is cheaper than any indexing scheme.
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use watch_common::Result;

use crate::entity::{EntityId, WatchedEntity};
use crate::source::PersistentStore;

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entities: Mutex<BTreeMap<EntityId, WatchedEntity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = WatchedEntity>) -> Self {
        let map = entities.into_iter().map(|e| (e.id, e)).collect();
        Self {
            entities: Mutex::new(map),
        }
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, id: EntityId) -> Result<Option<WatchedEntity>> {
        Ok(self.entities.lock()?.get(&id).cloned())
    }

    fn put(&self, entity: &WatchedEntity) -> Result<()> {
        self.entities.lock()?.insert(entity.id, entity.clone());
        Ok(())
    }

    fn delete(&self, id: EntityId) -> Result<()> {
        self.entities.lock()?.remove(&id);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<WatchedEntity>> {
        Ok(self.entities.lock()?.values().cloned().collect())
    }
}

/// Store backed by a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    /// Uses `path`; the file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<EntityId, WatchedEntity>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        let entities: Vec<WatchedEntity> = serde_json::from_slice(&bytes)?;
        Ok(entities.into_iter().map(|e| (e.id, e)).collect())
    }

    fn write(&self, entities: &BTreeMap<EntityId, WatchedEntity>) -> Result<()> {
        let list: Vec<&WatchedEntity> = entities.values().collect();
        let json = serde_json::to_vec_pretty(&list)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PersistentStore for JsonFileStore {
    fn get(&self, id: EntityId) -> Result<Option<WatchedEntity>> {
        let _guard = self.guard.lock()?;
        Ok(self.read()?.remove(&id))
    }

    fn put(&self, entity: &WatchedEntity) -> Result<()> {
        let _guard = self.guard.lock()?;
        let mut entities = self.read()?;
        entities.insert(entity.id, entity.clone());
        self.write(&entities)
    }

    fn delete(&self, id: EntityId) -> Result<()> {
        let _guard = self.guard.lock()?;
        let mut entities = self.read()?;
        if entities.remove(&id).is_some() {
            self.write(&entities)?;
        }
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<WatchedEntity>> {
        let _guard = self.guard.lock()?;
        Ok(self.read()?.into_values().collect())
    }
}
