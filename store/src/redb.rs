//! Redb-based artifact store implementation.
//!
//! All artifacts live in one database file. Create-only semantics for
//! references come from checking and inserting inside a single write
//! transaction; redb serializes write transactions.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};

use crate::keys::{SpeakerName, SynthesisKey};
use crate::{ArtifactRef, ArtifactStore, StoreError, StoreResult, SynthesisSlot};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

const REFERENCES: Table = TableDefinition::new("references");
const FINGERPRINTS: Table = TableDefinition::new("fingerprints");
const SYNTHESIS: Table = TableDefinition::new("synthesis");

fn storage<E: Display>(e: E) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// A persistent artifact store backed by redb.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(storage)?;

        // Create the tables if they don't exist
        let tx = db.begin_write().map_err(storage)?;
        for table in [REFERENCES, FINGERPRINTS, SYNTHESIS] {
            tx.open_table(table).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self { db })
    }

    fn get(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(table).map_err(storage)?;
        Ok(table
            .get(key)
            .map_err(storage)?
            .map(|value| value.value().to_vec()))
    }

    fn set(&self, table: Table, key: &str, value: &[u8]) -> StoreResult<()> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(table).map_err(storage)?;
            table.insert(key, value).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }
}

fn synthesis_ref(file_name: String) -> ArtifactRef {
    let location = PathBuf::from("synthesis").join(&file_name);
    ArtifactRef {
        file_name,
        location,
    }
}

impl ArtifactStore for RedbStore {
    fn put_reference(&self, name: &SpeakerName, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(REFERENCES).map_err(storage)?;
            let exists = table.get(name.as_str()).map_err(storage)?.is_some();
            if exists {
                // Dropping the transaction aborts it.
                return Err(StoreError::AlreadyExists(name.to_string()));
            }
            table.insert(name.as_str(), audio).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(ArtifactRef {
            file_name: name.to_string(),
            location: PathBuf::from("references").join(name.as_str()),
        })
    }

    fn has_reference(&self, name: &SpeakerName) -> StoreResult<bool> {
        Ok(self.get(REFERENCES, name.as_str())?.is_some())
    }

    fn read_reference(&self, name: &SpeakerName) -> StoreResult<Vec<u8>> {
        self.get(REFERENCES, name.as_str())?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn read_fingerprint(&self, name: &SpeakerName) -> StoreResult<Option<Vec<u8>>> {
        self.get(FINGERPRINTS, name.as_str())
    }

    fn put_fingerprint(&self, name: &SpeakerName, data: &[u8]) -> StoreResult<()> {
        self.set(FINGERPRINTS, name.as_str(), data)
    }

    fn resolve_synthesis(&self, name: &SpeakerName, text: &str) -> StoreResult<SynthesisSlot> {
        let key = SynthesisKey::new(name, text);
        let file_name = key.file_name();
        let exists = self.get(SYNTHESIS, &file_name)?.is_some();
        Ok(SynthesisSlot {
            key,
            exists,
            artifact: synthesis_ref(file_name),
        })
    }

    fn put_synthesis(&self, key: &SynthesisKey, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let file_name = key.file_name();
        self.set(SYNTHESIS, &file_name, audio)?;
        Ok(synthesis_ref(file_name))
    }

    fn read_synthesis(&self, file_name: &str) -> StoreResult<Vec<u8>> {
        SynthesisKey::parse_file_name(file_name)?;
        self.get(SYNTHESIS, file_name)?
            .ok_or_else(|| StoreError::NotFound(file_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_reference_create_only() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("artifacts.redb")).unwrap();
        let alice = SpeakerName::parse("alice").unwrap();

        store.put_reference(&alice, b"first").unwrap();
        let err = store.put_reference(&alice, b"second").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.read_reference(&alice).unwrap(), b"first");
    }

    #[test]
    fn test_redb_synthesis_and_fingerprint() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("artifacts.redb")).unwrap();
        let alice = SpeakerName::parse("alice").unwrap();

        let slot = store.resolve_synthesis(&alice, "hello").unwrap();
        assert!(!slot.exists);
        store.put_synthesis(&slot.key, b"wav").unwrap();
        assert!(store.resolve_synthesis(&alice, "hello").unwrap().exists);
        assert_eq!(store.read_synthesis(&slot.artifact.file_name).unwrap(), b"wav");

        assert_eq!(store.read_fingerprint(&alice).unwrap(), None);
        store.put_fingerprint(&alice, b"fp").unwrap();
        assert_eq!(store.read_fingerprint(&alice).unwrap(), Some(b"fp".to_vec()));
    }

    #[test]
    fn test_redb_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artifacts.redb");
        let alice = SpeakerName::parse("alice").unwrap();
        {
            let store = RedbStore::open(&path).unwrap();
            store.put_reference(&alice, b"voice").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert!(store.has_reference(&alice).unwrap());
    }
}
