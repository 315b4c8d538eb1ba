//! In-memory artifact store implementation for testing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::keys::{SpeakerName, SynthesisKey};
use crate::{ArtifactRef, ArtifactStore, StoreError, StoreResult, SynthesisSlot};

#[derive(Default)]
struct Tables {
    references: HashMap<SpeakerName, Vec<u8>>,
    fingerprints: HashMap<SpeakerName, Vec<u8>>,
    synthesis: HashMap<String, Vec<u8>>,
}

/// An in-memory artifact store backed by HashMaps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored synthesis artifacts.
    pub fn synthesis_count(&self) -> usize {
        self.lock().map(|t| t.synthesis.len()).unwrap_or(0)
    }

    /// Total number of stored artifacts of any kind.
    pub fn artifact_count(&self) -> usize {
        self.lock()
            .map(|t| t.references.len() + t.fingerprints.len() + t.synthesis.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.data
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

fn synthesis_ref(file_name: String) -> ArtifactRef {
    let location = PathBuf::from("memory").join(&file_name);
    ArtifactRef {
        file_name,
        location,
    }
}

impl ArtifactStore for MemoryStore {
    fn put_reference(&self, name: &SpeakerName, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let mut data = self.lock()?;
        if data.references.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        data.references.insert(name.clone(), audio.to_vec());
        Ok(ArtifactRef {
            file_name: name.to_string(),
            location: PathBuf::from("memory").join(name.as_str()),
        })
    }

    fn has_reference(&self, name: &SpeakerName) -> StoreResult<bool> {
        Ok(self.lock()?.references.contains_key(name))
    }

    fn read_reference(&self, name: &SpeakerName) -> StoreResult<Vec<u8>> {
        self.lock()?
            .references
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn read_fingerprint(&self, name: &SpeakerName) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.lock()?.fingerprints.get(name).cloned())
    }

    fn put_fingerprint(&self, name: &SpeakerName, data: &[u8]) -> StoreResult<()> {
        self.lock()?.fingerprints.insert(name.clone(), data.to_vec());
        Ok(())
    }

    fn resolve_synthesis(&self, name: &SpeakerName, text: &str) -> StoreResult<SynthesisSlot> {
        let key = SynthesisKey::new(name, text);
        let file_name = key.file_name();
        let exists = self.lock()?.synthesis.contains_key(&file_name);
        Ok(SynthesisSlot {
            key,
            exists,
            artifact: synthesis_ref(file_name),
        })
    }

    fn put_synthesis(&self, key: &SynthesisKey, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let file_name = key.file_name();
        self.lock()?
            .synthesis
            .insert(file_name.clone(), audio.to_vec());
        Ok(synthesis_ref(file_name))
    }

    fn read_synthesis(&self, file_name: &str) -> StoreResult<Vec<u8>> {
        SynthesisKey::parse_file_name(file_name)?;
        self.lock()?
            .synthesis
            .get(file_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(file_name.to_string()))
    }
}
