use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use voxclone_store::{ArtifactRef, ArtifactStore, SpeakerName};

use crate::error::TtsError;
use crate::fingerprint::Fingerprint;
use crate::locks::KeyedLocks;
use crate::model::FingerprintExtractor;

/// Validate a caller-supplied speaker name.
pub fn parse_speaker(name: &str) -> Result<SpeakerName, TtsError> {
    SpeakerName::parse(name).map_err(|e| TtsError::InvalidInput(e.to_string()))
}

/// Named speakers and their fingerprints.
///
/// A speaker is bound to exactly one reference recording for its lifetime,
/// which is what makes caching its fingerprint safe. Fingerprints are
/// looked up in memory first, then in the store, and only extracted when
/// neither has one. Extraction for a given speaker runs at most once at a
/// time.
pub struct SpeakerRegistry {
    store: Arc<dyn ArtifactStore>,
    extractor: Arc<dyn FingerprintExtractor>,
    fingerprints: RwLock<HashMap<SpeakerName, Arc<Fingerprint>>>,
    locks: KeyedLocks,
}

impl SpeakerRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>, extractor: Arc<dyn FingerprintExtractor>) -> Self {
        Self {
            store,
            extractor,
            fingerprints: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
        }
    }

    /// Bind `name` to a reference recording. Fails with
    /// [`TtsError::AlreadyExists`] if the name is taken.
    ///
    /// The audio content is not inspected here; a bad recording surfaces
    /// later as an extraction failure.
    pub fn register(&self, name: &str, audio: &[u8]) -> Result<ArtifactRef, TtsError> {
        let name = parse_speaker(name)?;
        if audio.is_empty() {
            return Err(TtsError::InvalidInput("empty reference audio".into()));
        }
        let artifact = self.store.put_reference(&name, audio)?;
        info!(speaker = %name, bytes = audio.len(), "registry: speaker registered");
        Ok(artifact)
    }

    /// Report whether `name` is a registered speaker.
    pub fn exists(&self, name: &str) -> Result<bool, TtsError> {
        let name = parse_speaker(name)?;
        Ok(self.store.has_reference(&name)?)
    }

    /// Return the fingerprint of a registered speaker.
    pub async fn resolve_fingerprint(&self, name: &str) -> Result<Arc<Fingerprint>, TtsError> {
        let name = parse_speaker(name)?;
        self.fingerprint(&name).await
    }

    /// Materialize the fingerprint of a freshly registered speaker.
    ///
    /// Best effort: failures are logged and left for the first synthesis
    /// request to retry.
    pub async fn warm(&self, name: &str) {
        if let Err(e) = self.resolve_fingerprint(name).await {
            warn!(speaker = %name, error = %e, "registry: fingerprint warm-up failed");
        }
    }

    /// Number of fingerprints held in memory.
    pub fn cached_fingerprints(&self) -> usize {
        self.fingerprints.read().len()
    }

    pub(crate) async fn fingerprint(&self, name: &SpeakerName) -> Result<Arc<Fingerprint>, TtsError> {
        if let Some(fp) = self.cached(name) {
            return Ok(fp);
        }
        if !self.store.has_reference(name)? {
            return Err(TtsError::NotFound(name.to_string()));
        }

        let _guard = self.locks.lock(name.as_str()).await;
        if let Some(fp) = self.cached(name) {
            return Ok(fp);
        }

        let fp = match self.load_persisted(name)? {
            Some(fp) => fp,
            None => self.extract(name).await?,
        };
        let fp = Arc::new(fp);
        self.fingerprints
            .write()
            .insert(name.clone(), Arc::clone(&fp));
        Ok(fp)
    }

    fn cached(&self, name: &SpeakerName) -> Option<Arc<Fingerprint>> {
        self.fingerprints.read().get(name).cloned()
    }

    fn load_persisted(&self, name: &SpeakerName) -> Result<Option<Fingerprint>, TtsError> {
        let Some(data) = self.store.read_fingerprint(name)? else {
            return Ok(None);
        };
        match Fingerprint::from_json(&data) {
            Ok(fp) => {
                debug!(speaker = %name, id = %fp.id, "registry: fingerprint loaded from store");
                Ok(Some(fp))
            }
            Err(e) => {
                warn!(speaker = %name, error = %e, "registry: discarding corrupt fingerprint");
                Ok(None)
            }
        }
    }

    async fn extract(&self, name: &SpeakerName) -> Result<Fingerprint, TtsError> {
        let reference = self.store.read_reference(name)?;
        let fp = self.extractor.extract(&reference).await?;
        fp.validate()?;
        info!(
            speaker = %name,
            id = %fp.id,
            dimension = fp.dimension(),
            "registry: fingerprint extracted"
        );

        // Persist failures are not fatal.
        match fp.to_json() {
            Ok(data) => {
                if let Err(e) = self.store.put_fingerprint(name, &data) {
                    warn!(speaker = %name, error = %e, "registry: failed to persist fingerprint");
                }
            }
            Err(e) => warn!(speaker = %name, error = %e, "registry: failed to encode fingerprint"),
        }
        Ok(fp)
    }
}
