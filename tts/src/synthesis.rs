use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use voxclone_store::{ArtifactRef, ArtifactStore, SpeakerName, SynthesisKey};

use crate::error::{ModelError, TtsError};
use crate::fingerprint::Fingerprint;
use crate::locks::KeyedLocks;
use crate::model::{BaseSynthesizer, BaseVoice, ToneConverter};
use crate::registry::{parse_speaker, SpeakerRegistry};

/// Configures a [`SynthesisCache`].
pub struct SynthesisConfig {
    /// Shared artifact store. Required.
    pub store: Arc<dyn ArtifactStore>,

    /// Resolves target fingerprints. Required.
    pub registry: Arc<SpeakerRegistry>,

    /// Produces audio in the base voice. Required.
    pub synthesizer: Arc<dyn BaseSynthesizer>,

    /// Converts base-voice audio to the target speaker. Required.
    pub converter: Arc<dyn ToneConverter>,

    /// Fingerprint of the base voice, used as the conversion source.
    pub base_fingerprint: Arc<Fingerprint>,

    /// Settings passed to the base synthesizer.
    pub voice: BaseVoice,

    /// Upper bound on one model pipeline run. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Resolve-or-build cache of synthesized audio keyed by (speaker, text).
///
/// A cached artifact is served without touching any model. On a miss the
/// base synthesizer and tone converter run once per key, even under
/// concurrent identical requests, and the result is written to the store
/// under the derived key.
pub struct SynthesisCache {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<SpeakerRegistry>,
    synthesizer: Arc<dyn BaseSynthesizer>,
    converter: Arc<dyn ToneConverter>,
    base_fingerprint: Arc<Fingerprint>,
    voice: BaseVoice,
    timeout: Option<Duration>,
    locks: KeyedLocks,
}

impl SynthesisCache {
    pub fn new(cfg: SynthesisConfig) -> Self {
        Self {
            store: cfg.store,
            registry: cfg.registry,
            synthesizer: cfg.synthesizer,
            converter: cfg.converter,
            base_fingerprint: cfg.base_fingerprint,
            voice: cfg.voice,
            timeout: cfg.timeout,
            locks: KeyedLocks::new(),
        }
    }

    /// Return the artifact for `(name, text)`, synthesizing it on first use.
    ///
    /// Fails with [`TtsError::InvalidInput`] for empty text or a malformed
    /// name and [`TtsError::NotFound`] for an unregistered speaker; neither
    /// touches a model or writes anything. Every failure past that point is
    /// reported as [`TtsError::SynthesisFailed`] and leaves no artifact
    /// behind, so the request can simply be retried.
    pub async fn synthesize(&self, name: &str, text: &str) -> Result<ArtifactRef, TtsError> {
        if text.is_empty() {
            return Err(TtsError::InvalidInput("empty text".into()));
        }
        let name = parse_speaker(name)?;
        if !self.store.has_reference(&name)? {
            return Err(TtsError::NotFound(name.to_string()));
        }

        let key = match self.lookup(&name, text)? {
            Lookup::Hit(artifact) => return Ok(artifact),
            Lookup::Miss(key) => key,
        };

        let _guard = self.locks.lock(&key.file_name()).await;
        // Another request may have finished this key while we waited.
        if let Lookup::Hit(artifact) = self.lookup(&name, text)? {
            return Ok(artifact);
        }

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.build(&name, text, &key)).await {
                Ok(result) => result,
                Err(_) => Err(TtsError::SynthesisFailed(format!(
                    "timed out after {}s",
                    limit.as_secs_f32()
                ))),
            },
            None => self.build(&name, text, &key).await,
        };

        result.map_err(|e| {
            error!(speaker = %name, key = %key, error = %e, "synthesis: failed");
            match e {
                TtsError::SynthesisFailed(_) => e,
                other => TtsError::SynthesisFailed(other.to_string()),
            }
        })
    }

    fn lookup(&self, name: &SpeakerName, text: &str) -> Result<Lookup, TtsError> {
        let slot = self
            .store
            .resolve_synthesis(name, text)
            .map_err(|e| TtsError::SynthesisFailed(e.to_string()))?;
        if slot.exists {
            debug!(file_name = %slot.artifact.file_name, "synthesis: cache hit");
            Ok(Lookup::Hit(slot.artifact))
        } else {
            Ok(Lookup::Miss(slot.key))
        }
    }

    async fn build(
        &self,
        name: &SpeakerName,
        text: &str,
        key: &SynthesisKey,
    ) -> Result<ArtifactRef, TtsError> {
        let target = self.registry.fingerprint(name).await?;

        let base = self.synthesizer.synthesize(text, &self.voice).await?;
        if base.is_empty() {
            return Err(ModelError::EmptyAudio.into());
        }

        let audio = self
            .converter
            .convert(&base, &self.base_fingerprint, &target)
            .await?;
        if audio.is_empty() {
            return Err(ModelError::EmptyAudio.into());
        }

        let artifact = self.store.put_synthesis(key, &audio)?;
        info!(
            speaker = %name,
            file_name = %artifact.file_name,
            chars = text.chars().count(),
            bytes = audio.len(),
            "synthesis: artifact stored"
        );
        Ok(artifact)
    }
}

enum Lookup {
    Hit(ArtifactRef),
    Miss(SynthesisKey),
}
