use async_trait::async_trait;

use crate::error::ModelError;
use crate::fingerprint::Fingerprint;

/// Base-voice settings handed to the [`BaseSynthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct BaseVoice {
    pub speaker: String,
    pub language: String,
    pub speed: f32,
}

impl Default for BaseVoice {
    fn default() -> Self {
        Self {
            speaker: "default".to_string(),
            language: "English".to_string(),
            speed: 1.0,
        }
    }
}

/// Derives a speaker fingerprint from a reference recording.
///
/// Extraction is expensive. Callers cache results per speaker and assume
/// the extractor is deterministic for the same input.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait FingerprintExtractor: Send + Sync {
    async fn extract(&self, reference: &[u8]) -> Result<Fingerprint, ModelError>;
}

/// Synthesizes text in the fixed base voice.
#[async_trait]
pub trait BaseSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &BaseVoice) -> Result<Vec<u8>, ModelError>;
}

/// Rewrites the timbre of `audio` from the `source` fingerprint to the
/// `target` fingerprint.
#[async_trait]
pub trait ToneConverter: Send + Sync {
    async fn convert(
        &self,
        audio: &[u8],
        source: &Fingerprint,
        target: &Fingerprint,
    ) -> Result<Vec<u8>, ModelError>;
}
