//! HTTP client for an inference sidecar hosting the voice models.
//!
//! API endpoints (relative to `base_url`):
//! - POST /extract - `{audio, vad}` -> `{id, values}`
//! - POST /tts     - `{text, speaker, language, speed}` -> audio bytes
//! - POST /convert - `{audio, source, target}` -> audio bytes
//!
//! Audio inside JSON bodies is standard base64.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Serialize;

use crate::error::ModelError;
use crate::fingerprint::Fingerprint;
use crate::model::{BaseSynthesizer, BaseVoice, FingerprintExtractor, ToneConverter};

/// Connection settings for [`RemoteModels`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Per-request timeout. `None` uses the client default (no timeout).
    pub timeout: Option<Duration>,
    /// Ask the extractor to strip silence before embedding.
    pub vad: bool,
}

impl RemoteConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: None,
            vad: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_vad(mut self, vad: bool) -> Self {
        self.vad = vad;
        self
    }
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    audio: &'a str,
    vad: bool,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker: &'a str,
    language: &'a str,
    speed: f32,
}

#[derive(Serialize)]
struct ConvertRequest<'a> {
    audio: &'a str,
    source: &'a [f32],
    target: &'a [f32],
}

/// Implements all three model collaborators over HTTP.
pub struct RemoteModels {
    client: Client,
    base_url: String,
    vad: bool,
}

impl RemoteModels {
    pub fn new(cfg: RemoteConfig) -> Result<Self, ModelError> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ModelError::Api(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            vad: cfg.vad,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("HTTP {status}: {body}")));
        }
        Ok(resp)
    }

    async fn post_for_audio<T: Serialize>(&self, path: &str, body: &T) -> Result<Vec<u8>, ModelError> {
        let audio = self
            .post(path, body)
            .await?
            .bytes()
            .await
            .map_err(|e| ModelError::Api(e.to_string()))?;
        if audio.is_empty() {
            return Err(ModelError::EmptyAudio);
        }
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl FingerprintExtractor for RemoteModels {
    async fn extract(&self, reference: &[u8]) -> Result<Fingerprint, ModelError> {
        if reference.is_empty() {
            return Err(ModelError::EmptyAudio);
        }
        let audio = BASE64.encode(reference);
        let body = ExtractRequest {
            audio: &audio,
            vad: self.vad,
        };
        let fp: Fingerprint = self
            .post("extract", &body)
            .await?
            .json()
            .await
            .map_err(|e| ModelError::InvalidFingerprint(e.to_string()))?;
        fp.validate()?;
        Ok(fp)
    }
}

#[async_trait]
impl BaseSynthesizer for RemoteModels {
    async fn synthesize(&self, text: &str, voice: &BaseVoice) -> Result<Vec<u8>, ModelError> {
        let body = TtsRequest {
            text,
            speaker: &voice.speaker,
            language: &voice.language,
            speed: voice.speed,
        };
        self.post_for_audio("tts", &body).await
    }
}

#[async_trait]
impl ToneConverter for RemoteModels {
    async fn convert(
        &self,
        audio: &[u8],
        source: &Fingerprint,
        target: &Fingerprint,
    ) -> Result<Vec<u8>, ModelError> {
        let audio = BASE64.encode(audio);
        let body = ConvertRequest {
            audio: &audio,
            source: &source.values,
            target: &target.values,
        };
        self.post_for_audio("convert", &body).await
    }
}
