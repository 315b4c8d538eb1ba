//! Server configuration.
//!
//! Loaded from a YAML file; every field has a default so an empty or
//! missing file yields a runnable server:
//!
//! ```yaml
//! listen: ":80"
//! store:
//!   backend: fs            # fs | redb
//!   root: outputs
//!   reference_ext: mp3
//! inference:
//!   base_url: http://127.0.0.1:9000
//!   timeout_secs: 300
//!   vad: true
//! base_voice:
//!   speaker: default
//!   language: English
//!   speed: 1.0
//!   fingerprint: checkpoints/base_speakers/EN/en_default_se.json
//! synthesis_timeout_secs: 0  # 0 disables
//! warm_on_register: true
//! max_upload_bytes: 20971520
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use voxclone_tts::BaseVoice;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address. A leading ':' binds all interfaces.
    pub listen: String,
    pub store: StoreConfig,
    pub inference: InferenceConfig,
    pub base_voice: BaseVoiceConfig,
    /// Upper bound for one synthesis pipeline run, in seconds. 0 disables.
    pub synthesis_timeout_secs: u64,
    /// Extract the speaker fingerprint during `/add_voice`.
    pub warm_on_register: bool,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fs,
    Redb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory of the filesystem store.
    pub root: PathBuf,
    /// Extension of stored reference recordings.
    pub reference_ext: String,
    /// Database file of the redb store. Defaults to `{root}/artifacts.redb`.
    pub redb_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    /// Per-request timeout against the inference service. 0 disables.
    pub timeout_secs: u64,
    pub vad: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaseVoiceConfig {
    pub speaker: String,
    pub language: String,
    pub speed: f32,
    /// JSON file holding the base voice fingerprint.
    pub fingerprint: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ":80".to_string(),
            store: StoreConfig::default(),
            inference: InferenceConfig::default(),
            base_voice: BaseVoiceConfig::default(),
            synthesis_timeout_secs: 0,
            warm_on_register: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            root: PathBuf::from("outputs"),
            reference_ext: "mp3".to_string(),
            redb_path: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            timeout_secs: 300,
            vad: true,
        }
    }
}

impl Default for BaseVoiceConfig {
    fn default() -> Self {
        let voice = BaseVoice::default();
        Self {
            speaker: voice.speaker,
            language: voice.language,
            speed: voice.speed,
            fingerprint: PathBuf::from("checkpoints/base_speakers/EN/en_default_se.json"),
        }
    }
}

impl Config {
    pub fn synthesis_timeout(&self) -> Option<Duration> {
        secs(self.synthesis_timeout_secs)
    }

    pub fn base_voice(&self) -> BaseVoice {
        BaseVoice {
            speaker: self.base_voice.speaker.clone(),
            language: self.base_voice.language.clone(),
            speed: self.base_voice.speed,
        }
    }
}

impl StoreConfig {
    pub fn redb_path(&self) -> PathBuf {
        self.redb_path
            .clone()
            .unwrap_or_else(|| self.root.join("artifacts.redb"))
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Option<Duration> {
        secs(self.timeout_secs)
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

/// Loads configuration from `path`, or the defaults when no path is given.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse(&content).with_context(|| format!("parse config {}", path.display()))
}

/// Parses a YAML configuration document.
pub fn parse(content: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Parse address string to SocketAddr.
pub fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    addr.parse()
        .with_context(|| format!("invalid listen address {addr:?}"))
}
