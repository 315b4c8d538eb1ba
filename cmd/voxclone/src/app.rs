//! Application context shared by every request handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use voxclone_store::{ArtifactStore, FsStore, RedbStore};
use voxclone_tts::{
    BaseSynthesizer, Fingerprint, FingerprintExtractor, RemoteConfig, RemoteModels,
    SpeakerRegistry, SynthesisCache, SynthesisConfig, ToneConverter,
};

use crate::config::{Config, InferenceConfig, StoreBackend, StoreConfig};

/// The three model collaborators.
#[derive(Clone)]
pub struct Models {
    pub extractor: Arc<dyn FingerprintExtractor>,
    pub synthesizer: Arc<dyn BaseSynthesizer>,
    pub converter: Arc<dyn ToneConverter>,
}

impl Models {
    /// Models served by a remote inference sidecar.
    pub fn remote(cfg: &InferenceConfig) -> Result<Self> {
        let mut remote = RemoteConfig::new(&cfg.base_url).with_vad(cfg.vad);
        if let Some(timeout) = cfg.timeout() {
            remote = remote.with_timeout(timeout);
        }
        let models = Arc::new(RemoteModels::new(remote)?);
        Ok(Self {
            extractor: models.clone(),
            synthesizer: models.clone(),
            converter: models,
        })
    }
}

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub store: Arc<dyn ArtifactStore>,
    pub registry: Arc<SpeakerRegistry>,
    pub synthesis: Arc<SynthesisCache>,
    pub warm_on_register: bool,
}

impl AppContext {
    pub fn new(
        cfg: &Config,
        store: Arc<dyn ArtifactStore>,
        models: Models,
        base_fingerprint: Fingerprint,
    ) -> Self {
        let registry = Arc::new(SpeakerRegistry::new(Arc::clone(&store), models.extractor));
        let synthesis = Arc::new(SynthesisCache::new(SynthesisConfig {
            store: Arc::clone(&store),
            registry: Arc::clone(&registry),
            synthesizer: models.synthesizer,
            converter: models.converter,
            base_fingerprint: Arc::new(base_fingerprint),
            voice: cfg.base_voice(),
            timeout: cfg.synthesis_timeout(),
        }));
        Self {
            store,
            registry,
            synthesis,
            warm_on_register: cfg.warm_on_register,
        }
    }

    /// Build the production context: configured store, remote models and
    /// the base voice fingerprint from disk.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let store = open_store(&cfg.store)?;
        let models = Models::remote(&cfg.inference)?;
        let base = Fingerprint::load(&cfg.base_voice.fingerprint).with_context(|| {
            format!(
                "load base fingerprint {}",
                cfg.base_voice.fingerprint.display()
            )
        })?;
        info!(
            id = %base.id,
            dimension = base.dimension(),
            inference = %cfg.inference.base_url,
            "app: base voice loaded"
        );
        Ok(Self::new(cfg, store, models, base))
    }
}

/// Open the configured artifact store.
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match cfg.backend {
        StoreBackend::Fs => {
            let store = FsStore::with_reference_ext(&cfg.root, &cfg.reference_ext)
                .with_context(|| format!("open store {}", cfg.root.display()))?;
            info!(root = %cfg.root.display(), "app: filesystem store opened");
            Arc::new(store)
        }
        StoreBackend::Redb => {
            let path = cfg.redb_path();
            let store = RedbStore::open(&path)
                .with_context(|| format!("open redb store {}", path.display()))?;
            info!(path = %path.display(), "app: redb store opened");
            Arc::new(store)
        }
    };
    Ok(store)
}
