//! Voice-cloning synthesis over pluggable model collaborators.
//!
//! # Architecture
//!
//! ```text
//! register(name, audio) -> SpeakerRegistry -> ArtifactStore::put_reference
//! synthesize(name, text) -> SynthesisCache
//!     cache hit  -> stored artifact, no model call
//!     cache miss -> SpeakerRegistry::fingerprint (memory -> store -> extractor)
//!                -> BaseSynthesizer -> ToneConverter -> ArtifactStore::put_synthesis
//! ```
//!
//! The three models sit behind the [`FingerprintExtractor`],
//! [`BaseSynthesizer`] and [`ToneConverter`] traits. [`RemoteModels`]
//! implements all of them against an HTTP inference sidecar.

mod error;
mod fingerprint;
pub mod locks;
mod model;
mod registry;
pub mod remote;
mod synthesis;

pub use error::{ErrorKind, ModelError, TtsError};
pub use fingerprint::Fingerprint;
pub use locks::KeyedLocks;
pub use model::{BaseSynthesizer, BaseVoice, FingerprintExtractor, ToneConverter};
pub use registry::{parse_speaker, SpeakerRegistry};
pub use remote::{RemoteConfig, RemoteModels};
pub use synthesis::{SynthesisCache, SynthesisConfig};
