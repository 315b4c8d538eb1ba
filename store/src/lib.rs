//! Artifact store for the voice-cloning pipeline.
//!
//! Three kinds of artifacts are kept, all addressed by deterministic keys:
//!
//! ```text
//! reference    {speaker}            -> uploaded reference recording (create-only)
//! fingerprint  {speaker}            -> serialized speaker embedding (replaceable)
//! synthesis    {speaker}-{sha256}   -> converted audio for one (speaker, text) pair
//! ```
//!
//! The [`ArtifactStore`] trait hides the backing medium. [`FsStore`] lays
//! artifacts out as plain files under one output directory, [`RedbStore`]
//! keeps them in a single embedded database. [`MemoryStore`] is for tests.

pub mod fs;
pub mod keys;
pub mod memory;
pub mod redb;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use fs::FsStore;
pub use keys::{SpeakerName, SynthesisKey};
pub use memory::MemoryStore;
pub use self::redb::RedbStore;

/// Errors that can occur in artifact store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: already exists: {0}")]
    AlreadyExists(String),

    #[error("store: not found: {0}")]
    NotFound(String),

    #[error("store: invalid key: {0}")]
    InvalidKey(String),

    #[error("store: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store: storage error: {0}")]
    Storage(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Location of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Name a client uses to address the artifact (e.g. in `/get_file`).
    pub file_name: String,
    /// Backend-specific location. A real path for [`FsStore`].
    pub location: PathBuf,
}

/// Result of resolving a synthesis key against the store.
#[derive(Debug, Clone)]
pub struct SynthesisSlot {
    pub key: SynthesisKey,
    /// Whether a completed artifact is already stored under `key`.
    pub exists: bool,
    pub artifact: ArtifactRef,
}

/// Storage for reference recordings, fingerprints and synthesized audio.
///
/// Implementations must be safe for concurrent use by many request
/// handlers. Every successful write is all-or-nothing: a reader observes
/// either no artifact or the complete one.
pub trait ArtifactStore: Send + Sync {
    /// Store the reference recording for a new speaker.
    ///
    /// Create-only: fails with [`StoreError::AlreadyExists`] if the speaker
    /// already has a reference, leaving the existing one untouched.
    fn put_reference(&self, name: &SpeakerName, audio: &[u8]) -> StoreResult<ArtifactRef>;

    /// Report whether a reference recording exists for `name`.
    fn has_reference(&self, name: &SpeakerName) -> StoreResult<bool>;

    /// Read a reference recording. Fails with [`StoreError::NotFound`].
    fn read_reference(&self, name: &SpeakerName) -> StoreResult<Vec<u8>>;

    /// Read a persisted fingerprint, if any.
    fn read_fingerprint(&self, name: &SpeakerName) -> StoreResult<Option<Vec<u8>>>;

    /// Persist a fingerprint, replacing any previous one.
    fn put_fingerprint(&self, name: &SpeakerName, data: &[u8]) -> StoreResult<()>;

    /// Derive the synthesis key for `(name, text)` and report whether an
    /// artifact is already stored under it.
    fn resolve_synthesis(&self, name: &SpeakerName, text: &str) -> StoreResult<SynthesisSlot>;

    /// Store a synthesized artifact. Repeated writes to the same key are
    /// safe; the last writer wins.
    fn put_synthesis(&self, key: &SynthesisKey, audio: &[u8]) -> StoreResult<ArtifactRef>;

    /// Read a synthesized artifact by its file name.
    fn read_synthesis(&self, file_name: &str) -> StoreResult<Vec<u8>>;
}

impl fmt::Debug for dyn ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactStore {{ ... }}")
    }
}
