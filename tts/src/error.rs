use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;
use voxclone_store::StoreError;

/// Errors returned by model collaborators.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model: API error: {0}")]
    Api(String),

    #[error("model: invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("model: empty audio")]
    EmptyAudio,

    #[error("model: io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the registry and the synthesis cache.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts: speaker already exists: {0}")]
    AlreadyExists(String),

    #[error("tts: not found: {0}")]
    NotFound(String),

    #[error("tts: invalid input: {0}")]
    InvalidInput(String),

    #[error("tts: synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("tts: {0}")]
    Model(#[from] ModelError),

    #[error("tts: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TtsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(name) => Self::AlreadyExists(name),
            StoreError::NotFound(name) => Self::NotFound(name),
            StoreError::InvalidKey(msg) => Self::InvalidInput(msg),
            other => Self::Store(other),
        }
    }
}

/// Coarse error classification exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    InvalidInput,
    SynthesisFailed,
    Internal,
}

impl ErrorKind {
    /// Wire name, shared by the JSON body and the logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::SynthesisFailed => "synthesis_failed",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl TtsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
            Self::Model(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }
}
