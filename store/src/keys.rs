//! Key layout for stored artifacts.
//!
//! ```text
//! {speaker}                   reference recording and fingerprint key
//! {speaker}-{sha256_hex}.wav  synthesized artifact file name
//! ```
//!
//! Speaker names are restricted to `[A-Za-z0-9_-]{1,64}` so they can be
//! used directly as path components. The digest is always 64 lowercase hex
//! characters, so a file name is split at its last '-'.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::{StoreError, StoreResult};

/// Maximum length of a speaker name.
pub const MAX_SPEAKER_NAME_LEN: usize = 64;

/// Extension of synthesized artifacts.
pub const SYNTHESIS_EXT: &str = "wav";

const DIGEST_HEX_LEN: usize = 64;

/// A validated speaker name, safe to use as a filesystem path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerName(String);

impl SpeakerName {
    /// Validate and wrap a caller-supplied speaker name.
    pub fn parse(name: &str) -> StoreResult<Self> {
        if name.is_empty() {
            return Err(StoreError::InvalidKey("empty speaker name".into()));
        }
        if name.len() > MAX_SPEAKER_NAME_LEN {
            return Err(StoreError::InvalidKey(format!(
                "speaker name longer than {MAX_SPEAKER_NAME_LEN} bytes"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(StoreError::InvalidKey(format!(
                "speaker name contains {c:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SpeakerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cache key of a synthesized artifact: the speaker plus the SHA-256 of
/// the exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthesisKey {
    speaker: SpeakerName,
    digest: String,
}

impl SynthesisKey {
    pub fn new(speaker: &SpeakerName, text: &str) -> Self {
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        Self {
            speaker: speaker.clone(),
            digest,
        }
    }

    /// Parse a file name produced by [`SynthesisKey::file_name`].
    ///
    /// Anything else, including path separators or traversal attempts,
    /// is rejected with [`StoreError::InvalidKey`].
    pub fn parse_file_name(file_name: &str) -> StoreResult<Self> {
        let invalid = || StoreError::InvalidKey(format!("bad artifact name {file_name:?}"));

        let stem = file_name
            .strip_suffix(SYNTHESIS_EXT)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(invalid)?;
        let (speaker, digest) = stem.rsplit_once('-').ok_or_else(invalid)?;
        if digest.len() != DIGEST_HEX_LEN
            || !digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid());
        }
        let speaker = SpeakerName::parse(speaker).map_err(|_| invalid())?;
        Ok(Self {
            speaker,
            digest: digest.to_string(),
        })
    }

    pub fn speaker(&self) -> &SpeakerName {
        &self.speaker
    }

    /// Lowercase hex SHA-256 of the text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File name of the artifact. Format: "{speaker}-{sha256_hex}.wav"
    pub fn file_name(&self) -> String {
        format!("{}-{}.{SYNTHESIS_EXT}", self.speaker, self.digest)
    }
}

impl fmt::Display for SynthesisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.speaker, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a7380ee9088f7ace2efcde9";

    #[test]
    fn test_speaker_name_charset() {
        assert!(SpeakerName::parse("alice").is_ok());
        assert!(SpeakerName::parse("Bob_2-x").is_ok());
        assert!(SpeakerName::parse("").is_err());
        assert!(SpeakerName::parse("../etc").is_err());
        assert!(SpeakerName::parse("a/b").is_err());
        assert!(SpeakerName::parse("a.b").is_err());
        assert!(SpeakerName::parse("名字").is_err());
        assert!(SpeakerName::parse(&"a".repeat(MAX_SPEAKER_NAME_LEN)).is_ok());
        assert!(SpeakerName::parse(&"a".repeat(MAX_SPEAKER_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_synthesis_key_format() {
        let alice = SpeakerName::parse("alice").unwrap();
        let key = SynthesisKey::new(&alice, "hello world");
        assert_eq!(key.digest(), HELLO_WORLD_SHA256);
        assert_eq!(key.file_name(), format!("alice-{HELLO_WORLD_SHA256}.wav"));
    }

    #[test]
    fn test_synthesis_key_deterministic() {
        let alice = SpeakerName::parse("alice").unwrap();
        let bob = SpeakerName::parse("bob").unwrap();
        assert_eq!(
            SynthesisKey::new(&alice, "hello world"),
            SynthesisKey::new(&alice, "hello world")
        );
        assert_ne!(
            SynthesisKey::new(&alice, "hello world"),
            SynthesisKey::new(&alice, "hello world!")
        );
        assert_ne!(
            SynthesisKey::new(&alice, "hello world").file_name(),
            SynthesisKey::new(&bob, "hello world").file_name()
        );
    }

    #[test]
    fn test_parse_file_name_roundtrip_with_dashed_speaker() {
        let name = SpeakerName::parse("mary-jane").unwrap();
        let key = SynthesisKey::new(&name, "hi");
        let parsed = SynthesisKey::parse_file_name(&key.file_name()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.speaker().as_str(), "mary-jane");
    }

    #[test]
    fn test_parse_file_name_rejects_garbage() {
        let bad_names = vec![
            String::new(),
            "alice.wav".to_string(),
            "alice-1234.wav".to_string(),
            format!("alice-{HELLO_WORLD_SHA256}.mp3"),
            format!("alice-{}.wav", HELLO_WORLD_SHA256.to_uppercase()),
            format!("../alice-{HELLO_WORLD_SHA256}.wav"),
            format!("a/b-{HELLO_WORLD_SHA256}.wav"),
            format!("-{HELLO_WORLD_SHA256}.wav"),
        ];
        for bad in &bad_names {
            assert!(
                SynthesisKey::parse_file_name(bad).is_err(),
                "should reject {bad:?}"
            );
        }
    }
}
