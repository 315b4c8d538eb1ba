use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A speaker embedding ("tone color") produced by a
/// [`FingerprintExtractor`](crate::FingerprintExtractor).
///
/// Fingerprints are persisted as JSON next to the reference recordings and
/// loaded from JSON for the process-wide base voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Identifier assigned by the extractor.
    pub id: String,
    /// Dense embedding vector.
    pub values: Vec<f32>,
}

impl Fingerprint {
    /// Create a validated fingerprint.
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Result<Self, ModelError> {
        let fp = Self {
            id: id.into(),
            values,
        };
        fp.validate()?;
        Ok(fp)
    }

    /// Returns the dimensionality of the embedding.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Checks that the embedding is non-empty and finite.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.values.is_empty() {
            return Err(ModelError::InvalidFingerprint("empty embedding".into()));
        }
        if let Some(i) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidFingerprint(format!(
                "non-finite value at index {i}"
            )));
        }
        Ok(())
    }

    pub fn from_json(data: &[u8]) -> Result<Self, ModelError> {
        let fp: Self = serde_json::from_slice(data)
            .map_err(|e| ModelError::InvalidFingerprint(e.to_string()))?;
        fp.validate()?;
        Ok(fp)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(self).map_err(|e| ModelError::InvalidFingerprint(e.to_string()))
    }

    /// Load a fingerprint from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Fingerprint::new("a", vec![0.1, 0.2]).is_ok());
        assert!(matches!(
            Fingerprint::new("a", vec![]),
            Err(ModelError::InvalidFingerprint(_))
        ));
        assert!(matches!(
            Fingerprint::new("a", vec![0.1, f32::NAN]),
            Err(ModelError::InvalidFingerprint(_))
        ));
    }

    #[test]
    fn test_json_rejects_corrupt() {
        assert!(Fingerprint::from_json(b"not json").is_err());
        assert!(Fingerprint::from_json(br#"{"id":"x","values":[]}"#).is_err());

        let fp = Fingerprint::from_json(br#"{"id":"en_default","values":[1.0,-0.5]}"#).unwrap();
        assert_eq!(fp.id, "en_default");
        assert_eq!(fp.dimension(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en_default_se.json");
        let fp = Fingerprint::new("en_default", vec![0.25; 4]).unwrap();
        std::fs::write(&path, fp.to_json().unwrap()).unwrap();

        assert_eq!(Fingerprint::load(&path).unwrap(), fp);
        assert!(matches!(
            Fingerprint::load(dir.path().join("missing.json")),
            Err(ModelError::Io(_))
        ));
    }
}
