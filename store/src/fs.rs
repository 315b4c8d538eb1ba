//! Filesystem-backed artifact store.
//!
//! Layout under the root directory:
//!
//! ```text
//! {root}/{speaker}.{ext}          reference recordings
//! {root}/se/{speaker}.json        fingerprints
//! {root}/generated/{file_name}    synthesized audio
//! ```
//!
//! Writes go to a temp file in the destination directory and are then
//! moved into place, so readers never see a partial file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::keys::{SpeakerName, SynthesisKey};
use crate::{ArtifactRef, ArtifactStore, StoreError, StoreResult, SynthesisSlot};

/// Default extension for reference recordings.
pub const DEFAULT_REFERENCE_EXT: &str = "mp3";

const FINGERPRINT_DIR: &str = "se";
const GENERATED_DIR: &str = "generated";

/// Artifact store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    reference_ext: String,
}

impl FsStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        Self::with_reference_ext(root, DEFAULT_REFERENCE_EXT)
    }

    /// Open a store whose reference recordings use a custom extension.
    pub fn with_reference_ext<P: AsRef<Path>>(root: P, ext: &str) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join(FINGERPRINT_DIR))?;
        std::fs::create_dir_all(root.join(GENERATED_DIR))?;
        let ext = ext.trim_start_matches('.');
        Ok(Self {
            root,
            reference_ext: if ext.is_empty() {
                DEFAULT_REFERENCE_EXT.to_string()
            } else {
                ext.to_string()
            },
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn reference_path(&self, name: &SpeakerName) -> PathBuf {
        self.root.join(format!("{name}.{}", self.reference_ext))
    }

    fn fingerprint_path(&self, name: &SpeakerName) -> PathBuf {
        self.root.join(FINGERPRINT_DIR).join(format!("{name}.json"))
    }

    fn generated_path(&self, file_name: &str) -> PathBuf {
        self.root.join(GENERATED_DIR).join(file_name)
    }
}

/// Write `data` to a temp file next to `dest`, flush it to disk and move
/// it into place. With `clobber == false` the final step is an atomic
/// create-if-absent.
fn write_atomic(dest: &Path, data: &[u8], clobber: bool) -> StoreResult<()> {
    let dir = dest
        .parent()
        .ok_or_else(|| StoreError::InvalidKey(dest.display().to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    if clobber {
        tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
        return Ok(());
    }
    match tmp.persist_noclobber(dest) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(StoreError::AlreadyExists(dest.display().to_string()))
        }
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

fn read_existing(path: &Path) -> StoreResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        _ => StoreError::Io(e),
    })
}

impl ArtifactStore for FsStore {
    fn put_reference(&self, name: &SpeakerName, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let path = self.reference_path(name);
        write_atomic(&path, audio, false).map_err(|e| match e {
            StoreError::AlreadyExists(_) => StoreError::AlreadyExists(name.to_string()),
            other => other,
        })?;
        debug!(speaker = %name, path = %path.display(), "store: reference written");
        Ok(ArtifactRef {
            file_name: format!("{name}.{}", self.reference_ext),
            location: path,
        })
    }

    fn has_reference(&self, name: &SpeakerName) -> StoreResult<bool> {
        Ok(self.reference_path(name).try_exists()?)
    }

    fn read_reference(&self, name: &SpeakerName) -> StoreResult<Vec<u8>> {
        read_existing(&self.reference_path(name)).map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(name.to_string()),
            other => other,
        })
    }

    fn read_fingerprint(&self, name: &SpeakerName) -> StoreResult<Option<Vec<u8>>> {
        match read_existing(&self.fingerprint_path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put_fingerprint(&self, name: &SpeakerName, data: &[u8]) -> StoreResult<()> {
        write_atomic(&self.fingerprint_path(name), data, true)
    }

    fn resolve_synthesis(&self, name: &SpeakerName, text: &str) -> StoreResult<SynthesisSlot> {
        let key = SynthesisKey::new(name, text);
        let file_name = key.file_name();
        let location = self.generated_path(&file_name);
        let exists = location.try_exists()?;
        Ok(SynthesisSlot {
            key,
            exists,
            artifact: ArtifactRef {
                file_name,
                location,
            },
        })
    }

    fn put_synthesis(&self, key: &SynthesisKey, audio: &[u8]) -> StoreResult<ArtifactRef> {
        let file_name = key.file_name();
        let location = self.generated_path(&file_name);
        write_atomic(&location, audio, true)?;
        debug!(file_name = %file_name, bytes = audio.len(), "store: synthesis written");
        Ok(ArtifactRef {
            file_name,
            location,
        })
    }

    fn read_synthesis(&self, file_name: &str) -> StoreResult<Vec<u8>> {
        let key = SynthesisKey::parse_file_name(file_name)?;
        read_existing(&self.generated_path(&key.file_name()))
            .map_err(|e| match e {
                StoreError::NotFound(_) => StoreError::NotFound(file_name.to_string()),
                other => other,
            })
    }
}
