//! Transient artifact spool: holds an uploaded document on disk for the
//! duration of a pipeline run.
//!
//! Spooled files are working copies, not records. The job row keeps the
//! spool reference so a crashed run can be cleaned up later, but a normal
//! run discards its artifact as its last step whether it completed or
//! failed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Scratch storage for in-flight artifacts.
pub trait TransientStore: Send + Sync {
    /// Write the artifact and return an opaque reference to it.
    fn stash(&self, bytes: &[u8], mime_type: &str) -> io::Result<String>;

    /// Remove a previously stashed artifact. Best effort — a missing file
    /// is not an error.
    fn discard(&self, reference: &str);
}

/// Filesystem spool under a single directory.
pub struct SpoolStore {
    dir: PathBuf,
}

impl SpoolStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Spool under the default application data directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::spool_dir())
    }

    fn extension_for(mime_type: &str) -> &'static str {
        match mime_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => "bin",
        }
    }
}

impl TransientStore for SpoolStore {
    fn stash(&self, bytes: &[u8], mime_type: &str) -> io::Result<String> {
        fs::create_dir_all(&self.dir)?;
        let name = format!("{}.{}", Uuid::new_v4(), Self::extension_for(mime_type));
        let path = self.dir.join(&name);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Artifact spooled");
        Ok(path.to_string_lossy().into_owned())
    }

    fn discard(&self, reference: &str) {
        let path = Path::new(reference);
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to discard spooled artifact");
            }
        }
    }
}

/// In-memory stand-in for tests that never touches the filesystem.
#[cfg(test)]
pub struct NullTransientStore;

#[cfg(test)]
impl TransientStore for NullTransientStore {
    fn stash(&self, _bytes: &[u8], mime_type: &str) -> io::Result<String> {
        Ok(format!("null://{}/{}", mime_type, Uuid::new_v4()))
    }

    fn discard(&self, _reference: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stash_writes_and_discard_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(tmp.path());

        let reference = store.stash(b"fake image bytes", "image/png").unwrap();
        assert!(reference.ends_with(".png"));
        assert_eq!(fs::read(&reference).unwrap(), b"fake image bytes");

        store.discard(&reference);
        assert!(!Path::new(&reference).exists());
    }

    #[test]
    fn discard_of_missing_file_is_silent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(tmp.path());
        store.discard(tmp.path().join("never-existed.png").to_str().unwrap());
    }

    #[test]
    fn stash_creates_spool_dir_on_demand() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let store = SpoolStore::new(&nested);
        let reference = store.stash(b"x", "application/pdf").unwrap();
        assert!(Path::new(&reference).starts_with(&nested));
        assert!(reference.ends_with(".pdf"));
    }

    #[test]
    fn unknown_mime_gets_bin_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(tmp.path());
        let reference = store.stash(b"x", "text/plain").unwrap();
        assert!(reference.ends_with(".bin"));
    }
}
