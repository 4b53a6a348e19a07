//! Managed storage for imported sound files.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Copies imported files into a managed directory and deletes them on
/// request. Stateless per call; never touches the decode cache.
pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `source` into the store under a collision-safe name and
    /// returns the managed path. Creates the store root on first use.
    pub fn save(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid file name")
            })?;

        fs::create_dir_all(&self.root)?;

        let mut dest = self.root.join(file_name);
        if dest.exists() {
            // Same name already imported; suffix with a timestamp instead of
            // overwriting what another button may reference.
            let stem = source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sound");
            let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            dest = self.root.join(format!("{stem}_{timestamp}.{extension}"));
        }

        fs::copy(source, &dest)?;
        log::info!("Saved {} to {}", source.display(), dest.display());
        Ok(dest)
    }

    /// Removes a managed file. A file that is already gone counts as
    /// success. Failures are non-fatal by contract: callers log them and
    /// proceed with their own bookkeeping.
    pub fn delete(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(path)?;
        log::info!("Deleted {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cueboard-library-{}-{}-{}",
            tag,
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn save_copies_into_store() {
        let dir = scratch_dir("save");
        let source = dir.join("boom.wav");
        fs::write(&source, b"fake-pcm").unwrap();

        let store = LibraryStore::new(dir.join("sounds"));
        let managed = store.save(&source).unwrap();
        assert!(managed.exists());
        assert!(managed.starts_with(store.root()));
        assert_eq!(fs::read(&managed).unwrap(), b"fake-pcm");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn colliding_names_get_distinct_paths() {
        let dir = scratch_dir("collide");
        let source = dir.join("boom.wav");
        fs::write(&source, b"fake-pcm").unwrap();

        let store = LibraryStore::new(dir.join("sounds"));
        let first = store.save(&source).unwrap();
        let second = store.save(&source).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn delete_tolerates_missing_files() {
        let dir = scratch_dir("delete");
        let store = LibraryStore::new(&dir);
        assert!(store.delete(&dir.join("never-existed.wav")).is_ok());

        let source = dir.join("boom.wav");
        fs::write(&source, b"x").unwrap();
        let managed = store.save(&source).unwrap();
        store.delete(&managed).unwrap();
        assert!(!managed.exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
