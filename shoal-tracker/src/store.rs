//! Directory snapshot persistence: full-file JSON, replaced atomically on every save.

use std::io;
use std::path::PathBuf;

use shoal_core::Directory;

/// Snapshot file for the directory: a JSON object keyed by peer IP, each value
/// a list of `{filename, size}` records. Rewritten whole on every mutation.
/// Not thread-safe; the server serializes access together with the directory.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the snapshot. A missing file is an empty directory; a file that
    /// exists but cannot be read or parsed is an error, and the caller treats
    /// it as fatal at startup.
    pub fn load(&self) -> Result<Directory, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Directory::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Overwrite the snapshot with the full directory. Writes a sibling temp
    /// file first and renames it over the target, so a failed save never
    /// leaves a half-written snapshot behind.
    pub async fn save(&self, dir: &Directory) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(dir)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Error reading or writing the snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot io: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::{Directory, FileEntry, PeerId};

    fn sample_directory() -> Directory {
        let mut dir = Directory::new();
        let a = PeerId("10.0.0.1".parse().unwrap());
        let b = PeerId("10.0.0.2".parse().unwrap());
        dir.join(a);
        dir.join(b);
        dir.publish(
            a,
            FileEntry {
                filename: "report.pdf".to_owned(),
                size: 2048,
            },
        );
        dir.publish(
            b,
            FileEntry {
                filename: "notes.txt".to_owned(),
                size: 16,
            },
        );
        dir
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("directory.json"));
        let dir = sample_directory();
        store.save(&dir).await.unwrap();
        assert_eq!(store.load().unwrap(), dir);
    }

    #[test]
    fn missing_snapshot_is_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("directory.json"));
        assert_eq!(store.load().unwrap(), Directory::new());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("directory.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = SnapshotStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("directory.json"));
        store.save(&sample_directory()).await.unwrap();
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["directory.json".to_owned()]);
    }

    #[tokio::test]
    async fn snapshot_is_human_readable_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("directory.json");
        let store = SnapshotStore::new(path.clone());
        store.save(&sample_directory()).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"10.0.0.1\""));
        assert!(text.contains("\"report.pdf\""));
    }
}
