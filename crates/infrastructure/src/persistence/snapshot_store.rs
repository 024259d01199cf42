//! File-backed snapshot store.
//!
//! Each template keeps its history in one JSON document under the state
//! directory, oldest snapshot first:
//!
//! ```text
//! <state_dir>/history/<template id>.json
//! ```
//!
//! The current snapshot is also mirrored to the template's output file under
//! the output root, which is what downstream tooling consumes. Both files are
//! replaced through a temp file and a rename, so a crash leaves either the old
//! or the new version in place, never a partial one.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use kustforge_application::ports::{FileSystem, FileSystemError, SnapshotError, SnapshotStore};
use kustforge_domain::{Snapshot, TemplateId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

const HISTORY_DIR: &str = "history";

/// On-disk history of one template.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    template: TemplateId,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    id: Uuid,
    taken_at: DateTime<Utc>,
    /// Base64 of the exact bytes written.
    content: String,
}

impl SnapshotRecord {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id,
            taken_at: snapshot.taken_at,
            content: STANDARD.encode(&snapshot.content),
        }
    }

    fn into_snapshot(self, template: &TemplateId) -> Result<Snapshot, SnapshotError> {
        let content = STANDARD
            .decode(self.content.as_bytes())
            .map_err(|e| SnapshotError::Serialization(format!("snapshot {}: {e}", self.id)))?;
        Ok(Snapshot {
            id: self.id,
            template: template.clone(),
            content,
            taken_at: self.taken_at,
        })
    }
}

/// Snapshot store persisting history as stable JSON.
pub struct FileSnapshotStore<F: FileSystem> {
    fs: F,
    state_dir: PathBuf,
    output_root: PathBuf,
    // Serializes read-modify-write cycles on history documents.
    write_lock: Mutex<()>,
}

impl<F: FileSystem> FileSnapshotStore<F> {
    /// Creates a store keeping history under `state_dir` and writing current
    /// output files under `output_root`.
    #[must_use]
    pub fn new(fs: F, state_dir: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            state_dir: state_dir.into(),
            output_root: output_root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Directory holding history documents.
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.state_dir.join(HISTORY_DIR)
    }

    /// Where the current snapshot of `template` is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the template id escapes the output root.
    pub fn output_path(&self, template: &TemplateId) -> Result<PathBuf, SnapshotError> {
        Ok(self.output_root.join(relative_path(template)?))
    }

    fn history_path(&self, template: &TemplateId) -> Result<PathBuf, SnapshotError> {
        let relative = relative_path(template)?;
        let mut file_name = relative.as_os_str().to_owned();
        file_name.push(".json");
        Ok(self.history_dir().join(file_name))
    }

    async fn load(&self, template: &TemplateId) -> Result<HistoryDocument, SnapshotError> {
        let path = self.history_path(template)?;
        match self.fs.read_file(&path).await {
            Ok(bytes) => from_json_bytes(&bytes).map_err(serialization_error),
            Err(FileSystemError::NotFound(_)) => Ok(HistoryDocument {
                template: template.clone(),
                snapshots: Vec::new(),
            }),
            Err(err) => Err(err.into_snapshot_error()),
        }
    }

    async fn save(&self, document: &HistoryDocument) -> Result<(), SnapshotError> {
        let path = self.history_path(&document.template)?;
        let bytes = to_json_stable_bytes(document).map_err(serialization_error)?;
        self.write_atomic(&path, &bytes).await
    }

    /// Writes `contents` next to `path` and renames it into place.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), SnapshotError> {
        let temp = temp_path(path);
        self.fs
            .write_file(&temp, contents)
            .await
            .map_err(FileSystemError::into_snapshot_error)?;
        if let Err(err) = self.fs.rename(&temp, path).await {
            let _ = self.fs.remove_file(&temp).await;
            return Err(err.into_snapshot_error());
        }
        Ok(())
    }

    async fn write_output(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let path = self.output_path(&snapshot.template)?;
        self.write_atomic(&path, &snapshot.content).await?;
        debug!(path = %path.display(), bytes = snapshot.content.len(), "output written");
        Ok(())
    }

    async fn read_output(&self, template: &TemplateId) -> Result<Option<Vec<u8>>, SnapshotError> {
        let path = self.output_path(template)?;
        match self.fs.read_file(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(FileSystemError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into_snapshot_error()),
        }
    }

    fn decode(document: HistoryDocument) -> Result<Vec<Snapshot>, SnapshotError> {
        let template = document.template;
        document
            .snapshots
            .into_iter()
            .map(|record| record.into_snapshot(&template))
            .collect()
    }
}

#[async_trait]
impl<F: FileSystem> SnapshotStore for FileSnapshotStore<F> {
    async fn current(&self, template: &TemplateId) -> Result<Option<Snapshot>, SnapshotError> {
        let mut document = self.load(template).await?;
        document
            .snapshots
            .pop()
            .map(|record| record.into_snapshot(template))
            .transpose()
    }

    async fn existing_output(&self, template: &TemplateId) -> Result<Option<Vec<u8>>, SnapshotError> {
        if self.load(template).await?.snapshots.is_empty() {
            self.read_output(template).await
        } else {
            Ok(None)
        }
    }

    async fn history(&self, template: &TemplateId) -> Result<Vec<Snapshot>, SnapshotError> {
        Self::decode(self.load(template).await?)
    }

    async fn commit(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(&snapshot.template).await?;
        let previous = document.snapshots.clone();
        document.template = snapshot.template.clone();
        if document.snapshots.is_empty()
            && let Some(existing) = self.read_output(&snapshot.template).await?
        {
            let baseline = Snapshot::new(snapshot.template.clone(), existing, snapshot.taken_at);
            info!(template = %snapshot.template, snapshot = %baseline.id, "existing output kept as baseline");
            document.snapshots.push(SnapshotRecord::from_snapshot(&baseline));
        }
        document.snapshots.push(SnapshotRecord::from_snapshot(snapshot));

        self.save(&document).await?;
        if let Err(err) = self.write_output(snapshot).await {
            // Keep history and output in step.
            document.snapshots = previous;
            self.save(&document).await?;
            return Err(err);
        }

        info!(
            template = %snapshot.template,
            snapshot = %snapshot.id,
            history = document.snapshots.len(),
            "snapshot committed"
        );
        Ok(())
    }

    async fn rollback(&self, template: &TemplateId) -> Result<Snapshot, SnapshotError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(template).await?;
        if document.snapshots.len() < 2 {
            return Err(SnapshotError::NoSnapshot(template.clone()));
        }

        let Some(dropped) = document.snapshots.pop() else {
            return Err(SnapshotError::NoSnapshot(template.clone()));
        };
        let restored = document
            .snapshots
            .last()
            .cloned()
            .map(|record| record.into_snapshot(template))
            .transpose()?
            .ok_or_else(|| SnapshotError::NoSnapshot(template.clone()))?;

        self.save(&document).await?;
        if let Err(err) = self.write_output(&restored).await {
            document.snapshots.push(dropped);
            self.save(&document).await?;
            return Err(err);
        }
        info!(
            template = %template,
            dropped = %dropped.id,
            restored = %restored.id,
            "snapshot rolled back"
        );
        Ok(restored)
    }

    async fn prune(&self, template: &TemplateId, keep: usize) -> Result<usize, SnapshotError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(template).await?;
        let excess = document.snapshots.len().saturating_sub(keep);
        if excess == 0 {
            return Ok(0);
        }
        document.snapshots.drain(..excess);
        self.save(&document).await?;
        debug!(template = %template, dropped = excess, "snapshot history pruned");
        Ok(excess)
    }
}

/// Template ids are relative paths; anything that could leave the root is
/// rejected.
fn relative_path(template: &TemplateId) -> Result<PathBuf, SnapshotError> {
    let path = PathBuf::from(template.as_str());
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if template.as_str().is_empty() || escapes {
        return Err(FileSystemError::InvalidPath(template.to_string()).into_snapshot_error());
    }
    Ok(path)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn serialization_error(err: SerializationError) -> SnapshotError {
    SnapshotError::Serialization(err.to_string())
}

trait IntoSnapshotError {
    fn into_snapshot_error(self) -> SnapshotError;
}

impl IntoSnapshotError for FileSystemError {
    fn into_snapshot_error(self) -> SnapshotError {
        SnapshotError::Io(self.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::persistence::TokioFileSystem;

    fn store(dir: &TempDir) -> FileSnapshotStore<TokioFileSystem> {
        FileSnapshotStore::new(
            TokioFileSystem::new(),
            dir.path().join(".kustforge"),
            dir.path(),
        )
    }

    fn snapshot(id: &str, content: &[u8], minutes: i64) -> Snapshot {
        let epoch = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        Snapshot::new(TemplateId::new(id), content, epoch + Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn test_commit_writes_history_and_output() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let first = snapshot("k8s/app.yaml", b"replicas: 2\r\n", 0);

        store.commit(&first).await.unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("k8s/app.yaml")).unwrap(),
            b"replicas: 2\r\n"
        );
        assert!(dir.path().join(".kustforge/history/k8s/app.yaml.json").exists());
        assert_eq!(
            store.current(&first.template).await.unwrap(),
            Some(first.clone())
        );
        assert!(!dir.path().join("k8s/.app.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn test_arbitrary_bytes_survive() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let bytes = vec![0xff, 0x00, b'\r', b'\n', 0xc3, 0xa9];
        let snap = snapshot("bin.yaml", &bytes, 0);

        store.commit(&snap).await.unwrap();

        let reopened = FileSnapshotStore::new(
            TokioFileSystem::new(),
            dir.path().join(".kustforge"),
            dir.path(),
        );
        let current = reopened.current(&snap.template).await.unwrap().unwrap();
        assert_eq!(current.content, bytes);
        assert_eq!(current.taken_at, snap.taken_at);
    }

    #[tokio::test]
    async fn test_rollback_restores_previous_output() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let x = snapshot("app.yaml", b"image: app:1.0\n", 0);
        let y = snapshot("app.yaml", b"image: app:1.1\n", 5);
        store.commit(&x).await.unwrap();
        store.commit(&y).await.unwrap();

        let restored = store.rollback(&x.template).await.unwrap();

        assert_eq!(restored, x);
        assert_eq!(
            std::fs::read(dir.path().join("app.yaml")).unwrap(),
            b"image: app:1.0\n"
        );
        assert_eq!(store.history(&x.template).await.unwrap(), vec![x]);
    }

    #[tokio::test]
    async fn test_rollback_needs_an_earlier_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = TemplateId::new("app.yaml");

        let err = store.rollback(&id).await.unwrap_err();
        assert!(matches!(err, SnapshotError::NoSnapshot(_)));

        store.commit(&snapshot("app.yaml", b"a", 0)).await.unwrap();
        let err = store.rollback(&id).await.unwrap_err();
        assert!(matches!(err, SnapshotError::NoSnapshot(_)));
        assert_eq!(std::fs::read(dir.path().join("app.yaml")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_first_commit_keeps_existing_output_for_rollback() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(dir.path().join("app.yaml"), b"hand-written: true\n").unwrap();
        let id = TemplateId::new("app.yaml");

        assert_eq!(
            store.existing_output(&id).await.unwrap(),
            Some(b"hand-written: true\n".to_vec())
        );
        store.commit(&snapshot("app.yaml", b"rendered: 1\n", 0)).await.unwrap();
        assert_eq!(store.existing_output(&id).await.unwrap(), None);
        assert_eq!(store.history(&id).await.unwrap().len(), 2);

        let restored = store.rollback(&id).await.unwrap();
        assert_eq!(restored.content, b"hand-written: true\n");
        assert_eq!(
            std::fs::read(dir.path().join("app.yaml")).unwrap(),
            b"hand-written: true\n"
        );
    }

    #[tokio::test]
    async fn test_failed_rollback_write_keeps_history() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let x = snapshot("app.yaml", b"x\n", 0);
        let y = snapshot("app.yaml", b"y\n", 5);
        store.commit(&x).await.unwrap();
        store.commit(&y).await.unwrap();
        // A directory in place of the output file makes the rename fail.
        std::fs::remove_file(dir.path().join("app.yaml")).unwrap();
        std::fs::create_dir(dir.path().join("app.yaml")).unwrap();
        std::fs::write(dir.path().join("app.yaml/keep"), b"").unwrap();

        let id = x.template.clone();
        assert!(store.rollback(&id).await.is_err());
        assert_eq!(store.history(&id).await.unwrap(), vec![x, y]);
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for (i, body) in ["1", "2", "3", "4"].iter().enumerate() {
            store
                .commit(&snapshot("app.yaml", body.as_bytes(), i64::try_from(i).unwrap()))
                .await
                .unwrap();
        }
        let id = TemplateId::new("app.yaml");

        assert_eq!(store.prune(&id, 2).await.unwrap(), 2);
        assert_eq!(store.prune(&id, 2).await.unwrap(), 0);

        let kept: Vec<Vec<u8>> = store
            .history(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.content)
            .collect();
        assert_eq!(kept, vec![b"3".to_vec(), b"4".to_vec()]);
    }

    #[tokio::test]
    async fn test_template_id_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store
            .commit(&snapshot("../outside.yaml", b"x", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
        assert!(!dir.path().join("../outside.yaml").exists());
    }
}
