use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::StoreLocation;
use crate::history::ContextState;
use crate::task::TaskFile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("store file is corrupt: {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive advisory lock over the whole store, held for the duration of a
/// read-modify-write cycle. Blocks if another process holds it; released on
/// drop.
pub struct StoreGuard {
    file: File,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Persistence for `tasks.json` and `context.json`. Both documents are
/// rewritten in full on every mutation; writes go through a temp file and a
/// rename so a crash never leaves a half-written store behind.
pub struct Store {
    location: StoreLocation,
}

impl Store {
    pub fn new(location: StoreLocation) -> Self {
        Store { location }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn lock(&self) -> Result<StoreGuard, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.location.lock_path())?;
        file.lock_exclusive()?;
        Ok(StoreGuard { file })
    }

    pub fn tasks_exist(&self) -> bool {
        self.location.tasks_path().exists()
    }

    pub fn load_tasks(&self) -> Result<TaskFile, StoreError> {
        self.load_json(self.location.tasks_path())
    }

    pub fn save_tasks(&self, file: &TaskFile) -> Result<(), StoreError> {
        self.save_json(self.location.tasks_path(), file)
    }

    pub fn load_context(&self) -> Result<ContextState, StoreError> {
        self.load_json(self.location.context_path())
    }

    pub fn save_context(&self, state: &ContextState) -> Result<(), StoreError> {
        self.save_json(self.location.context_path(), state)
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write(path, &raw)
    }
}

/// Write via a sibling temp file and rename over the target, so readers see
/// either the old document or the new one, never a partial write.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store(root: &Path) -> Store {
        Store::new(StoreLocation::new(root))
    }

    #[test]
    fn load_tasks_reports_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let err = store(temp.path()).load_tasks();
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn load_tasks_reports_corrupt() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("tasks.json"), "{not json").expect("write");
        let err = store(temp.path()).load_tasks();
        assert!(matches!(err, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().expect("tempdir");
        let store = store(temp.path());
        let mut file = TaskFile::new("demo");
        let mut task = Task::new(1, "Alpha", Some("first"), 1);
        task.add_subtask("part one");
        file.tasks.push(task);
        file.tasks.push(Task::new(2, "Beta", None, 3));

        store.save_tasks(&file).expect("save");
        let loaded = store.load_tasks().expect("load");
        assert_eq!(loaded, file);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let temp = TempDir::new().expect("tempdir");
        let store = store(temp.path());
        store.save_tasks(&TaskFile::new("demo")).expect("save");
        assert!(temp.path().join("tasks.json").exists());
        assert!(!temp.path().join("tasks.tmp").exists());
    }

    #[test]
    fn lock_can_be_acquired_and_reacquired() {
        let temp = TempDir::new().expect("tempdir");
        let store = store(temp.path());
        {
            let _guard = store.lock().expect("first lock");
        }
        let _guard = store.lock().expect("second lock");
    }
}
