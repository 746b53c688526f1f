// Opaque handles for files picked on the privileged side

use crate::jobs::JobError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Token the UI holds in place of a filesystem path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(String);

impl From<String> for FileHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What the UI gets back from the file picker: a handle and a display name
#[derive(Debug, Clone, Serialize)]
pub struct PickedFile {
    pub handle: FileHandle,
    pub file_name: String,
}

/// Holds the most recent pick only. Picking again invalidates the previous
/// handle; a running job has already resolved its path.
#[derive(Debug, Default)]
pub struct FileHandleRegistry {
    current: Mutex<Option<(FileHandle, PathBuf)>>,
}

impl FileHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: PathBuf) -> Result<PickedFile, JobError> {
        if !path.is_absolute() {
            return Err(JobError::InvalidRequest(format!(
                "Refusing to register relative path {:?}",
                path
            )));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let handle = FileHandle(uuid::Uuid::new_v4().to_string());

        if let Some((previous, _)) = self.current.lock().replace((handle.clone(), path)) {
            log::debug!("Released file handle {}", previous.0);
        }
        Ok(PickedFile { handle, file_name })
    }

    pub fn resolve(&self, handle: &FileHandle) -> Option<PathBuf> {
        self.current
            .lock()
            .as_ref()
            .filter(|(current, _)| current == handle)
            .map(|(_, path)| path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = FileHandleRegistry::new();
        let picked = registry.register(PathBuf::from("/videos/a.mp4")).unwrap();

        assert_eq!(picked.file_name, "a.mp4");
        assert_eq!(
            registry.resolve(&picked.handle),
            Some(PathBuf::from("/videos/a.mp4"))
        );
    }

    #[test]
    fn test_new_pick_releases_previous_handle() {
        let registry = FileHandleRegistry::new();
        let first = registry.register(PathBuf::from("/videos/a.mp4")).unwrap();
        let second = registry.register(PathBuf::from("/videos/b.mp4")).unwrap();

        assert_ne!(first.handle, second.handle);
        assert!(registry.resolve(&first.handle).is_none());
        assert_eq!(
            registry.resolve(&second.handle),
            Some(PathBuf::from("/videos/b.mp4"))
        );
        assert_eq!(registry.current.lock().iter().count(), 1);
    }

    #[test]
    fn test_handles_are_not_paths() {
        let registry = FileHandleRegistry::new();
        let picked = registry.register(PathBuf::from("/videos/a.mp4")).unwrap();
        assert!(!picked.handle.0.contains('/'));

        let forged = FileHandle::from("/videos/a.mp4".to_string());
        assert!(registry.resolve(&forged).is_none());
    }

    #[test]
    fn test_relative_paths_rejected() {
        let registry = FileHandleRegistry::new();
        assert!(registry.register(PathBuf::from("a.mp4")).is_err());
    }
}
