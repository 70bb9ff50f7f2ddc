use crate::error::{PulseError, Result};
use crate::types::ContextDocument;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the persisted context document inside the data directory.
pub const CONTEXT_FILE_NAME: &str = "api_context.json";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "context_data";

/// Durable storage for the context document.
pub trait SnapshotStore: Send + Sync {
    /// Read the stored document. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<ContextDocument>>;

    /// Replace the stored document.
    fn save(&self, doc: &ContextDocument) -> Result<()>;

    /// Move an unreadable snapshot out of the way so the next save does not
    /// destroy it.
    fn quarantine(&self) -> Result<()> {
        Ok(())
    }
}

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `<data_dir>/api_context.json`
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join(CONTEXT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CONTEXT_FILE_NAME.into());
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<ContextDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let doc = serde_json::from_slice(&bytes)?;
        Ok(Some(doc))
    }

    fn save(&self, doc: &ContextDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = self.sibling(".tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PulseError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn quarantine(&self) -> Result<()> {
        if self.path.exists() {
            fs::rename(&self.path, self.sibling(".corrupt"))?;
        }
        Ok(())
    }
}

/// Keeps the last saved document in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    saved: Mutex<Option<ContextDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store as if `doc` had been saved by an earlier run.
    pub fn with_document(doc: ContextDocument) -> Self {
        Self {
            saved: Mutex::new(Some(doc)),
        }
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self) -> Result<Option<ContextDocument>> {
        Ok(self
            .saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, doc: &ContextDocument) -> Result<()> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(doc.clone());
        Ok(())
    }
}
