// --------------------------------------------------
// Persistence backends for the task collection.
//
// A backend is a key -> task list store:
// - load never fails; missing or unreadable data reads as empty
// - save overwrites the whole list for the key
// -------------------------------------------------

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::Task;

pub const DEFAULT_DATA_DIR: &str = "data";

pub trait TaskBackend: Send + Sync {
    // Tasks saved under `key`, in insertion order.
    fn load(&self, key: &str) -> Vec<Task>;

    // Replace everything saved under `key`.
    fn save(&self, key: &str, tasks: &[Task]) -> Result<(), StoreError>;
}

fn parse_tasks(key: &str, text: &str) -> Vec<Task> {
    match serde_json::from_str(text) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(key, error = %e, "stored tasks are unreadable, starting empty");
            Vec::new()
        }
    }
}

// One pretty-printed JSON file per key inside a data directory
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn read_text(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl TaskBackend for JsonFileBackend {
    fn load(&self, key: &str) -> Vec<Task> {
        let path = self.path_for(key);
        match read_text(&path) {
            Ok(Some(text)) => parse_tasks(key, &text),
            Ok(None) => {
                debug!(path = %path.display(), "no saved tasks yet");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read saved tasks");
                Vec::new()
            }
        }
    }

    // Write to a temp file first, then rename over the old one
    fn save(&self, key: &str, tasks: &[Task]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(tasks)?;

        fs::create_dir_all(&self.dir)?;
        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, &path)?;
        debug!(path = %path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }
}

// In-memory backend.
//
// Keeps the serialized text rather than the tasks themselves, so everything
// still goes through the same JSON encoding as the file backend. Clones share
// the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // Seed a key with arbitrary text, e.g. corrupt data
    pub fn with_raw(self, key: &str, text: &str) -> Self {
        self.entries.lock().insert(key.to_string(), text.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl TaskBackend for MemoryBackend {
    fn load(&self, key: &str) -> Vec<Task> {
        match self.raw(key) {
            Some(text) => parse_tasks(key, &text),
            None => Vec::new(),
        }
    }

    fn save(&self, key: &str, tasks: &[Task]) -> Result<(), StoreError> {
        let text = serde_json::to_string(tasks)?;
        self.entries.lock().insert(key.to_string(), text);
        Ok(())
    }
}
