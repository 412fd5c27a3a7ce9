//! Key-value storage for project records.

use crate::{Project, ProjectError, decode_project, encode_project};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_SUFFIX: &str = ".stemtap.json";

/// Blob store holding encoded projects by key.
///
/// Durability is whatever the implementation provides.
pub trait ProjectStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError>;
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), ProjectError>;
    fn delete(&mut self, key: &str) -> Result<bool, ProjectError>;
    fn keys(&self) -> Result<Vec<String>, ProjectError>;
}

pub fn save_to_store(
    store: &mut dyn ProjectStore,
    key: &str,
    project: &Project,
) -> Result<(), ProjectError> {
    let bytes = encode_project(project)?;
    store.put(key, &bytes)
}

pub fn load_from_store(store: &dyn ProjectStore, key: &str) -> Result<Project, ProjectError> {
    let bytes = store
        .get(key)?
        .ok_or_else(|| ProjectError::NotFound(key.to_string()))?;
    decode_project(&bytes)
}

/// In-memory store, mostly for tests and scratch sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), ProjectError> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, ProjectError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, ProjectError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Store that keeps one `<key>.stemtap.json` file per project in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ProjectError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(ProjectError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}{FILE_SUFFIX}")))
    }
}

impl ProjectStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProjectError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), ProjectError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)?;

        // Atomic replace.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, ProjectError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, ProjectError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(FILE_SUFFIX)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
