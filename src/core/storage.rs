//! Project persistence over an opaque key-value store
//!
//! Stored values are JSON strings. Reading never fails hard at the
//! workspace level: missing or corrupt data degrades to a fresh default
//! project with a warning.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::project::{Project, ProjectId, Workspace};

pub const PROJECTS_KEY: &str = "projects";
pub const ACTIVE_PROJECT_KEY: &str = "active_project_id";

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Minimal string key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Atomic replace
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed persistence on top of a [`KeyValueStore`]
#[derive(Debug)]
pub struct Storage<S> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_projects(&self) -> Result<Vec<Project>, StorageError> {
        match self.store.get(PROJECTS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_projects(&self, projects: &[Project]) -> Result<(), StorageError> {
        let json = serde_json::to_string(projects)?;
        self.store.set(PROJECTS_KEY, &json)
    }

    pub fn load_active_project_id(&self) -> Result<Option<ProjectId>, StorageError> {
        match self.store.get(ACTIVE_PROJECT_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_active_project_id(&self, id: ProjectId) -> Result<(), StorageError> {
        let json = serde_json::to_string(&id)?;
        self.store.set(ACTIVE_PROJECT_KEY, &json)
    }

    /// Loads the workspace, degrading to defaults on any failure
    pub fn load_workspace(&self) -> Workspace {
        let projects = self.load_projects().unwrap_or_else(|e| {
            tracing::warn!("Failed to load projects, starting fresh: {}", e);
            Vec::new()
        });
        let active = self.load_active_project_id().unwrap_or_else(|e| {
            tracing::warn!("Failed to load active project id: {}", e);
            None
        });
        let workspace = Workspace::from_parts(projects, active);
        tracing::info!(
            "Loaded workspace with {} project(s)",
            workspace.projects().len()
        );
        workspace
    }

    pub fn save_workspace(&self, workspace: &Workspace) -> Result<(), StorageError> {
        self.save_projects(workspace.projects())?;
        self.save_active_project_id(workspace.active_id())
    }
}
