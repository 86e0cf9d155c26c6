//! Filesystem layout helpers and atomic write operations
//!
//! Manages the `.stagehand/` directory: the runtime config and saved projects.
//! Every write goes through a temp file, fsync, and rename. Project files carry
//! a format version and a blake3 checksum of the project body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::RuntimeConfig;
use super::error::{StorageError, StorageResult};
use super::project::Project;
use crate::PROJECT_FORMAT;

/// On-disk envelope around a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Envelope format version
    pub format: u32,
    /// When the project was written
    pub saved_at: DateTime<Utc>,
    /// blake3 hex digest of the compact JSON encoding of `project`
    pub checksum: String,
    /// Project body
    pub project: serde_json::Value,
}

/// Storage manager for runtime persistence
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Get the projects directory path
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Get the file path of a named project
    pub fn project_path(&self, name: &str) -> PathBuf {
        self.projects_dir().join(format!("{name}.json"))
    }

    /// Write data atomically to a file
    ///
    /// Creates a temporary file, writes the data, syncs, then renames
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;

        // Sync parent directory
        if let Some(parent) = path.parent() {
            let dir = OpenOptions::new().read(true).open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Read a file
    pub fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        if !path.exists() {
            return Err(StorageError::PathNotFound(path.to_path_buf()));
        }
        Ok(fs::read(path)?)
    }

    /// Create a directory and all parent directories
    pub fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        Ok(fs::create_dir_all(path)?)
    }

    /// Names of saved projects, sorted
    pub fn list_projects(&self) -> StorageResult<Vec<String>> {
        let dir = self.projects_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Save a project under `name`
    pub fn save_project(&self, name: &str, project: &Project) -> StorageResult<PathBuf> {
        self.create_dir_all(&self.projects_dir())?;
        let path = self.project_path(name);
        let data = encode_project(project)?;
        self.write_atomic(&path, &data)?;
        tracing::info!(path = %path.display(), actors = project.actors.len(), "project saved");
        Ok(path)
    }

    /// Load a project saved under `name`
    pub fn load_project(&self, name: &str) -> StorageResult<Project> {
        self.read_project_file(&self.project_path(name))
    }

    /// Load and verify a project file at an arbitrary path
    pub fn read_project_file(&self, path: &Path) -> StorageResult<Project> {
        let data = self.read_file(path)?;
        decode_project(path, &data)
    }

    /// Load a project from either a saved envelope or a bare project export
    pub fn import_project(&self, path: &Path) -> StorageResult<Project> {
        let data = self.read_file(path)?;
        if serde_json::from_slice::<ProjectFile>(&data).is_ok() {
            return decode_project(path, &data);
        }
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Encode a project into its checksummed envelope
pub fn encode_project(project: &Project) -> StorageResult<Vec<u8>> {
    let body = serde_json::to_value(project)?;
    let file = ProjectFile {
        format: PROJECT_FORMAT,
        saved_at: Utc::now(),
        checksum: checksum(&body)?,
        project: body,
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Decode and verify a project envelope. `path` is only used in errors.
pub fn decode_project(path: &Path, data: &[u8]) -> StorageResult<Project> {
    let file: ProjectFile = serde_json::from_slice(data)?;
    if file.format != PROJECT_FORMAT {
        return Err(StorageError::UnsupportedFormat {
            found: file.format,
            expected: PROJECT_FORMAT,
        });
    }

    let found = checksum(&file.project)?;
    if found != file.checksum {
        tracing::warn!(path = %path.display(), "project checksum mismatch");
        return Err(StorageError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: file.checksum,
            found,
        });
    }

    Ok(serde_json::from_value(file.project)?)
}

fn checksum(body: &serde_json::Value) -> StorageResult<String> {
    let bytes = serde_json::to_vec(body)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Initialize storage directories for a new runtime
pub fn init_storage(root: &Path) -> StorageResult<()> {
    let storage = Storage::new(root.to_path_buf());
    storage.create_dir_all(root)?;
    storage.create_dir_all(&storage.projects_dir())?;
    Ok(())
}

/// Write runtime configuration
pub fn write_config(config: &RuntimeConfig) -> StorageResult<()> {
    let storage = Storage::new(config.root.clone());
    let json = serde_json::to_vec_pretty(config)?;
    storage.write_atomic(&storage.config_path(), &json)
}

/// Load runtime configuration
pub fn load_config(root: &Path) -> StorageResult<RuntimeConfig> {
    let storage = Storage::new(root.to_path_buf());
    let data = storage.read_file(&storage.config_path())?;
    Ok(serde_json::from_slice(&data)?)
}
