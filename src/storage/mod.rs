//! Storage layer for the task manifest.
//!
//! The manifest is a single JSON document. [`ManifestStore`] owns the path
//! and a cached copy of the last manifest it read or wrote, keyed by the
//! file's modification time and length. Each process invocation creates its
//! own store; there is no process-wide state.
//!
//! ## Write discipline
//!
//! Every write goes to a temporary sibling file which is fsynced and then
//! renamed over the target. A reader therefore always sees either the
//! complete previous manifest or the complete new one. Concurrent writers
//! are not coordinated: the last rename wins.

use crate::models::{Manifest, TaskPatch};
use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Identity of the file contents a cached manifest was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Debug)]
struct CachedManifest {
    manifest: Manifest,
    stamp: FileStamp,
}

/// Result of [`ManifestStore::init`].
#[derive(Debug)]
pub struct InitOutcome {
    pub manifest: Manifest,
    /// False when a manifest already existed and was left alone
    pub created: bool,
}

/// Loads and persists the manifest file.
#[derive(Debug)]
pub struct ManifestStore {
    path: PathBuf,
    cached: Option<CachedManifest>,
}

impl ManifestStore {
    /// Create a store for the manifest at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    /// Create an empty manifest at `path` unless one already exists.
    pub fn init(
        path: impl Into<PathBuf>,
        project_name: &str,
        description: &str,
    ) -> Result<InitOutcome> {
        let mut store = Self::new(path);
        if store.exists() {
            let manifest = store.load(true)?;
            return Ok(InitOutcome {
                manifest,
                created: false,
            });
        }

        let mut manifest = Manifest::new(project_name, description);
        manifest.recompute_stats();
        store.write(&manifest)?;
        info!(path = %store.path.display(), project = project_name, "initialized manifest");
        Ok(InitOutcome {
            manifest,
            created: true,
        })
    }

    /// Path of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the manifest file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Return the manifest, re-reading the file only when it changed on disk
    /// or when `force_reload` is set.
    pub fn load(&mut self, force_reload: bool) -> Result<Manifest> {
        let stamp = self.stamp()?;

        if !force_reload {
            if let Some(cached) = &self.cached {
                if cached.stamp == stamp {
                    debug!(path = %self.path.display(), "manifest cache hit");
                    return Ok(cached.manifest.clone());
                }
            }
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        let manifest: Manifest =
            serde_json::from_str(&contents).map_err(|e| Error::Corrupted {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        manifest.validate().map_err(|reason| Error::Corrupted {
            path: self.path.clone(),
            reason,
        })?;

        debug!(
            path = %self.path.display(),
            tasks = manifest.tasks.len(),
            "loaded manifest"
        );
        self.cached = Some(CachedManifest {
            manifest: manifest.clone(),
            stamp,
        });
        Ok(manifest)
    }

    /// Persist the manifest atomically and refresh the cache.
    pub fn write(&mut self, manifest: &Manifest) -> Result<()> {
        let mut json = serde_json::to_string_pretty(manifest)?;
        json.push('\n');
        atomic_write(&self.path, json.as_bytes())?;

        self.cached = match self.stamp() {
            Ok(stamp) => Some(CachedManifest {
                manifest: manifest.clone(),
                stamp,
            }),
            Err(_) => None,
        };
        debug!(path = %self.path.display(), bytes = json.len(), "wrote manifest");
        Ok(())
    }

    /// Apply a patch to one task, recompute stats and persist.
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Manifest> {
        let mut manifest = self.load(true)?;
        let task = manifest
            .task_mut(id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        task.apply(patch);
        manifest.recompute_stats();
        self.write(&manifest)?;
        info!(task = id, status = ?patch.status, "updated task");
        Ok(manifest)
    }

    fn stamp(&self) -> Result<FileStamp> {
        let meta = fs::metadata(&self.path).map_err(|e| self.read_error(e))?;
        Ok(FileStamp {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }

    fn read_error(&self, err: std::io::Error) -> Error {
        if err.kind() == ErrorKind::NotFound {
            Error::NotInitialized {
                path: self.path.clone(),
            }
        } else {
            Error::Io(err)
        }
    }
}

/// Write `contents` to `path` through a temporary sibling file and a rename.
///
/// On failure the previous file at `path`, if any, is left untouched and the
/// temporary file is removed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tl-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
