//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`TaskloomConfig`] struct mirroring the file
//! - Parsing from KDL documents
//! - Validation

use kdl::KdlDocument;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::{Error, Result};

/// Config file name, both at project and system level.
pub const CONFIG_FILE_NAME: &str = "config.kdl";

/// Settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// manifest-path ".taskloom/manifest.json"
/// cache-dir ".taskloom/research-cache"
/// cache-ttl 1440  // minutes
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskloomConfig {
    /// Manifest location, relative paths resolve against the project root
    pub manifest_path: Option<String>,

    /// Research cache directory
    pub cache_dir: Option<String>,

    /// Research cache entry lifetime in minutes
    pub cache_ttl: Option<u64>,
}

impl TaskloomConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.cache_ttl == Some(0) {
            return Err("cache-ttl must be a positive number of minutes".to_string());
        }
        for (key, value) in [
            ("manifest-path", &self.manifest_path),
            ("cache-dir", &self.cache_dir),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(format!("{} must not be empty", key));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored. A known node with a value of the wrong
    /// type is an error.
    pub fn from_kdl(doc: &KdlDocument) -> std::result::Result<Self, String> {
        let mut config = Self::new();

        config.manifest_path = string_value(doc, "manifest-path")?;
        config.cache_dir = string_value(doc, "cache-dir")?;

        if let Some(node) = doc.get("cache-ttl") {
            let value = node
                .entries()
                .first()
                .and_then(|entry| entry.value().as_integer())
                .ok_or_else(|| "cache-ttl must be an integer".to_string())?;
            let minutes = u64::try_from(value)
                .map_err(|_| format!("cache-ttl must be positive, got {}", value))?;
            config.cache_ttl = Some(minutes);
        }

        Ok(config)
    }

    /// Read and validate a config file. A missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let config_err = |reason: String| Error::Config(format!("{}: {}", path.display(), reason));

        let doc = contents
            .parse::<KdlDocument>()
            .map_err(|e| config_err(e.to_string()))?;
        let config = Self::from_kdl(&doc).map_err(config_err)?;
        config.validate().map_err(config_err)?;
        Ok(config)
    }

}

fn string_value(doc: &KdlDocument, key: &str) -> std::result::Result<Option<String>, String> {
    let Some(node) = doc.get(key) else {
        return Ok(None);
    };
    node.entries()
        .first()
        .and_then(|entry| entry.value().as_string())
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| format!("{} must be a string", key))
}
