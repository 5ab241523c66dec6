//! Precedence resolution for taskloom settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`TL_MANIFEST`, `TL_CACHE_DIR`, `TL_CACHE_TTL`)
//! 3. Project config.kdl (`<root>/.taskloom/config.kdl`)
//! 4. System config.kdl (`~/.config/taskloom/config.kdl`)
//! 5. Built-in defaults
//!
//! Relative paths from any layer resolve against the project root.

use std::path::{Path, PathBuf};

use crate::config::schema::{CONFIG_FILE_NAME, TaskloomConfig};
use crate::research_cache::DEFAULT_TTL_MINUTES;
use crate::{Error, Result};

/// Environment variable overriding the manifest path.
pub const MANIFEST_ENV: &str = "TL_MANIFEST";
/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "TL_CACHE_DIR";
/// Environment variable overriding the cache TTL in minutes.
pub const CACHE_TTL_ENV: &str = "TL_CACHE_TTL";
/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "TL_CONFIG_DIR";

/// Per-project state directory under the project root.
pub const PROJECT_DIR: &str = ".taskloom";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project config.kdl
    Project,
    /// Value from the system config.kdl
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Project root everything else is relative to
    pub root: PathBuf,
    pub manifest_path: Resolved<PathBuf>,
    pub cache_dir: Resolved<PathBuf>,
    /// Cache entry lifetime in minutes
    pub cache_ttl: Resolved<u64>,
}

impl ResolvedConfig {
    /// Built-in defaults for a project rooted at `root`.
    pub fn defaults(root: &Path) -> Self {
        let project_dir = root.join(PROJECT_DIR);
        Self {
            root: root.to_path_buf(),
            manifest_path: Resolved::new(project_dir.join("manifest.json"), ValueSource::Default),
            cache_dir: Resolved::new(project_dir.join("research-cache"), ValueSource::Default),
            cache_ttl: Resolved::new(DEFAULT_TTL_MINUTES, ValueSource::Default),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path.value
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir.value
    }

    pub fn cache_ttl(&self) -> u64 {
        self.cache_ttl.value
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub manifest_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Option<u64>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_cache_ttl(mut self, minutes: u64) -> Self {
        self.cache_ttl = Some(minutes);
        self
    }
}

/// Location of the project-level config file.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(CONFIG_FILE_NAME)
}

/// Location of the system-level config file, if a config directory exists.
///
/// `TL_CONFIG_DIR` replaces the platform config directory.
pub fn system_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir).join(CONFIG_FILE_NAME));
    }
    dirs::config_dir().map(|dir| dir.join("taskloom").join(CONFIG_FILE_NAME))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_ttl(raw: &str, origin: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(Error::Config(format!(
            "{} must be a positive number of minutes, got '{}'",
            origin, raw
        ))),
    }
}

/// Resolve configuration with full precedence chain.
pub fn resolve_config(root: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let mut result = ResolvedConfig::defaults(root);
    let absolute = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

    let system_config = match system_config_path() {
        Some(path) => TaskloomConfig::read(&path)?,
        None => TaskloomConfig::new(),
    };
    let project_config = TaskloomConfig::read(&project_config_path(root))?;

    // Resolve manifest_path
    if let Some(ref path) = overrides.manifest_path {
        result.manifest_path = Resolved::new(absolute(path.clone()), ValueSource::CliFlag);
    } else if let Some(path) = env_value(MANIFEST_ENV) {
        result.manifest_path = Resolved::new(
            absolute(PathBuf::from(path)),
            ValueSource::EnvVar(MANIFEST_ENV.to_string()),
        );
    } else if let Some(ref path) = project_config.manifest_path {
        result.manifest_path = Resolved::new(absolute(PathBuf::from(path)), ValueSource::Project);
    } else if let Some(ref path) = system_config.manifest_path {
        result.manifest_path = Resolved::new(absolute(PathBuf::from(path)), ValueSource::System);
    }

    // Resolve cache_dir
    if let Some(ref dir) = overrides.cache_dir {
        result.cache_dir = Resolved::new(absolute(dir.clone()), ValueSource::CliFlag);
    } else if let Some(dir) = env_value(CACHE_DIR_ENV) {
        result.cache_dir = Resolved::new(
            absolute(PathBuf::from(dir)),
            ValueSource::EnvVar(CACHE_DIR_ENV.to_string()),
        );
    } else if let Some(ref dir) = project_config.cache_dir {
        result.cache_dir = Resolved::new(absolute(PathBuf::from(dir)), ValueSource::Project);
    } else if let Some(ref dir) = system_config.cache_dir {
        result.cache_dir = Resolved::new(absolute(PathBuf::from(dir)), ValueSource::System);
    }

    // Resolve cache_ttl
    if let Some(ttl) = overrides.cache_ttl {
        if ttl == 0 {
            return Err(Error::Config(
                "--cache-ttl must be a positive number of minutes, got '0'".to_string(),
            ));
        }
        result.cache_ttl = Resolved::new(ttl, ValueSource::CliFlag);
    } else if let Some(raw) = env_value(CACHE_TTL_ENV) {
        result.cache_ttl = Resolved::new(
            parse_ttl(&raw, CACHE_TTL_ENV)?,
            ValueSource::EnvVar(CACHE_TTL_ENV.to_string()),
        );
    } else if let Some(ttl) = project_config.cache_ttl {
        result.cache_ttl = Resolved::new(ttl, ValueSource::Project);
    } else if let Some(ttl) = system_config.cache_ttl {
        result.cache_ttl = Resolved::new(ttl, ValueSource::System);
    }

    Ok(result)
}
