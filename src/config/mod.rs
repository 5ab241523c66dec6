//! Layered configuration for taskloom.
//!
//! Settings live in `config.kdl` files at two levels:
//!
//! - Project: `<root>/.taskloom/config.kdl`
//! - System: `~/.config/taskloom/config.kdl` (or `$TL_CONFIG_DIR/config.kdl`)
//!
//! Keys:
//! - `manifest-path` - Manifest file location
//! - `cache-dir` - Research cache directory
//! - `cache-ttl` - Research cache entry lifetime in minutes
//!
//! ## Precedence
//!
//! CLI flag > environment variable > project config > system config > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CACHE_DIR_ENV, CACHE_TTL_ENV, CONFIG_DIR_ENV, ConfigOverrides, MANIFEST_ENV, Resolved,
    ResolvedConfig, ValueSource, project_config_path, resolve_config, system_config_path,
};
pub use schema::{CONFIG_FILE_NAME, TaskloomConfig};
