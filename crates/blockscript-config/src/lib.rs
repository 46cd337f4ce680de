//! BlockScript Configuration System
//!
//! Settings for the BlockScript compiler and virtual machine:
//! - Script configuration (`blockscript.toml`)
//! - Discovery by walking up from a working directory
//! - Environment overrides for the VM limits
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. `blockscript.toml` (nearest ancestor directory)
//! 3. Environment variables (`BLOCKSCRIPT_*`)
//! 4. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use blockscript_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loaded = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! println!("max stack levels: {}", loaded.config.vm.max_stack_levels);
//! ```

pub mod loader;
pub mod script;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{ConfigLoader, LoadedConfig, CONFIG_FILE_NAME};
pub use script::{CompilerConfig, ScriptConfig, VmConfig};
