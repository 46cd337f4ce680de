//! Configuration Loader
//!
//! Finds `blockscript.toml` and applies environment overrides on top of it.

use crate::script::ScriptConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name searched for by [`ConfigLoader::load_from_directory`]
pub const CONFIG_FILE_NAME: &str = "blockscript.toml";

const ENV_MAX_RAM_BYTES: &str = "BLOCKSCRIPT_MAX_RAM_BYTES";
const ENV_MAX_STACK_LEVELS: &str = "BLOCKSCRIPT_MAX_STACK_LEVELS";
const ENV_MAX_STEPS: &str = "BLOCKSCRIPT_MAX_STEPS";

/// Configuration loader
///
/// Precedence, lowest first: defaults, `blockscript.toml`,
/// `BLOCKSCRIPT_*` environment variables. CLI flags are applied by the caller.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    skip_env: bool,
}

/// Loaded configuration plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ScriptConfig,

    /// Directory holding the `blockscript.toml` that was used, if any
    pub config_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { skip_env: false }
    }

    /// Ignore `BLOCKSCRIPT_*` environment variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Walk up from `start_dir` to the nearest `blockscript.toml`
    ///
    /// Falls back to defaults when no file exists up to the filesystem root.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<LoadedConfig> {
        let mut current = start_dir.to_path_buf();

        let (config_root, config) = loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                let config = ScriptConfig::load_from_file(&config_path)?;
                break (Some(current), config);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break (None, ScriptConfig::default()),
            }
        };

        Ok(LoadedConfig {
            config: self.apply_env_overrides(config)?,
            config_root,
        })
    }

    /// Load a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<LoadedConfig> {
        let config = ScriptConfig::load_from_file(config_path)?;

        Ok(LoadedConfig {
            config: self.apply_env_overrides(config)?,
            config_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    fn apply_env_overrides(&self, mut config: ScriptConfig) -> ConfigResult<ScriptConfig> {
        if self.skip_env {
            return Ok(config);
        }

        if let Some(value) = env_number(ENV_MAX_RAM_BYTES)? {
            config.vm.max_ram_bytes = value;
            if config.vm.initial_ram_bytes > value {
                config.vm.initial_ram_bytes = value;
            }
        }
        if let Some(value) = env_number(ENV_MAX_STACK_LEVELS)? {
            config.vm.max_stack_levels = value;
        }
        if let Some(value) = env_number(ENV_MAX_STEPS)? {
            config.vm.max_steps = value;
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("'{}' is not a valid number", raw),
            }),
        Err(_) => Ok(None),
    }
}

impl LoadedConfig {
    /// Whether a `blockscript.toml` was found
    pub fn has_file(&self) -> bool {
        self.config_root.is_some()
    }
}
