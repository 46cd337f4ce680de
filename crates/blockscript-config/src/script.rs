//! Script configuration (blockscript.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root of `blockscript.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub vm: VmConfig,
}

/// Compiler settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct CompilerConfig {
    /// Slots allocated per string pool page
    pub string_pool_slots_per_page: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            string_pool_slots_per_page: 128,
        }
    }
}

/// Virtual machine limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct VmConfig {
    /// RAM reserved up front when a state is created
    pub initial_ram_bytes: usize,

    /// Hard ceiling on RAM growth
    pub max_ram_bytes: usize,

    /// Maximum nested frame depth
    pub max_stack_levels: u32,

    /// Instructions one call may execute; 0 disables the budget
    pub max_steps: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            initial_ram_bytes: 4 * 1024,
            max_ram_bytes: 16 * 1024 * 1024,
            max_stack_levels: 256,
            max_steps: 50_000_000,
        }
    }
}

impl ScriptConfig {
    /// Load from a TOML file and validate
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde can't express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.compiler.string_pool_slots_per_page == 0 {
            return Err(invalid(
                "compiler.string_pool_slots_per_page",
                "must be at least 1",
            ));
        }

        let vm = &self.vm;
        // RAM addresses live in 32-bit registers
        if vm.max_ram_bytes == 0 || vm.max_ram_bytes > i32::MAX as usize {
            return Err(invalid(
                "vm.max_ram_bytes",
                &format!("must be between 1 and {}", i32::MAX),
            ));
        }
        if vm.initial_ram_bytes > vm.max_ram_bytes {
            return Err(invalid(
                "vm.initial_ram_bytes",
                &format!(
                    "{} exceeds vm.max_ram_bytes ({})",
                    vm.initial_ram_bytes, vm.max_ram_bytes
                ),
            ));
        }
        if vm.max_stack_levels == 0 {
            return Err(invalid("vm.max_stack_levels", "must be at least 1"));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
