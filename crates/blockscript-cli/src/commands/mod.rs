//! CLI command implementations

pub mod check;
pub mod disasm;
pub mod run;

use anyhow::{Context, Result};
use blockscript_config::{ConfigLoader, ScriptConfig};
use blockscript_runtime::{BlockScript, Diagnostic, RuntimeError, VmHost};
use std::fs;
use std::path::Path;

/// Read a source file
pub fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file: {}", file.display()))
}

/// Configuration from `--config`, or the nearest `blockscript.toml` above the script
pub fn load_config(file: &Path, explicit: Option<&Path>) -> Result<ScriptConfig> {
    let loader = ConfigLoader::new();
    let loaded = match explicit {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => {
            let dir = match file.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => std::env::current_dir()?,
            };
            loader.load_from_directory(&dir)?
        }
    };
    if let Some(root) = &loaded.config_root {
        tracing::debug!(root = %root.display(), "using blockscript.toml");
    }
    Ok(loaded.config)
}

/// Compile `source`, handing back the diagnostics on failure
///
/// Print hooks write to stdout.
pub fn compile(
    config: &ScriptConfig,
    source: &str,
    file: &Path,
) -> Result<std::result::Result<BlockScript, Vec<Diagnostic>>> {
    let host = VmHost::new()
        .with_print_string(|s| println!("{}", s))
        .with_print_int(|i| println!("{}", i))
        .with_print_float(|f| println!("{}", f));
    let mut script = BlockScript::with_config(config, host)?;

    match script.compile(source) {
        Ok(()) => Ok(Ok(script)),
        Err(RuntimeError::Compile(diagnostics)) => {
            let file = file.display().to_string();
            Ok(Err(diagnostics
                .into_iter()
                .map(|d| d.with_file(file.clone()))
                .collect()))
        }
        Err(other) => Err(other.into()),
    }
}

/// Print diagnostics to stderr
pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprint!("{}", diag.to_human_string());
    }
}
