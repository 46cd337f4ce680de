//! Disasm command - print compiled assembly

use super::{compile, load_config, print_diagnostics, read_source};
use anyhow::{bail, Result};
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    let source = read_source(file)?;
    let config = load_config(file, None)?;

    match compile(&config, &source, file)? {
        Ok(script) => {
            if let Some(assembly) = script.assembly() {
                print!("{}", assembly.disassemble());
            }
            Ok(())
        }
        Err(diagnostics) => {
            print_diagnostics(&diagnostics);
            bail!("Compilation failed");
        }
    }
}
