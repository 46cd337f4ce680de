//! Check command - compile without running

use super::{compile, load_config, print_diagnostics, read_source};
use anyhow::{bail, Result};
use blockscript_runtime::{Diagnostic, DIAG_VERSION};
use std::path::Path;

/// Compile `file` and report diagnostics
///
/// With `json`, stdout carries one JSON document whether or not the script
/// compiles.
pub fn run(file: &Path, json: bool) -> Result<()> {
    let source = read_source(file)?;
    let config = load_config(file, None)?;

    let diagnostics = match compile(&config, &source, file)? {
        Ok(_) => Vec::new(),
        Err(diagnostics) => diagnostics,
    };

    if json {
        println!("{}", to_json(file, &diagnostics)?);
    } else if diagnostics.is_empty() {
        println!("{}: No errors found", file.display());
    } else {
        print_diagnostics(&diagnostics);
    }

    if !diagnostics.is_empty() {
        bail!("{} error(s) in {}", diagnostics.len(), file.display());
    }
    Ok(())
}

fn to_json(file: &Path, diagnostics: &[Diagnostic]) -> Result<String> {
    let report = serde_json::json!({
        "diag_version": DIAG_VERSION,
        "file": file.display().to_string(),
        "ok": diagnostics.is_empty(),
        "diagnostics": diagnostics,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_check_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "main() : int {{ return 1; }}").unwrap();
        assert!(run(temp_file.path(), false).is_ok());
    }

    #[test]
    fn test_check_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "main() : int {{ return 1.0; }}").unwrap();
        assert!(run(temp_file.path(), false).is_err());
    }

    #[test]
    fn test_json_report() {
        let diagnostics = vec![Diagnostic::error_with_code(
            "BS2003",
            "Unknown variable 'x'",
            blockscript_runtime::Span::new(0, 1),
        )];
        let json = to_json(Path::new("a.bs"), &diagnostics).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["diagnostics"][0]["code"], "BS2003");
    }

    #[test]
    fn test_check_missing_file() {
        assert!(run(Path::new("nonexistent.bs"), false).is_err());
    }
}
