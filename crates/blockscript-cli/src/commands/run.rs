//! Run command - compile a script and call one function

use super::{compile, load_config, print_diagnostics, read_source};
use anyhow::{anyhow, bail, Result};
use blockscript_runtime::{BlockScript, StringHandle};
use std::path::Path;

/// Call the zero-argument function `function` in `file`
///
/// Scalar, string and float vector results are printed. Other struct
/// results are computed but not shown.
pub fn run(file: &Path, function: &str, config: Option<&Path>) -> Result<()> {
    let source = read_source(file)?;
    let config = load_config(file, config)?;

    let mut script = match compile(&config, &source, file)? {
        Ok(script) => script,
        Err(diagnostics) => {
            print_diagnostics(&diagnostics);
            bail!("Compilation of {} failed", file.display());
        }
    };

    let return_type = script
        .return_type(function, &[])
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No function '{}()' in {}", function, file.display()))?;

    if let Some(output) = call_and_format(&mut script, function, &return_type)? {
        println!("{}", output);
    }
    Ok(())
}

fn call_and_format(script: &mut BlockScript, function: &str, return_type: &str) -> Result<Option<String>> {
    let output = match return_type {
        "void" => {
            script.call::<(), ()>(function, ())?;
            return Ok(None);
        }
        "int" => script.call::<(), i32>(function, ())?.to_string(),
        "float" => script.call::<(), f32>(function, ())?.to_string(),
        "bool" => script.call::<(), bool>(function, ())?.to_string(),
        "string" => {
            let handle = script.call::<(), StringHandle>(function, ())?;
            script
                .assembly()
                .and_then(|a| a.string(handle.0))
                .ok_or_else(|| anyhow!("Function '{}' returned an unknown string", function))?
                .to_string()
        }
        "float2" => lanes(&script.call::<(), [f32; 2]>(function, ())?),
        "float3" => lanes(&script.call::<(), [f32; 3]>(function, ())?),
        "float4" => lanes(&script.call::<(), [f32; 4]>(function, ())?),
        other => bail!("Cannot run '{}': results of type '{}' cannot be printed", function, other),
    };
    Ok(Some(output))
}

fn lanes(values: &[f32]) -> String {
    let parts = values.iter().map(f32::to_string).collect::<Vec<_>>();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes() {
        assert_eq!(lanes(&[1.0, 2.5, -3.0]), "(1, 2.5, -3)");
    }
}
