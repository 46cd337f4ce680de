//! Shared helpers for BlockScript integration tests

#![allow(dead_code)]

use blockscript_runtime::{BlockScript, ScriptArgs, ScriptValue};

pub use pretty_assertions::assert_eq;

/// Compile `source` with the system intrinsics installed
pub fn script(source: &str) -> BlockScript {
    let mut script = BlockScript::new().unwrap();
    if let Err(e) = script.compile(source) {
        panic!("compile failed: {:?}", e);
    }
    script
}

/// Compile `source` and call `name` with `args`
pub fn run<A: ScriptArgs, R: ScriptValue + std::fmt::Debug>(source: &str, name: &str, args: A) -> R {
    match script(source).call(name, args) {
        Ok(value) => value,
        Err(e) => panic!("call to '{}' failed: {}", name, e),
    }
}

/// Error codes produced by compiling `source`
pub fn error_codes(source: &str) -> Vec<String> {
    let mut script = BlockScript::new().unwrap();
    match script.compile(source) {
        Ok(()) => Vec::new(),
        Err(blockscript_runtime::RuntimeError::Compile(diags)) => {
            diags.into_iter().map(|d| d.code).collect()
        }
        Err(other) => panic!("unexpected error: {}", other),
    }
}
