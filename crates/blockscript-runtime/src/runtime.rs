//! Runtime facade
//!
//! `BlockScript` bundles a builder (with the system intrinsics installed),
//! the current assembly, one VM state and the VM. State persists across
//! calls; recompiling replaces the assembly.
//!
//! # Examples
//!
//! ```
//! use blockscript_runtime::BlockScript;
//!
//! let mut script = BlockScript::new().unwrap();
//! script
//!     .compile("square(x : float) : float { return x * x; }")
//!     .unwrap();
//!
//! let area: f32 = script.call("square", (3.0f32,)).unwrap();
//! assert_eq!(area, 9.0);
//! ```

use crate::assembly::Assembly;
use crate::builder::BlockScriptBuilder;
use crate::diagnostic::Diagnostic;
use crate::funcallback::{
    create_typed_intrinsic, execute_function, get_function_bind_point, FunBindPoint, IntrinsicError,
    InvokeError,
};
use crate::host::VmHost;
use crate::marshal::{ScriptArgs, ScriptValue};
use crate::stdlib::register_system_intrinsics;
use crate::vm::{BsVm, BsVmState};
use blockscript_config::ScriptConfig;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("compilation failed with {} error(s)", .0.len())]
    Compile(Vec<Diagnostic>),

    #[error(transparent)]
    Intrinsic(#[from] IntrinsicError),

    #[error("no script has been compiled")]
    NotCompiled,

    #[error("no function '{name}' takes ({signature})")]
    UnknownFunction { name: String, signature: String },

    #[error("function '{name}' returns '{declared}', not '{requested}'")]
    ReturnType {
        name: String,
        declared: String,
        requested: &'static str,
    },

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Compiler, assembly and VM in one place
pub struct BlockScript {
    builder: BlockScriptBuilder,
    assembly: Option<Arc<Assembly>>,
    state: BsVmState,
    vm: BsVm,
}

impl BlockScript {
    /// Default configuration, log-backed print hooks
    pub fn new() -> Result<Self, RuntimeError> {
        Self::with_config(&ScriptConfig::default(), VmHost::default())
    }

    pub fn with_config(config: &ScriptConfig, host: VmHost) -> Result<Self, RuntimeError> {
        let mut builder = BlockScriptBuilder::new(&config.compiler);
        register_system_intrinsics(&mut builder)?;
        Ok(Self {
            builder,
            assembly: None,
            state: BsVmState::new(&config.vm),
            vm: BsVm::new(host),
        })
    }

    /// For registering intrinsics through the raw ABI
    pub fn builder_mut(&mut self) -> &mut BlockScriptBuilder {
        &mut self.builder
    }

    pub fn builder(&self) -> &BlockScriptBuilder {
        &self.builder
    }

    /// Register a native function; visible to the next `compile`
    pub fn register_fn<A, R, F>(&mut self, name: &str, arg_names: &[&str], f: F) -> Result<(), RuntimeError>
    where
        A: ScriptArgs,
        R: ScriptValue,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        create_typed_intrinsic(&mut self.builder, name, arg_names, false, f)?;
        Ok(())
    }

    /// Compile `source`, replacing the current assembly on success
    pub fn compile(&mut self, source: &str) -> Result<(), RuntimeError> {
        let assembly = self.builder.build(source).map_err(RuntimeError::Compile)?;
        self.assembly = Some(Arc::new(assembly));
        Ok(())
    }

    pub fn assembly(&self) -> Option<&Arc<Assembly>> {
        self.assembly.as_ref()
    }

    pub fn state(&self) -> &BsVmState {
        &self.state
    }

    pub fn bind_point(&self, name: &str, arg_types: &[&str]) -> FunBindPoint {
        match &self.assembly {
            Some(assembly) => get_function_bind_point(&self.builder, assembly, name, arg_types),
            None => FunBindPoint::INVALID,
        }
    }

    /// Declared return type of the overload taking `arg_types`
    pub fn return_type(&self, name: &str, arg_types: &[&str]) -> Option<&str> {
        let assembly = self.assembly.as_ref()?;
        let index = self.bind_point(name, arg_types).index()?;
        let entry = assembly.fun_map().get(index)?;
        let dec = assembly.fun_dec(entry.fun)?;
        Some(assembly.module().types().name_of(dec.return_type))
    }

    /// Call a function by name, resolving the overload from the argument types
    pub fn call<A: ScriptArgs, R: ScriptValue>(&mut self, name: &str, args: A) -> Result<R, RuntimeError> {
        let assembly = self.assembly.clone().ok_or(RuntimeError::NotCompiled)?;
        let arg_types = A::type_names();
        let bind_point = get_function_bind_point(&self.builder, &assembly, name, &arg_types);
        let unknown = || RuntimeError::UnknownFunction {
            name: name.to_string(),
            signature: arg_types.join(", "),
        };
        let entry = bind_point
            .index()
            .and_then(|i| assembly.fun_map().get(i))
            .ok_or_else(unknown)?;

        let declared = assembly
            .fun_dec(entry.fun)
            .map(|dec| assembly.module().types().name_of(dec.return_type))
            .unwrap_or_default();
        if declared != R::TYPE_NAME {
            return Err(RuntimeError::ReturnType {
                name: name.to_string(),
                declared: declared.to_string(),
                requested: R::TYPE_NAME,
            });
        }

        let input = args.encode_args();
        let mut output = vec![0u8; R::BYTE_SIZE];
        execute_function(bind_point, &assembly, &mut self.state, &self.vm, &input, &mut output)?;
        Ok(R::decode(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmError;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_call_before_compile() {
        let mut script = BlockScript::new().unwrap();
        assert!(matches!(
            script.call::<(), i32>("main", ()),
            Err(RuntimeError::NotCompiled)
        ));
    }

    #[test]
    fn test_return_type_checked() {
        let mut script = BlockScript::new().unwrap();
        script.compile("one() : int { return 1; }").unwrap();
        assert!(matches!(
            script.call::<(), f32>("one", ()),
            Err(RuntimeError::ReturnType { .. })
        ));
        assert_eq!(script.call::<(), i32>("one", ()).unwrap(), 1);
    }

    #[test]
    fn test_print_hooks_receive_output() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let host = VmHost::new()
            .with_print_string({
                let sink = Arc::clone(&sink);
                move |s| sink.lock().unwrap().push(s.to_string())
            })
            .with_print_int(move |i| sink.lock().unwrap().push(i.to_string()));
        let mut script = BlockScript::with_config(&ScriptConfig::default(), host).unwrap();
        script
            .compile("main() : void { printString(\"hi\"); printInt(40 + 2); }")
            .unwrap();
        script.call::<(), ()>("main", ()).unwrap();
        assert_eq!(*lines.lock().unwrap(), vec!["hi".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_fault_resets_state() {
        let mut script = BlockScript::new().unwrap();
        script
            .compile("div(a : int, b : int) : int { return a / b; }")
            .unwrap();
        let err = script.call::<(i32, i32), i32>("div", (1, 0)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Invoke(InvokeError::Vm(VmError::DivisionByZero { .. }))
        ));
        assert_eq!(script.state().stack_levels(), 0);
        assert_eq!(script.call::<(i32, i32), i32>("div", (9, 3)).unwrap(), 3);
    }
}
