//! Native call ABI
//!
//! Three entry points connect host code to the VM:
//! - [`create_intrinsic_function`] declares a native callback in the builder
//! - [`get_function_bind_point`] resolves a name and signature to a bind point
//! - [`execute_function`] runs a bound function with flat input/output buffers
//!
//! # Examples
//!
//! ```rust
//! use blockscript_runtime::funcallback::{
//!     create_intrinsic_function, execute_function, get_function_bind_point,
//! };
//! use blockscript_runtime::{BlockScriptBuilder, BsVm, BsVmState};
//!
//! let mut builder = BlockScriptBuilder::default();
//! create_intrinsic_function(
//!     &mut builder,
//!     "add",
//!     &["int", "int"],
//!     &["a", "b"],
//!     "int",
//!     |ctx| {
//!         let (a, b): (i32, i32) = ctx.args()?;
//!         ctx.set_return(a + b)
//!     },
//!     false,
//! )
//! .unwrap();
//!
//! let assembly = builder.build("").unwrap();
//! let bind_point = get_function_bind_point(&builder, &assembly, "add", &["int", "int"]);
//!
//! let mut output = [0u8; 4];
//! let input = [2i32.to_le_bytes(), 3i32.to_le_bytes()].concat();
//! let (vm, mut state) = (BsVm::default(), BsVmState::default());
//! execute_function(bind_point, &assembly, &mut state, &vm, &input, &mut output).unwrap();
//! assert_eq!(i32::from_le_bytes(output), 5);
//! ```

use crate::assembly::{Assembly, Reg};
use crate::builder::{ArgDec, BlockScriptBuilder, DeclareError};
use crate::host::VmHost;
use crate::log::LogTag;
use crate::marshal::{ScriptArgs, ScriptValue, StringHandle};
use crate::span::Span;
use crate::string_pool::{StringPool, StringPoolError};
use crate::type_table::{TypeId, CANON_REGISTER_BYTESIZE};
use crate::vm::{BsVm, BsVmState, VmError};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Native implementation of an intrinsic
pub type FunCallback =
    Arc<dyn Fn(&mut FunCallbackContext<'_>) -> Result<(), NativeError> + Send + Sync>;

/// Failure reported by a native callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    #[error("argument buffer holds {found} bytes, callback expects {expected}")]
    InputSize { expected: usize, found: usize },

    #[error("return slot holds {found} bytes, callback writes {expected}")]
    OutputSize { expected: usize, found: usize },

    #[error("unknown string handle {0}")]
    UnknownString(u32),

    #[error("{0}")]
    Failed(String),
}

impl NativeError {
    pub fn failed(message: impl Into<String>) -> Self {
        NativeError::Failed(message.into())
    }
}

/// What a native callback sees of the call
pub struct FunCallbackContext<'a> {
    input: &'a [u8],
    output: &'a mut [u8],
    strings: &'a [String],
    host: &'a VmHost,
}

impl<'a> FunCallbackContext<'a> {
    pub(crate) fn new(
        input: &'a [u8],
        output: &'a mut [u8],
        strings: &'a [String],
        host: &'a VmHost,
    ) -> Self {
        Self {
            input,
            output,
            strings,
            host,
        }
    }

    /// Raw packed arguments
    pub fn input(&self) -> &[u8] {
        self.input
    }

    /// Raw return slot; empty for `void`
    pub fn output(&mut self) -> &mut [u8] {
        self.output
    }

    /// Decode the arguments as a tuple
    pub fn args<A: ScriptArgs>(&self) -> Result<A, NativeError> {
        if A::byte_size() != self.input.len() {
            return Err(NativeError::InputSize {
                expected: A::byte_size(),
                found: self.input.len(),
            });
        }
        Ok(A::decode_args(self.input))
    }

    pub fn set_return<R: ScriptValue>(&mut self, value: R) -> Result<(), NativeError> {
        if R::BYTE_SIZE != self.output.len() {
            return Err(NativeError::OutputSize {
                expected: R::BYTE_SIZE,
                found: self.output.len(),
            });
        }
        value.encode(self.output);
        Ok(())
    }

    /// Resolve a `string` argument
    pub fn string(&self, handle: StringHandle) -> Result<&'a str, NativeError> {
        self.strings
            .get(handle.0 as usize)
            .map(String::as_str)
            .ok_or(NativeError::UnknownString(handle.0))
    }

    pub fn host(&self) -> &'a VmHost {
        self.host
    }
}

/// Ordinal of a function table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunBindPoint(pub i32);

impl FunBindPoint {
    pub const INVALID: FunBindPoint = FunBindPoint(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for FunBindPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrinsicError {
    #[error("function '{function}' lists {types} argument types but {names} argument names")]
    ArgCountMismatch {
        function: String,
        types: usize,
        names: usize,
    },

    #[error(transparent)]
    NameTooLong(#[from] StringPoolError),

    #[error("cannot find type '{type_name}' for argument '{arg}' of function '{function}'")]
    UnknownArgumentType {
        function: String,
        arg: String,
        type_name: String,
    },

    #[error("cannot find return type '{type_name}' of function '{function}'")]
    UnknownReturnType { function: String, type_name: String },

    #[error(transparent)]
    Declaration(#[from] DeclareError),
}

/// Declare a native function in the builder's arena
///
/// The declaration takes effect for every later `build`. Nothing but pooled
/// strings survives a failed registration. Registering a signature that
/// already exists succeeds; lookups keep returning the first one.
pub fn create_intrinsic_function<F>(
    builder: &mut BlockScriptBuilder,
    name: &str,
    arg_types: &[&str],
    arg_names: &[&str],
    return_type: &str,
    callback: F,
    is_method: bool,
) -> Result<(), IntrinsicError>
where
    F: Fn(&mut FunCallbackContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
{
    let result = declare_intrinsic(
        builder,
        name,
        arg_types,
        arg_names,
        return_type,
        Arc::new(callback),
        is_method,
    );
    if let Err(e) = &result {
        tracing::error!(tag = %LogTag::Error, function = name, error = %e, "intrinsic registration failed");
    }
    result
}

fn declare_intrinsic(
    builder: &mut BlockScriptBuilder,
    name: &str,
    arg_types: &[&str],
    arg_names: &[&str],
    return_type: &str,
    callback: FunCallback,
    is_method: bool,
) -> Result<(), IntrinsicError> {
    if arg_types.len() != arg_names.len() {
        return Err(IntrinsicError::ArgCountMismatch {
            function: name.to_string(),
            types: arg_types.len(),
            names: arg_names.len(),
        });
    }

    for text in arg_types.iter().chain(arg_names).chain([&return_type, &name]) {
        StringPool::test_string_length(text)?;
    }

    let arena = builder.arena_mut();
    let mut types = Vec::with_capacity(arg_types.len());
    for (type_name, arg) in arg_types.iter().zip(arg_names) {
        let ty = arena.types().type_by_name(type_name).ok_or_else(|| {
            IntrinsicError::UnknownArgumentType {
                function: name.to_string(),
                arg: arg.to_string(),
                type_name: type_name.to_string(),
            }
        })?;
        types.push(ty);
    }
    let return_id = arena.types().type_by_name(return_type).ok_or_else(|| {
        IntrinsicError::UnknownReturnType {
            function: name.to_string(),
            type_name: return_type.to_string(),
        }
    })?;

    if let Some(existing) = arena.find_signature(name, &types) {
        tracing::warn!(
            tag = %LogTag::Warn,
            function = name,
            first = existing.index(),
            "duplicate intrinsic signature; lookups resolve to the first declaration"
        );
    }

    let pooled_name = arena.strings.allocate(name)?;
    let mut args = Vec::with_capacity(types.len());
    for (arg, ty) in arg_names.iter().zip(types) {
        args.push(ArgDec {
            name: arena.strings.allocate(arg)?,
            ty,
        });
    }

    let fun = arena.declare_function(pooled_name, args, return_id, is_method, Span::dummy())?;
    if let Some(dec) = arena.fun_decs.get_mut(fun.index()) {
        dec.intrinsic = Some(callback);
    }
    tracing::trace!(tag = %LogTag::Info, function = name, bind = fun.index(), "intrinsic declared");
    Ok(())
}

/// Find the first function table entry named `name` taking exactly `arg_types`
///
/// Returns [`FunBindPoint::INVALID`] when nothing matches, or when a
/// same-named entry is found but one of the requested types doesn't exist.
/// Type names resolve against the assembly's own arena, so an older assembly
/// keeps answering correctly after the builder has compiled again.
pub fn get_function_bind_point(
    _builder: &BlockScriptBuilder,
    assembly: &Assembly,
    name: &str,
    arg_types: &[&str],
) -> FunBindPoint {
    let module = assembly.module();
    let mut requested: Option<Vec<TypeId>> = None;

    for (index, entry) in assembly.fun_map().iter().enumerate() {
        let Some(dec) = module.fun_dec(entry.fun) else {
            continue;
        };
        if module.fun_name(dec) != name {
            continue;
        }

        if requested.is_none() {
            let resolved: Option<Vec<TypeId>> =
                arg_types.iter().map(|t| module.types().type_by_name(t)).collect();
            match resolved {
                Some(types) => requested = Some(types),
                None => return FunBindPoint::INVALID,
            }
        }
        let Some(types) = &requested else {
            return FunBindPoint::INVALID;
        };

        if dec.args.len() == types.len() && dec.args.iter().zip(types).all(|(a, t)| a.ty == *t) {
            return FunBindPoint(index as i32);
        }
    }
    FunBindPoint::INVALID
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    #[error("invalid bind point {0}")]
    InvalidBindPoint(FunBindPoint),

    #[error("VM state is busy with {levels} open frames")]
    Busy { levels: u32 },

    #[error("function '{function}' returns {expected} bytes but the output buffer holds {found}")]
    OutputSize {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("function '{function}' takes {expected} bytes of arguments but the input buffer holds {found}")]
    InputSize {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Run the function at `bind_point` to completion
///
/// `input` must hold the packed arguments and `output` must be exactly as
/// large as the return type. Contract violations are reported before
/// anything is touched. A VM fault resets `state` to idle.
pub fn execute_function(
    bind_point: FunBindPoint,
    assembly: &Assembly,
    state: &mut BsVmState,
    vm: &BsVm,
    input: &[u8],
    output: &mut [u8],
) -> Result<(), InvokeError> {
    let entry = bind_point
        .index()
        .and_then(|i| assembly.fun_map().get(i))
        .ok_or(InvokeError::InvalidBindPoint(bind_point))?;
    let dec = assembly
        .fun_dec(entry.fun)
        .ok_or(InvokeError::InvalidBindPoint(bind_point))?;

    if state.stack_levels() != 0 {
        return Err(InvokeError::Busy {
            levels: state.stack_levels(),
        });
    }

    let function = assembly.fun_name(entry.fun);
    let out_size = assembly.module().types().size_of(dec.return_type);
    if output.len() != out_size as usize {
        return Err(InvokeError::OutputSize {
            function: function.to_string(),
            expected: out_size as usize,
            found: output.len(),
        });
    }
    let in_size = dec.desc.input_args_byte_size;
    if input.len() != in_size as usize {
        return Err(InvokeError::InputSize {
            function: function.to_string(),
            expected: in_size as usize,
            found: input.len(),
        });
    }

    tracing::trace!(tag = %LogTag::Vm, function, bind = %bind_point, "execute");

    let call = Call {
        block: entry.block,
        frame: dec.frame,
        out_size,
    };
    call.run(assembly, state, vm, input, output).map_err(|e| {
        tracing::error!(tag = %LogTag::Vm, function, error = %e, "call aborted");
        state.reset();
        InvokeError::Vm(e)
    })
}

struct Call {
    block: u32,
    frame: crate::builder::StackFrameInfo,
    out_size: u32,
}

impl Call {
    fn run(
        &self,
        assembly: &Assembly,
        state: &mut BsVmState,
        vm: &BsVm,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), VmError> {
        let saved_ip = state.reg(Reg::Ip);
        let wide = self.out_size > CANON_REGISTER_BYTESIZE;

        if wide {
            let slot = state.esp();
            state.grow(self.out_size)?;
            state.set_reg(Reg::Ret, slot);
        }

        state.push_frame(self.frame)?;
        state.set_reg(Reg::B, self.block);
        state.set_reg(Reg::Ip, 0);
        state.write_bytes(state.sbp(), input)?;
        state.begin_call();

        while state.stack_levels() > 0 {
            vm.step_execution(assembly, state)?;
        }

        if wide {
            let slot = state.reg(Reg::Ret);
            output.copy_from_slice(state.read_bytes(slot, self.out_size)?);
            state.shrink(self.out_size)?;
        } else if !output.is_empty() {
            let mut word = [0u8; 4];
            LittleEndian::write_u32(&mut word, state.reg(Reg::Ret));
            output.copy_from_slice(&word[..output.len()]);
        }

        state.set_reg(Reg::Ip, saved_ip);
        Ok(())
    }
}

/// Typed front end for [`create_intrinsic_function`]
///
/// Signature type names come from the Rust types, so a plain closure over
/// decoded values is enough:
///
/// ```rust
/// use blockscript_runtime::funcallback::create_typed_intrinsic;
/// use blockscript_runtime::BlockScriptBuilder;
///
/// let mut builder = BlockScriptBuilder::default();
/// create_typed_intrinsic(&mut builder, "twice", &["x"], false, |(x,): (f32,)| x * 2.0).unwrap();
/// ```
pub fn create_typed_intrinsic<A, R, F>(
    builder: &mut BlockScriptBuilder,
    name: &str,
    arg_names: &[&str],
    is_method: bool,
    f: F,
) -> Result<(), IntrinsicError>
where
    A: ScriptArgs,
    R: ScriptValue,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    let arg_types = A::type_names();
    create_intrinsic_function(
        builder,
        name,
        &arg_types,
        arg_names,
        R::TYPE_NAME,
        move |ctx| {
            let args = ctx.args::<A>()?;
            ctx.set_return(f(args))
        },
        is_method,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn add_builder() -> BlockScriptBuilder {
        let mut builder = BlockScriptBuilder::default();
        create_typed_intrinsic(&mut builder, "add", &["a", "b"], false, |(a, b): (i32, i32)| {
            a.wrapping_add(b)
        })
        .unwrap();
        builder
    }

    #[test]
    fn test_context_checks_buffer_sizes() {
        let input = 7i32.to_le_bytes();
        let mut output = [0u8; 4];
        let host = VmHost::default();
        let mut ctx = FunCallbackContext::new(&input, &mut output, &[], &host);
        assert_eq!(
            ctx.args::<(i32, i32)>(),
            Err(NativeError::InputSize {
                expected: 8,
                found: 4
            })
        );
        assert_eq!(ctx.args::<(i32,)>(), Ok((7,)));
        assert_eq!(
            ctx.set_return([1.0f32, 2.0]),
            Err(NativeError::OutputSize {
                expected: 8,
                found: 4
            })
        );
        assert!(ctx.set_return(true).is_ok());
        assert_eq!(ctx.string(StringHandle(0)), Err(NativeError::UnknownString(0)));
        assert_eq!(output, [1, 0, 0, 0]);
    }

    #[test]
    fn test_argument_name_count_must_match() {
        let mut builder = BlockScriptBuilder::default();
        let result = create_intrinsic_function(&mut builder, "f", &["int"], &[], "void", |_| Ok(()), false);
        assert!(matches!(result, Err(IntrinsicError::ArgCountMismatch { .. })));
    }

    #[test]
    fn test_unknown_request_type_is_invalid() {
        let mut builder = add_builder();
        let assembly = builder.build("").unwrap();
        assert_eq!(
            get_function_bind_point(&builder, &assembly, "add", &["int", "nope"]),
            FunBindPoint::INVALID
        );
        assert_eq!(
            get_function_bind_point(&builder, &assembly, "missing", &["nope"]),
            FunBindPoint::INVALID
        );
    }

    #[test]
    fn test_invalid_bind_point_rejected() {
        let mut builder = add_builder();
        let assembly = builder.build("").unwrap();
        let (vm, mut state) = (BsVm::default(), BsVmState::default());
        for bind_point in [FunBindPoint::INVALID, FunBindPoint(1)] {
            let result = execute_function(bind_point, &assembly, &mut state, &vm, &[0; 8], &mut [0; 4]);
            assert_eq!(result, Err(InvokeError::InvalidBindPoint(bind_point)));
        }
    }
}
