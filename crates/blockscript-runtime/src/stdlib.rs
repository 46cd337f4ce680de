//! System intrinsics
//!
//! Output goes through the [`VmHost`](crate::host::VmHost) print hooks; the
//! math functions are plain `f32`/`i32` wrappers:
//! - `printString(string)`, `printInt(int)`, `printFloat(float)`
//! - `sqrt`, `sin`, `cos`, `abs`, `min`, `max` on floats, `abs` on ints
//! - `dot(float3, float3)` and the method `v.length()` on `float3`

use crate::builder::BlockScriptBuilder;
use crate::funcallback::{create_intrinsic_function, create_typed_intrinsic, IntrinsicError};
use crate::marshal::StringHandle;

/// Install every system intrinsic into `builder`
pub fn register_system_intrinsics(builder: &mut BlockScriptBuilder) -> Result<(), IntrinsicError> {
    register_print(builder)?;
    register_math(builder)?;
    tracing::debug!(
        tag = %crate::log::LogTag::Info,
        functions = builder.arena().fun_decs().len(),
        "system intrinsics registered"
    );
    Ok(())
}

fn register_print(builder: &mut BlockScriptBuilder) -> Result<(), IntrinsicError> {
    create_intrinsic_function(
        builder,
        "printString",
        &["string"],
        &["str"],
        "void",
        |ctx| {
            let (handle,): (StringHandle,) = ctx.args()?;
            let text = ctx.string(handle)?;
            ctx.host().print_string(text);
            Ok(())
        },
        false,
    )?;
    create_intrinsic_function(
        builder,
        "printInt",
        &["int"],
        &["i"],
        "void",
        |ctx| {
            let (value,): (i32,) = ctx.args()?;
            ctx.host().print_int(value);
            Ok(())
        },
        false,
    )?;
    create_intrinsic_function(
        builder,
        "printFloat",
        &["float"],
        &["f"],
        "void",
        |ctx| {
            let (value,): (f32,) = ctx.args()?;
            ctx.host().print_float(value);
            Ok(())
        },
        false,
    )
}

fn register_math(builder: &mut BlockScriptBuilder) -> Result<(), IntrinsicError> {
    create_typed_intrinsic(builder, "sqrt", &["x"], false, |(x,): (f32,)| x.sqrt())?;
    create_typed_intrinsic(builder, "sin", &["x"], false, |(x,): (f32,)| x.sin())?;
    create_typed_intrinsic(builder, "cos", &["x"], false, |(x,): (f32,)| x.cos())?;
    create_typed_intrinsic(builder, "abs", &["x"], false, |(x,): (i32,)| x.wrapping_abs())?;
    create_typed_intrinsic(builder, "abs", &["x"], false, |(x,): (f32,)| x.abs())?;
    create_typed_intrinsic(builder, "min", &["a", "b"], false, |(a, b): (f32, f32)| a.min(b))?;
    create_typed_intrinsic(builder, "max", &["a", "b"], false, |(a, b): (f32, f32)| a.max(b))?;
    create_typed_intrinsic(builder, "dot", &["a", "b"], false, |(a, b): ([f32; 3], [f32; 3])| {
        dot3(a, b)
    })?;
    create_typed_intrinsic(builder, "length", &["v"], true, |(v,): ([f32; 3],)| {
        dot3(v, v).sqrt()
    })
}

fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter().zip(&b).map(|(x, y)| x * y).sum()
}
