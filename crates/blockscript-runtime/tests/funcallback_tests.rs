//! Native call ABI tests
//!
//! Registration, bind point resolution and invocation through the raw
//! `create_intrinsic_function` / `get_function_bind_point` /
//! `execute_function` entry points.

mod common;

use blockscript_runtime::builder::StackFrameInfo;
use blockscript_runtime::{
    create_intrinsic_function, create_typed_intrinsic, execute_function, get_function_bind_point,
    BlockScriptBuilder, BsVm, BsVmState, FunBindPoint, IntrinsicError, InvokeError, NativeError,
    ScriptArgs, ScriptValue, VmError,
};
use common::assert_eq;
use rstest::rstest;

fn add_callback(
    ctx: &mut blockscript_runtime::FunCallbackContext<'_>,
) -> Result<(), NativeError> {
    let (a, b): (i32, i32) = ctx.args()?;
    ctx.set_return(a.wrapping_add(b))
}

fn builder_with_add() -> BlockScriptBuilder {
    let mut builder = BlockScriptBuilder::default();
    create_intrinsic_function(&mut builder, "add", &["int", "int"], &["a", "b"], "int", add_callback, false)
        .unwrap();
    builder
}

fn call<A: ScriptArgs, R: ScriptValue>(
    builder: &BlockScriptBuilder,
    assembly: &blockscript_runtime::Assembly,
    state: &mut BsVmState,
    name: &str,
    args: A,
) -> Result<R, InvokeError> {
    let bind_point = get_function_bind_point(builder, assembly, name, &A::type_names());
    let mut output = vec![0u8; R::BYTE_SIZE];
    execute_function(bind_point, assembly, state, &BsVm::default(), &args.encode_args(), &mut output)?;
    Ok(R::decode(&output))
}

// ============================================================================
// Registration and lookup
// ============================================================================

#[test]
fn test_add_round_trip() {
    let mut builder = builder_with_add();
    let assembly = builder.build("").unwrap();
    let bind_point = get_function_bind_point(&builder, &assembly, "add", &["int", "int"]);
    assert!(bind_point.is_valid());

    let input = (2i32, 3i32).encode_args();
    let mut output = [0u8; 4];
    let (vm, mut state) = (BsVm::default(), BsVmState::default());
    execute_function(bind_point, &assembly, &mut state, &vm, &input, &mut output).unwrap();
    assert_eq!(i32::from_le_bytes(output), 5);
    assert_eq!(state.stack_levels(), 0);
    assert_eq!(state.esp(), 0);
}

#[rstest]
#[case::exact(&["int", "float"], true)]
#[case::permuted(&["float", "int"], false)]
#[case::shortened(&["int"], false)]
#[case::extended(&["int", "float", "int"], false)]
#[case::empty(&[], false)]
fn test_bind_point_requires_exact_signature(#[case] types: &[&str], #[case] valid: bool) {
    let mut builder = BlockScriptBuilder::default();
    create_intrinsic_function(
        &mut builder,
        "mix",
        &["int", "float"],
        &["i", "f"],
        "float",
        |ctx| {
            let (i, f): (i32, f32) = ctx.args()?;
            ctx.set_return(i as f32 * f)
        },
        false,
    )
    .unwrap();
    let assembly = builder.build("").unwrap();
    assert_eq!(get_function_bind_point(&builder, &assembly, "mix", types).is_valid(), valid);
}

#[rstest]
#[case::argument(&["int", "vec9"], "int")]
#[case::return_type(&["int", "int"], "vec9")]
fn test_unknown_type_leaves_table_unchanged(#[case] types: &[&str], #[case] ret: &str) {
    let mut builder = builder_with_add();
    let before = builder.arena().fun_decs().len();
    let result = create_intrinsic_function(&mut builder, "bad", types, &["a", "b"], ret, add_callback, false);
    assert!(matches!(
        result,
        Err(IntrinsicError::UnknownArgumentType { .. } | IntrinsicError::UnknownReturnType { .. })
    ));
    assert_eq!(builder.arena().fun_decs().len(), before);
}

#[test]
fn test_void_argument_and_long_names_rejected() {
    let mut builder = BlockScriptBuilder::default();
    let void_arg = create_intrinsic_function(&mut builder, "f", &["void"], &["x"], "void", |_| Ok(()), false);
    assert!(matches!(void_arg, Err(IntrinsicError::Declaration(_))));

    let long = "n".repeat(64);
    let long_name = create_intrinsic_function(&mut builder, &long, &[], &[], "void", |_| Ok(()), false);
    assert!(matches!(long_name, Err(IntrinsicError::NameTooLong(_))));

    let long_arg = create_intrinsic_function(&mut builder, "g", &["int"], &[long.as_str()], "void", |_| Ok(()), false);
    assert!(matches!(long_arg, Err(IntrinsicError::NameTooLong(_))));

    assert!(builder.arena().fun_decs().is_empty());
}

#[test]
fn test_duplicate_registration_first_wins() {
    let mut builder = builder_with_add();
    create_intrinsic_function(
        &mut builder,
        "add",
        &["int", "int"],
        &["x", "y"],
        "int",
        |ctx| ctx.set_return(-1i32),
        false,
    )
    .unwrap();
    assert_eq!(builder.arena().fun_decs().len(), 2);

    let assembly = builder.build("").unwrap();
    assert_eq!(
        get_function_bind_point(&builder, &assembly, "add", &["int", "int"]),
        FunBindPoint(0)
    );
    let mut state = BsVmState::default();
    assert_eq!(call::<_, i32>(&builder, &assembly, &mut state, "add", (2, 3)), Ok(5));
}

#[test]
fn test_script_functions_share_the_table() {
    let mut builder = builder_with_add();
    let assembly = builder
        .build("add3(a : int, b : int, c : int) : int { return add(add(a, b), c); }")
        .unwrap();
    assert_eq!(
        get_function_bind_point(&builder, &assembly, "add3", &["int", "int", "int"]),
        FunBindPoint(1)
    );
    let mut state = BsVmState::default();
    assert_eq!(call::<_, i32>(&builder, &assembly, &mut state, "add3", (1, 2, 3)), Ok(6));
}

#[test]
fn test_older_assembly_resolves_its_own_types() {
    let mut builder = BlockScriptBuilder::default();
    let first = builder.build("struct P { x : int; }; useP(p : P) : void { }").unwrap();
    let _second = builder
        .build("struct Q { a : float; b : float; }; useQ(q : Q) : void { }")
        .unwrap();

    assert_eq!(
        get_function_bind_point(&builder, &first, "useP", &["P"]),
        FunBindPoint(0)
    );
    assert_eq!(
        get_function_bind_point(&builder, &first, "useP", &["Q"]),
        FunBindPoint::INVALID
    );
}

// ============================================================================
// Invocation contract
// ============================================================================

#[test]
fn test_size_mismatch_leaves_output_untouched() {
    let mut builder = builder_with_add();
    let assembly = builder.build("").unwrap();
    let bind_point = get_function_bind_point(&builder, &assembly, "add", &["int", "int"]);
    let (vm, mut state) = (BsVm::default(), BsVmState::default());

    let mut output = [0xAAu8; 8];
    let result = execute_function(bind_point, &assembly, &mut state, &vm, &[0; 8], &mut output);
    assert!(matches!(result, Err(InvokeError::OutputSize { expected: 4, found: 8, .. })));
    assert_eq!(output, [0xAA; 8]);

    let mut output = [0xAAu8; 4];
    let result = execute_function(bind_point, &assembly, &mut state, &vm, &[0; 4], &mut output);
    assert!(matches!(result, Err(InvokeError::InputSize { expected: 8, found: 4, .. })));
    assert_eq!(output, [0xAA; 4]);
    assert_eq!(state.esp(), 0);
}

#[test]
fn test_busy_state_rejected() {
    let mut builder = builder_with_add();
    let assembly = builder.build("").unwrap();
    let bind_point = get_function_bind_point(&builder, &assembly, "add", &["int", "int"]);
    let mut state = BsVmState::default();
    state.push_frame(StackFrameInfo::default()).unwrap();

    let mut output = [0u8; 4];
    let result = execute_function(bind_point, &assembly, &mut state, &BsVm::default(), &[0; 8], &mut output);
    assert_eq!(result, Err(InvokeError::Busy { levels: 1 }));
    assert_eq!(state.stack_levels(), 1);
}

#[test]
fn test_wide_returns_keep_the_stack_balanced() {
    let mut builder = BlockScriptBuilder::default();
    create_typed_intrinsic(&mut builder, "splat", &["x"], false, |(x,): (f32,)| [x; 4]).unwrap();
    let assembly = builder
        .build("mk(x : float) : float3 { return float3(x, x + 1.0, x + 2.0); }")
        .unwrap();
    let mut state = BsVmState::default();

    for _ in 0..2 {
        let esp = state.esp();
        let v: [f32; 3] = call(&builder, &assembly, &mut state, "mk", (1.0f32,)).unwrap();
        assert_eq!(v, [1.0, 2.0, 3.0]);
        assert_eq!(state.esp(), esp);

        let w: [f32; 4] = call(&builder, &assembly, &mut state, "splat", (0.5f32,)).unwrap();
        assert_eq!(w, [0.5; 4]);
        assert_eq!(state.esp(), esp);
    }
}

#[test]
fn test_native_failure_aborts_and_resets() {
    let mut builder = BlockScriptBuilder::default();
    create_intrinsic_function(
        &mut builder,
        "fail",
        &["int"],
        &["code"],
        "int",
        |ctx| {
            let (code,): (i32,) = ctx.args()?;
            Err(NativeError::failed(format!("code {}", code)))
        },
        false,
    )
    .unwrap();
    let assembly = builder
        .build("outer(x : int) : int { y : int = fail(x); return y + 1; }")
        .unwrap();
    let mut state = BsVmState::default();

    let result = call::<_, i32>(&builder, &assembly, &mut state, "outer", (7,));
    assert_eq!(
        result,
        Err(InvokeError::Vm(VmError::Native {
            name: "fail".to_string(),
            message: "code 7".to_string()
        }))
    );
    assert_eq!(state.stack_levels(), 0);
    assert_eq!(state.esp(), 0);
}

#[test]
fn test_wide_native_called_from_script() {
    let mut builder = BlockScriptBuilder::default();
    create_typed_intrinsic(&mut builder, "scale", &["v", "s"], false, |(v, s): ([f32; 3], f32)| {
        [v[0] * s, v[1] * s, v[2] * s]
    })
    .unwrap();
    let assembly = builder
        .build("f() : float { v : float3 = scale(float3(1.0, 2.0, 3.0), 2.0); return v.x + v.y + v.z; }")
        .unwrap();
    let mut state = BsVmState::default();
    assert_eq!(call::<_, f32>(&builder, &assembly, &mut state, "f", ()), Ok(12.0));
}
