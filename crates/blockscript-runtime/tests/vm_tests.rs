//! VM limits, faults and stack discipline

mod common;

use blockscript_config::{ScriptConfig, VmConfig};
use blockscript_runtime::funcallback::InvokeError;
use blockscript_runtime::{BlockScript, RuntimeError, VmError, VmHost};
use common::{assert_eq, script};
use proptest::prelude::*;

fn limited(vm: VmConfig, source: &str) -> BlockScript {
    let config = ScriptConfig {
        vm,
        ..ScriptConfig::default()
    };
    let mut script = BlockScript::with_config(&config, VmHost::default()).unwrap();
    script.compile(source).unwrap();
    script
}

fn vm_fault(err: RuntimeError) -> VmError {
    match err {
        RuntimeError::Invoke(InvokeError::Vm(fault)) => fault,
        other => panic!("expected a VM fault, got {}", other),
    }
}

#[test]
fn test_step_limit_stops_infinite_loop() {
    let vm = VmConfig {
        max_steps: 1_000,
        ..VmConfig::default()
    };
    let mut script = limited(vm, "spin() : void { while (true) { } }");

    let err = script.call::<(), ()>("spin", ()).unwrap_err();
    assert_eq!(vm_fault(err), VmError::StepLimit { limit: 1_000 });
    assert_eq!(script.state().stack_levels(), 0);
    assert_eq!(script.state().esp(), 0);
}

#[test]
fn test_step_budget_is_per_call() {
    let vm = VmConfig {
        max_steps: 200,
        ..VmConfig::default()
    };
    let mut script = limited(vm, "one() : int { return 1; }");
    for _ in 0..100 {
        assert_eq!(script.call::<(), i32>("one", ()).unwrap(), 1);
    }
}

#[test]
fn test_unbounded_recursion_overflows() {
    let vm = VmConfig {
        max_stack_levels: 32,
        ..VmConfig::default()
    };
    let mut script = limited(vm, "down(n : int) : int { return down(n + 1); }");

    let err = script.call::<(i32,), i32>("down", (0,)).unwrap_err();
    assert_eq!(vm_fault(err), VmError::StackOverflow { limit: 32 });
    assert_eq!(script.state().stack_levels(), 0);
}

#[test]
fn test_recursion_within_limit() {
    let vm = VmConfig {
        max_stack_levels: 32,
        ..VmConfig::default()
    };
    let source = "depth(n : int) : int { if (n == 0) { return 0; } return 1 + depth(n - 1); }";
    let mut script = limited(vm, source);
    assert_eq!(script.call::<(i32,), i32>("depth", (30,)).unwrap(), 30);
}

#[test]
fn test_ram_limit() {
    let vm = VmConfig {
        max_ram_bytes: 32,
        ..VmConfig::default()
    };
    let source = "big() : float { a : float4; b : float4; return a.x + b.x; }";
    let mut script = limited(vm, source);

    let err = script.call::<(), f32>("big", ()).unwrap_err();
    assert!(matches!(vm_fault(err), VmError::RamLimit { limit: 32, .. }));
    assert_eq!(script.state().esp(), 0);
}

#[test]
fn test_division_by_zero_reports_source_span() {
    let source = "div(a : int, b : int) : int { return a / b; }";
    let mut script = script(source);

    match vm_fault(script.call::<(i32, i32), i32>("div", (1, 0)).unwrap_err()) {
        VmError::DivisionByZero { span } => {
            assert_eq!(&source[span.start..span.end], "a / b");
        }
        other => panic!("unexpected fault: {}", other),
    }
}

#[test]
fn test_modulo_by_zero_faults() {
    let mut script = script("m(a : int, b : int) : int { return a % b; }");
    let err = script.call::<(i32, i32), i32>("m", (5, 0)).unwrap_err();
    assert!(matches!(vm_fault(err), VmError::DivisionByZero { .. }));
}

#[test]
fn test_float_division_by_zero_is_infinite() {
    let mut script = script("d(a : float, b : float) : float { return a / b; }");
    let value = script.call::<(f32, f32), f32>("d", (1.0, 0.0)).unwrap();
    assert!(value.is_infinite());
}

#[test]
fn test_float_to_int_saturates() {
    let mut script = script("t(x : float) : int { return int(x); }");
    assert_eq!(script.call::<(f32,), i32>("t", (1.0e20,)).unwrap(), i32::MAX);
    assert_eq!(script.call::<(f32,), i32>("t", (f32::NAN,)).unwrap(), 0);
}

#[test]
fn test_state_survives_many_calls() {
    let mut script = script(
        "mk(x : float) : float3 { return float3(x, x, x); }\n\
         sum(v : float3) : float { return v.x + v.y + v.z; }",
    );
    for i in 0..50 {
        let v: [f32; 3] = script.call("mk", (i as f32,)).unwrap();
        let s: f32 = script.call("sum", (v,)).unwrap();
        assert_eq!(s, 3.0 * i as f32);
    }
    assert_eq!(script.state().esp(), 0);
    assert_eq!(script.state().stack_levels(), 0);
}

proptest! {
    #[test]
    fn int_arithmetic_matches_wrapping_rust(a in any::<i32>(), b in any::<i32>()) {
        let mut script = script(
            "add(a : int, b : int) : int { return a + b; }\n\
             mul(a : int, b : int) : int { return a * b; }\n\
             sub(a : int, b : int) : int { return a - b; }",
        );
        prop_assert_eq!(script.call::<(i32, i32), i32>("add", (a, b)).unwrap(), a.wrapping_add(b));
        prop_assert_eq!(script.call::<(i32, i32), i32>("mul", (a, b)).unwrap(), a.wrapping_mul(b));
        prop_assert_eq!(script.call::<(i32, i32), i32>("sub", (a, b)).unwrap(), a.wrapping_sub(b));
        prop_assert_eq!(script.state().esp(), 0);
    }

    #[test]
    fn int_division_truncates(a in any::<i32>(), b in any::<i32>().prop_filter("non-zero", |b| *b != 0)) {
        let mut script = script(
            "div(a : int, b : int) : int { return a / b; }\n\
             rem(a : int, b : int) : int { return a % b; }",
        );
        prop_assert_eq!(script.call::<(i32, i32), i32>("div", (a, b)).unwrap(), a.wrapping_div(b));
        prop_assert_eq!(script.call::<(i32, i32), i32>("rem", (a, b)).unwrap(), a.wrapping_rem(b));
    }

    #[test]
    fn comparisons_match_rust(a in -1000.0f32..1000.0, b in -1000.0f32..1000.0) {
        let mut script = script("lt(a : float, b : float) : bool { return a < b; }");
        prop_assert_eq!(script.call::<(f32, f32), bool>("lt", (a, b)).unwrap(), a < b);
    }
}
