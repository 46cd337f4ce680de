//! VM execution benchmarks
//!
//! Compiles each program once and measures calls through the runtime
//! facade. Covers:
//! - Arithmetic loops
//! - Recursive calls
//! - Struct construction and wide returns
//! - Native calls from script
//! - Compilation on its own

use blockscript_runtime::BlockScript;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn compiled(source: &str) -> BlockScript {
    let mut script = BlockScript::new().unwrap();
    script.compile(source).unwrap();
    script
}

// ============================================================================
// Execution
// ============================================================================

fn bench_arithmetic_loop(c: &mut Criterion) {
    let mut script = compiled(
        "sum(n : int) : int { i : int = 0; s : int = 0; while (i < n) { s = s + i; i = i + 1; } return s; }",
    );
    c.bench_function("vm_arithmetic_loop_10k", |b| {
        b.iter(|| script.call::<(i32,), i32>("sum", (black_box(10_000),)).unwrap());
    });
}

fn bench_fibonacci(c: &mut Criterion) {
    let mut script = compiled(
        "fib(n : int) : int { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }",
    );
    let mut group = c.benchmark_group("vm_fibonacci");
    for n in [10, 15, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| script.call::<(i32,), i32>("fib", (black_box(n),)).unwrap());
        });
    }
    group.finish();
}

fn bench_struct_returns(c: &mut Criterion) {
    let mut script = compiled(
        "scale(v : float3, s : float) : float3 { return float3(v.x * s, v.y * s, v.z * s); }\n\
         run(n : int) : float {\n\
           v : float3 = float3(1.0, 1.0, 1.0); i : int = 0;\n\
           while (i < n) { v = scale(v, 1.0001); i = i + 1; }\n\
           return v.length();\n\
         }",
    );
    c.bench_function("vm_struct_returns_1k", |b| {
        b.iter(|| script.call::<(i32,), f32>("run", (black_box(1_000),)).unwrap());
    });
}

fn bench_native_calls(c: &mut Criterion) {
    let mut script = compiled(
        "run(n : int) : float { i : int = 0; s : float = 0.0; while (i < n) { s = s + sqrt(float(i)); i = i + 1; } return s; }",
    );
    c.bench_function("vm_native_calls_1k", |b| {
        b.iter(|| script.call::<(i32,), f32>("run", (black_box(1_000),)).unwrap());
    });
}

// ============================================================================
// Compilation
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let source = "struct Light { pos : float3; intensity : float; };\n\
                  shade(l : Light, n : float3) : float { return max(dot(l.pos, n), 0.0) * l.intensity; }\n\
                  fib(n : int) : int { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }";
    let mut script = BlockScript::new().unwrap();
    c.bench_function("compile_small_module", |b| {
        b.iter(|| script.compile(black_box(source)).unwrap());
    });
}

criterion_group!(
    execution_benches,
    bench_arithmetic_loop,
    bench_fibonacci,
    bench_struct_returns,
    bench_native_calls
);

criterion_group!(compile_benches, bench_compile);

criterion_main!(execution_benches, compile_benches);
