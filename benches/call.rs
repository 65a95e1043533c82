//! Native call benchmarks
//!
//! Measures the marshal + ffi_call round trip and trampoline call-ins.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::ffi::c_void;
use typthon_ffi::{CallableRef, DispatchPolicy, FfiContext, Result, TypeResolver, Value};

extern "C" fn add_i64(a: i64, b: i64) -> i64 {
    a.wrapping_add(b)
}

#[repr(C)]
struct Point {
    x: f64,
    y: f64,
}

extern "C" fn norm2(p: Point) -> f64 {
    p.x * p.x + p.y * p.y
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let text = "struct(int32, struct(double, pointer), uint8)";

    group.bench_function("interned", |b| {
        let resolver = TypeResolver::new();
        b.iter(|| resolver.resolve_str(black_box(text)).unwrap());
    });
    group.bench_function("uncached", |b| {
        let resolver = TypeResolver::uncached();
        b.iter(|| resolver.resolve_str(black_box(text)).unwrap());
    });
    group.finish();
}

fn bench_call(c: &mut Criterion) {
    let ctx = FfiContext::default();
    let mut group = c.benchmark_group("call");

    let add = ctx.interface_str(&["int64", "int64"], "int64").unwrap();
    let add_ptr = add_i64 as *const c_void;
    group.bench_function("scalar", |b| {
        let args = [Value::Integer(40), Value::Integer(2)];
        b.iter(|| unsafe { add.call(add_ptr, black_box(&args)) }.unwrap());
    });

    let norm = ctx.interface_str(&["struct(double, double)"], "double").unwrap();
    let norm_ptr = norm2 as *const c_void;
    group.bench_function("struct_by_value", |b| {
        let args = [Value::Struct(vec![Value::Float(3.0), Value::Float(4.0)])];
        b.iter(|| unsafe { norm.call(norm_ptr, black_box(&args)) }.unwrap());
    });
    group.finish();
}

fn bench_trampoline(c: &mut Criterion) {
    let ctx = FfiContext::default();
    let mut group = c.benchmark_group("trampoline");

    for policy in [DispatchPolicy::Serialized, DispatchPolicy::Concurrent] {
        let iface = ctx.interface_str(&["int32"], "int32").unwrap();
        let callee = CallableRef::captured(|args: &[Value]| -> Result<Value> { Ok(args[0].clone()) });
        let tramp = typthon_ffi::Trampoline::new(callee, iface, policy).unwrap();
        let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(tramp.code_ptr()) };

        group.bench_with_input(BenchmarkId::new("call_in", policy), &policy, |b, _| {
            b.iter(|| f(black_box(7)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_call, bench_trampoline);
criterion_main!(benches);
