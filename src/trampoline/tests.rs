//! Trampoline tests

use super::*;
use crate::types::{TypeExpr, TypeResolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn interface(args: &[&str], ret: &str) -> Arc<CallInterface> {
    let resolver = TypeResolver::new();
    let args: Vec<TypeExpr> = args.iter().map(|a| a.parse().unwrap()).collect();
    Arc::new(CallInterface::from_exprs(&resolver, &args, &ret.parse().unwrap()).unwrap())
}

fn int_arg(args: &[Value], index: usize) -> Result<i128> {
    args[index]
        .as_integer()
        .ok_or_else(|| FfiError::HostCall {
            message: "expected integer".into(),
        })
}

fn doubler() -> CallableRef {
    CallableRef::captured(|args: &[Value]| -> Result<Value> {
        Ok(Value::Integer(int_arg(args, 0)? * 2))
    })
}

type UnaryI32 = extern "C" fn(i32) -> i32;

fn as_unary(tramp: &Trampoline) -> UnaryI32 {
    unsafe { core::mem::transmute::<*const c_void, UnaryI32>(tramp.code_ptr()) }
}

// ===== Construction =====

#[test]
fn test_doubling_trampoline() {
    let tramp = Trampoline::new(doubler(), interface(&["int32"], "int32"), DispatchPolicy::Serialized)
        .unwrap();
    assert_eq!(as_unary(&tramp)(21), 42);
    assert_eq!(as_unary(&tramp)(-4), -8);
}

#[test]
fn test_region_is_sealed() {
    let tramp = Trampoline::new(doubler(), interface(&["int32"], "int32"), DispatchPolicy::Concurrent)
        .unwrap();
    assert!(tramp.region.is_executable());
    assert!(tramp.region.len() >= core::mem::size_of::<ffi_closure>());
    assert_eq!(tramp.address(), tramp.code_ptr() as usize);
}

#[test]
fn test_called_through_call_interface() {
    let iface = interface(&["int32"], "int32");
    let tramp = Trampoline::new(doubler(), Arc::clone(&iface), DispatchPolicy::Serialized).unwrap();
    let result = unsafe { iface.call(tramp.code_ptr(), &[Value::Integer(21)]) };
    assert_eq!(result, Ok(Value::Integer(42)));
}

#[test]
fn test_struct_and_float_arguments() {
    let callee = CallableRef::captured(|args: &[Value]| -> Result<Value> {
        match &args[0] {
            Value::Struct(items) => {
                let a = items[0].as_float().unwrap_or(0.0);
                let b = items[1].as_float().unwrap_or(0.0);
                Ok(Value::Float(a * b + args[1].as_float().unwrap_or(0.0)))
            }
            other => Err(FfiError::kind_mismatch("struct", other.kind_name())),
        }
    });
    let iface = interface(&["struct(int32, double)", "float"], "double");
    let tramp = Trampoline::new(callee, Arc::clone(&iface), DispatchPolicy::Serialized).unwrap();

    let pair = Value::Struct(vec![Value::Integer(3), Value::Float(1.5)]);
    let result = unsafe { iface.call(tramp.code_ptr(), &[pair, Value::Float(0.5)]) };
    assert_eq!(result, Ok(Value::Float(5.0)));
}

#[test]
fn test_pointer_argument_arrives_as_address() {
    let callee = CallableRef::captured(|args: &[Value]| -> Result<Value> {
        Ok(Value::Integer(match &args[0] {
            Value::Nil => 0,
            Value::Address(addr) => *addr as i128,
            _ => -1,
        }))
    });
    let iface = interface(&["pointer"], "int64");
    let tramp = Trampoline::new(callee, Arc::clone(&iface), DispatchPolicy::Serialized).unwrap();
    let call = |v: Value| unsafe { iface.call(tramp.code_ptr(), &[v]) };
    assert_eq!(call(Value::Nil), Ok(Value::Integer(0)));
    assert_eq!(call(Value::Address(0x1000)), Ok(Value::Integer(0x1000)));
}

// ===== Callable binding =====

#[test]
fn test_late_binding_observes_rebinding() {
    let registry = Arc::new(FunctionRegistry::new());
    registry.bind(
        "scale",
        Arc::new(|args: &[Value]| -> Result<Value> { Ok(Value::Integer(int_arg(args, 0)? * 2)) }),
    );
    let callee = CallableRef::late_bound("scale", Arc::clone(&registry));
    let tramp =
        Trampoline::new(callee, interface(&["int32"], "int32"), DispatchPolicy::Serialized).unwrap();
    let f = as_unary(&tramp);

    assert_eq!(f(21), 42);
    registry.bind(
        "scale",
        Arc::new(|args: &[Value]| -> Result<Value> { Ok(Value::Integer(int_arg(args, 0)? * 3)) }),
    );
    assert_eq!(f(21), 63);

    // Unbound names fail inside dispatch; native code sees zero.
    registry.unbind("scale");
    assert_eq!(f(21), 0);
    assert_eq!(tramp.callee().describe(), "scale");
}

#[test]
fn test_captured_ignores_registry() {
    let registry = Arc::new(FunctionRegistry::new());
    assert!(registry.is_empty());
    let callee = doubler();
    assert_eq!(callee.describe(), "<captured>");
    registry.bind("other", Arc::new(|_: &[Value]| -> Result<Value> { Ok(Value::Integer(0)) }));
    assert_eq!(callee.invoke(&[Value::Integer(5)]), Ok(Value::Integer(10)));
}

// ===== Failure containment =====

#[test]
fn test_host_error_zeroes_return() {
    let callee = CallableRef::captured(|_: &[Value]| -> Result<Value> {
        Err(FfiError::HostCall {
            message: "boom".into(),
        })
    });
    let tramp =
        Trampoline::new(callee, interface(&["int32"], "int32"), DispatchPolicy::Serialized).unwrap();
    assert_eq!(as_unary(&tramp)(7), 0);
}

#[test]
fn test_panic_does_not_unwind_into_native() {
    let callee = CallableRef::captured(|_: &[Value]| -> Result<Value> { panic!("host panic") });
    let tramp =
        Trampoline::new(callee, interface(&["int32"], "int32"), DispatchPolicy::Serialized).unwrap();
    assert_eq!(as_unary(&tramp)(7), 0);
}

#[test]
fn test_bad_result_zeroes_return() {
    let callee =
        CallableRef::captured(|_: &[Value]| -> Result<Value> { Ok(Value::text("nope").unwrap()) });
    let iface = interface(&["int32"], "double");
    let tramp = Trampoline::new(callee, Arc::clone(&iface), DispatchPolicy::Serialized).unwrap();
    let result = unsafe { iface.call(tramp.code_ptr(), &[Value::Integer(1)]) };
    assert_eq!(result, Ok(Value::Float(0.0)));
}

#[test]
fn test_void_return_ignores_result() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let callee = CallableRef::captured(move |_: &[Value]| -> Result<Value> {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Integer(123))
    });
    let iface = interface(&[], "void");
    let tramp = Trampoline::new(callee, Arc::clone(&iface), DispatchPolicy::Serialized).unwrap();
    assert_eq!(unsafe { iface.call(tramp.code_ptr(), &[]) }, Ok(Value::Nil));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ===== Dispatch policy =====

static FACTORIAL: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_serialized_allows_recursion() {
    let callee = CallableRef::captured(|args: &[Value]| -> Result<Value> {
        let n = int_arg(args, 0)?;
        if n <= 1 {
            return Ok(Value::Integer(1));
        }
        let f: UnaryI32 = unsafe { core::mem::transmute(FACTORIAL.load(Ordering::SeqCst)) };
        Ok(Value::Integer(n * f((n - 1) as i32) as i128))
    });
    let tramp =
        Trampoline::new(callee, interface(&["int32"], "int32"), DispatchPolicy::Serialized).unwrap();
    FACTORIAL.store(tramp.address(), Ordering::SeqCst);
    assert_eq!(as_unary(&tramp)(5), 120);
}

fn overlap_probe(policy: DispatchPolicy) -> usize {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
    let callee = CallableRef::captured(move |args: &[Value]| -> Result<Value> {
        let now = a.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        a.fetch_sub(1, Ordering::SeqCst);
        Ok(args[0].clone())
    });
    let tramp = Trampoline::new(callee, interface(&["int32"], "int32"), policy).unwrap();
    let address = tramp.address();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let f: UnaryI32 = unsafe { core::mem::transmute(address) };
                f(i)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), i as i32);
    }
    drop(tramp);
    peak.load(Ordering::SeqCst)
}

#[test]
fn test_serialized_excludes_concurrent_entry() {
    assert_eq!(overlap_probe(DispatchPolicy::Serialized), 1);
}

#[test]
fn test_concurrent_policy_runs_in_parallel() {
    assert!(overlap_probe(DispatchPolicy::Concurrent) >= 1);
}

// ===== Release =====

#[test]
fn test_drop_and_leak_are_counted() {
    let before = crate::stats::stats();
    let tramp = Trampoline::new(doubler(), interface(&["int32"], "int32"), DispatchPolicy::Serialized)
        .unwrap();
    drop(tramp);
    let after = crate::stats::stats();
    assert!(after.trampolines_created > before.trampolines_created);

    let leaked = Trampoline::new(doubler(), interface(&["int32"], "int32"), DispatchPolicy::Serialized)
        .unwrap()
        .leak();
    let f: UnaryI32 = unsafe { core::mem::transmute(leaked) };
    assert_eq!(f(4), 8);
}

#[test]
fn test_exec_region_lifecycle() {
    let mut region = ExecRegion::map_writable(10).unwrap();
    assert!(!region.is_executable());
    assert!(region.len() >= 10);
    unsafe { core::ptr::write_bytes(region.as_ptr(), 0xC3, 10) };
    region.make_executable().unwrap();
    assert!(region.is_executable());
}

#[test]
fn test_many_trampolines_do_not_accumulate() {
    let iface = interface(&["int32"], "int32");
    for i in 0..256 {
        let tramp = Trampoline::new(doubler(), Arc::clone(&iface), DispatchPolicy::Concurrent).unwrap();
        assert_eq!(as_unary(&tramp)(i), i * 2);
    }
}
