//! End-to-end tests against the C library already loaded into the process

use std::sync::Arc;

use typthon_ffi::convert::{address_to_bytes, address_to_text};
use typthon_ffi::{
    lookup_global, CallableRef, DispatchPolicy, FfiConfig, FfiContext, FfiError, FunctionRegistry,
    Result, Value,
};

fn context() -> FfiContext {
    FfiContext::new(FfiConfig::default())
}

#[test]
fn test_abs_through_libc() {
    let ctx = context();
    let iface = ctx.interface_str(&["int"], "int").unwrap();
    let abs = lookup_global("abs").unwrap();
    assert_eq!(unsafe { iface.call(abs, &[Value::Integer(-17)]) }, Ok(Value::Integer(17)));
}

#[test]
fn test_strlen_and_strdup() {
    let ctx = context();
    let text = Value::text("typthon").unwrap();

    let strlen = lookup_global("strlen").unwrap();
    let iface = ctx.interface_str(&["pointer"], "ulong").unwrap();
    assert_eq!(unsafe { iface.call(strlen, &[text.clone()]) }, Ok(Value::Integer(7)));

    let strdup = lookup_global("strdup").unwrap();
    let free = lookup_global("free").unwrap();
    let dup_iface = ctx.interface_str(&["pointer"], "pointer").unwrap();
    let free_iface = ctx.interface_str(&["pointer"], "void").unwrap();

    let copy = unsafe { dup_iface.call(strdup, &[text.clone()]) }.unwrap();
    let addr = copy.as_address().unwrap();
    assert_ne!(addr, 0);
    assert_eq!(unsafe { address_to_text(addr) }, text);
    assert_eq!(address_to_bytes(addr), Value::Bytes(addr.to_ne_bytes().to_vec()));
    assert_eq!(unsafe { free_iface.call(free, &[copy]) }, Ok(Value::Nil));
}

#[test]
fn test_qsort_with_trampoline_comparator() {
    let ctx = context();
    let compare = CallableRef::captured(|args: &[Value]| -> Result<Value> {
        let read = |v: &Value| {
            v.as_address()
                .map(|addr| unsafe { *(addr as *const i32) })
                .ok_or_else(|| FfiError::HostCall {
                    message: "expected address".into(),
                })
        };
        let (a, b) = (read(&args[0])?, read(&args[1])?);
        Ok(Value::Integer(a.cmp(&b) as i128))
    });
    let cmp_iface = ctx.interface_str(&["pointer", "pointer"], "int").unwrap();
    let comparator = ctx.trampoline(compare, cmp_iface).unwrap();

    let mut numbers: Vec<i32> = vec![9, -3, 14, 0, 7, 7, -20];
    let qsort = lookup_global("qsort").unwrap();
    let qsort_iface = ctx
        .interface_str(&["pointer", "ulong", "ulong", "pointer"], "void")
        .unwrap();
    let result = unsafe {
        qsort_iface.call(
            qsort,
            &[
                Value::Address(numbers.as_mut_ptr() as usize),
                Value::from(numbers.len()),
                Value::from(std::mem::size_of::<i32>()),
                Value::Address(comparator.address()),
            ],
        )
    };
    assert_eq!(result, Ok(Value::Nil));
    assert_eq!(numbers, vec![-20, -3, 0, 7, 7, 9, 14]);
}

#[test]
fn test_late_bound_callback_from_native() {
    let ctx = FfiContext::new(FfiConfig {
        dispatch: DispatchPolicy::Concurrent,
        ..FfiConfig::default()
    });
    let registry = Arc::new(FunctionRegistry::new());
    registry.bind(
        "offset",
        Arc::new(|args: &[Value]| -> Result<Value> {
            Ok(Value::Integer(args[0].as_integer().unwrap_or(0) + 100))
        }),
    );

    let iface = ctx.interface_str(&["int64"], "int64").unwrap();
    let tramp = ctx
        .trampoline(CallableRef::late_bound("offset", Arc::clone(&registry)), Arc::clone(&iface))
        .unwrap();
    let call = |v: i64| unsafe { iface.call(tramp.code_ptr(), &[Value::from(v)]) };

    assert_eq!(call(1), Ok(Value::Integer(101)));
    registry.bind(
        "offset",
        Arc::new(|args: &[Value]| -> Result<Value> {
            Ok(Value::Integer(args[0].as_integer().unwrap_or(0) - 100))
        }),
    );
    assert_eq!(call(1), Ok(Value::Integer(-99)));
}

#[test]
fn test_stats_track_activity() {
    let before = typthon_ffi::stats();
    let ctx = context();
    let iface = ctx.interface_str(&["int"], "int").unwrap();
    let abs = lookup_global("abs").unwrap();
    unsafe { iface.call(abs, &[Value::Integer(1)]) }.unwrap();
    let _ = unsafe { iface.call(abs, &[Value::Float(1.0)]) };

    let after = typthon_ffi::stats();
    assert!(after.calls_made > before.calls_made);
    assert!(after.marshal_errors > before.marshal_errors);
}

#[test]
fn test_errors_are_recoverable() {
    let ctx = context();
    assert_eq!(
        ctx.interface_str(&["int"], "nonsense").unwrap_err().kind(),
        "descriptor_resolution"
    );
    assert_eq!(
        ctx.interface_str(&["void"], "int").unwrap_err().kind(),
        "interface_construction"
    );

    let iface = ctx.interface_str(&["int"], "int").unwrap();
    let abs = lookup_global("abs").unwrap();
    let err = unsafe { iface.call(abs, &[]) }.unwrap_err();
    assert_eq!(err, FfiError::ArityMismatch { expected: 1, found: 0 });
    assert_eq!(err.to_string(), "ffi arity mismatch: expected 1, got 0");
}

#[cfg(target_os = "linux")]
#[test]
fn test_strtold_rounds_to_nearest_double() {
    let ctx = context();
    let iface = ctx.interface_str(&["pointer", "pointer"], "longdouble").unwrap();
    let strtold = lookup_global("strtold").unwrap();

    for (text, expected) in [("0.1", 0.1f64), ("1e-5", 1e-5), ("2.5", 2.5)] {
        let args = [Value::text(text).unwrap(), Value::Nil];
        match unsafe { iface.call(strtold, &args) } {
            Ok(Value::Float(v)) => assert_eq!(v.to_bits(), expected.to_bits(), "{}", text),
            other => panic!("unexpected result for {}: {:?}", text, other),
        }
    }
}
