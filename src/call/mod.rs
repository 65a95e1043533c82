//! Native calls through a call interface
//!
//! Design: arity is checked before anything is marshalled, arguments are
//! written into a stack-scoped frame, and the call itself is a blocking
//! `ffi_call`. Nothing about the target address or pointer arguments is
//! validated.

mod frame;


use core::ffi::c_void;

use libffi::middle::CodePtr;
use libffi::raw;

use crate::error::{FfiError, Result};
use crate::interface::CallInterface;
use crate::logging::{log_ffi_call, log_ffi_error, log_ffi_return};
use crate::marshal;
use crate::stats;
use crate::value::Value;

pub(crate) use frame::CallFrame;

impl CallInterface {
    /// Call the native function at `function` with dynamic arguments
    ///
    /// # Safety
    /// `function` must be a function whose C signature matches this
    /// interface, and every pointer argument must be valid for whatever the
    /// function does with it. Violations are undefined behaviour, not errors.
    pub unsafe fn call(&self, function: *const c_void, args: &[Value]) -> Result<Value> {
        if args.len() != self.arity() {
            let err = FfiError::ArityMismatch {
                expected: self.arity(),
                found: args.len(),
            };
            log_ffi_error(function, &err);
            return Err(err);
        }

        let mut frame = CallFrame::new(self.arg_types(), self.return_type());
        for (index, (ty, value)) in self.arg_types().iter().zip(args).enumerate() {
            if let Err(err) = marshal::to_native(ty, value, frame.arg_ptr(index)) {
                stats::record_marshal_error();
                log_ffi_error(function, &err);
                return Err(err);
            }
        }

        log_ffi_call(function, args.len());
        let code = CodePtr::from_ptr(function);
        let mut arg_ptrs = frame.arg_pointers();
        raw::ffi_call(
            self.raw_cif(),
            Some(*code.as_safe_fun()),
            frame.ret_ptr() as *mut c_void,
            arg_ptrs.as_mut_ptr(),
        );
        stats::record_call();

        let result = marshal::from_return_slot(self.return_type(), frame.ret_ptr());
        log_ffi_return(function);
        result
    }
}
