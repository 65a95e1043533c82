//! Callback trampolines - native function pointers that call host code
//!
//! Architecture:
//! - `exec.rs` - write-then-execute page mapping
//! - `callable.rs` - host callables, by value or late-bound by name
//!
//! A trampoline owns one executable region holding a libffi closure whose
//! user data is the trampoline's dispatch context. Dropping the trampoline
//! flips the region back to writable and unmaps it; `leak` keeps it for the
//! rest of the process instead.

mod callable;
mod exec;

#[cfg(test)]
mod tests;

pub use callable::{CallableRef, FunctionRegistry, HostCallable};
pub use exec::ExecRegion;

use core::ffi::c_void;
use core::mem::size_of;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use libffi::raw::{self, ffi_arg, ffi_cif, ffi_closure};
use parking_lot::ReentrantMutex;

use crate::config::DispatchPolicy;
use crate::error::{FfiError, Result};
use crate::interface::CallInterface;
use crate::logging::{log_dispatch_failure, log_trampoline_created, log_trampoline_released};
use crate::marshal;
use crate::stats;
use crate::value::Value;

/// State reachable from the closure's user-data pointer
struct DispatchContext {
    interface: Arc<CallInterface>,
    callee: CallableRef,
    /// Present under `DispatchPolicy::Serialized`
    gate: Option<ReentrantMutex<()>>,
}

impl DispatchContext {
    /// Marshal in, call the host, marshal out
    ///
    /// # Safety
    /// `args` holds one valid buffer per declared argument and `ret` is the
    /// return buffer libffi supplied.
    unsafe fn run(&self, ret: *mut u8, args: *const *const u8) -> Result<()> {
        let _held = self.gate.as_ref().map(|gate| gate.lock());

        let values = self
            .interface
            .arg_types()
            .iter()
            .enumerate()
            .map(|(i, ty)| marshal::from_native(ty, *args.add(i)))
            .collect::<Result<Vec<Value>>>()?;

        let result = self.callee.invoke(&values)?;

        let ret_ty = self.interface.return_type();
        if !ret_ty.is_void() {
            marshal::to_return_slot(ret_ty, &result, ret)?;
        }
        Ok(())
    }

    /// Zero the return buffer so native code never reads garbage
    unsafe fn clear_return(&self, ret: *mut u8) {
        let ret_ty = self.interface.return_type();
        if ret_ty.is_void() {
            return;
        }
        let len = if ret_ty.is_narrow_integral() {
            size_of::<ffi_arg>()
        } else {
            ret_ty.size()
        };
        core::ptr::write_bytes(ret, 0, len);
    }
}

/// Entry point libffi routes every call-in through
unsafe extern "C" fn dispatch(
    _cif: *mut ffi_cif,
    ret: *mut c_void,
    args: *mut *mut c_void,
    user_data: *mut c_void,
) {
    let context = &*(user_data as *const DispatchContext);
    let ret = ret as *mut u8;

    // Neither host errors nor panics may unwind into native frames.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        context.run(ret, args as *const *const u8)
    }));

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => FfiError::HostCall {
            message: panic_message(&payload),
        },
    };
    log_dispatch_failure(context.callee.describe(), &failure);
    context.clear_return(ret);
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in host callable".to_string()
    }
}

/// Native-callable function pointer dispatching into a host callable
pub struct Trampoline {
    region: ExecRegion,
    context: Box<DispatchContext>,
}

impl Trampoline {
    /// Allocate, prepare and seal a closure for `interface`
    ///
    /// On any failure the mapped region is released before returning.
    pub fn new(
        callee: CallableRef,
        interface: Arc<CallInterface>,
        policy: DispatchPolicy,
    ) -> Result<Self> {
        let construction = |reason: String| FfiError::TrampolineConstruction { reason };

        let context = Box::new(DispatchContext {
            interface,
            callee,
            gate: match policy {
                DispatchPolicy::Serialized => Some(ReentrantMutex::new(())),
                DispatchPolicy::Concurrent => None,
            },
        });

        let mut region = ExecRegion::map_writable(size_of::<ffi_closure>()).map_err(construction)?;
        let closure = region.as_ptr() as *mut ffi_closure;

        // SAFETY: the region is writable and large enough for a closure; the
        // cif and context are owned by the returned trampoline, which also
        // owns the region, so they outlive every call through it.
        let status = unsafe {
            raw::ffi_prep_closure_loc(
                closure,
                context.interface.raw_cif(),
                Some(dispatch),
                &*context as *const DispatchContext as *mut c_void,
                closure as *mut c_void,
            )
        };
        if status != raw::ffi_status_FFI_OK {
            return Err(construction(format!("ffi_prep_closure_loc returned {}", status)));
        }

        region.make_executable().map_err(construction)?;

        let trampoline = Self { region, context };
        stats::record_trampoline_created();
        log_trampoline_created(
            trampoline.code_ptr(),
            trampoline.context.callee.describe(),
            policy,
        );
        Ok(trampoline)
    }

    /// Native function pointer for this trampoline
    ///
    /// Valid only while the trampoline is alive: dropping it unmaps the code,
    /// so native code must not keep or call the pointer afterwards. Use
    /// [`leak`](Self::leak) for pointers that outlive this value.
    #[inline]
    pub fn code_ptr(&self) -> *const c_void {
        self.region.as_ptr() as *const c_void
    }

    /// Function pointer as an integer address, with the lifetime rules of
    /// [`code_ptr`](Self::code_ptr)
    #[inline]
    pub fn address(&self) -> usize {
        self.code_ptr() as usize
    }

    #[inline]
    pub fn interface(&self) -> &Arc<CallInterface> {
        &self.context.interface
    }

    #[inline]
    pub fn callee(&self) -> &CallableRef {
        &self.context.callee
    }

    /// Keep the trampoline alive for the rest of the process
    pub fn leak(self) -> *const c_void {
        let code = self.code_ptr();
        core::mem::forget(self);
        code
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        stats::record_trampoline_released();
        log_trampoline_released(self.code_ptr());
    }
}

impl core::fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trampoline")
            .field("code", &self.code_ptr())
            .field("interface", &self.context.interface.to_string())
            .field("callee", &self.context.callee)
            .finish()
    }
}
