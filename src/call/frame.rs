//! Per-call scratch buffers
//!
//! One frame holds every argument buffer plus the return buffer. It lives on
//! the caller's stack for small signatures and is released on every exit
//! path, including marshalling errors.

use core::ffi::c_void;
use core::mem::size_of;
use std::sync::Arc;

use libffi::raw::ffi_arg;
use smallvec::{smallvec, SmallVec};

use crate::types::TypeDescriptor;

/// 16-byte aligned storage unit (covers `long double` and vector-aligned structs)
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Slot([u8; 16]);

const SLOT: usize = size_of::<Slot>();

#[inline]
fn slots_for(size: usize) -> usize {
    size.div_ceil(SLOT).max(1)
}

/// Argument and return buffers for one native call
pub(crate) struct CallFrame {
    storage: SmallVec<[Slot; 8]>,
    /// Slot index of each argument buffer
    arg_slots: SmallVec<[usize; 8]>,
    ret_slot: usize,
}

impl CallFrame {
    /// Lay out zeroed buffers for `args` and a return value of type `ret`
    ///
    /// The return buffer is never smaller than `ffi_arg`, since libffi
    /// widens narrow integral returns to a full word.
    pub(crate) fn new(args: &[Arc<TypeDescriptor>], ret: &TypeDescriptor) -> Self {
        let mut arg_slots = SmallVec::with_capacity(args.len());
        let mut next = 0;
        for arg in args {
            arg_slots.push(next);
            next += slots_for(arg.size());
        }
        let ret_slot = next;
        next += slots_for(ret.size().max(size_of::<ffi_arg>()));

        Self {
            storage: smallvec![Slot([0; SLOT]); next],
            arg_slots,
            ret_slot,
        }
    }

    #[inline]
    pub(crate) fn arg_ptr(&mut self, index: usize) -> *mut u8 {
        let slot = self.arg_slots[index];
        self.storage[slot..].as_mut_ptr() as *mut u8
    }

    #[inline]
    pub(crate) fn ret_ptr(&mut self) -> *mut u8 {
        let slot = self.ret_slot;
        self.storage[slot..].as_mut_ptr() as *mut u8
    }

    /// Argument buffer addresses in declared order, as libffi expects
    ///
    /// The addresses stay valid until the frame is dropped or moved.
    pub(crate) fn arg_pointers(&mut self) -> SmallVec<[*mut c_void; 8]> {
        let base = self.storage.as_mut_ptr();
        self.arg_slots
            .iter()
            // SAFETY: every slot index was allocated in `new`.
            .map(|&slot| unsafe { base.add(slot) } as *mut c_void)
            .collect()
    }
}
