//! Call interfaces - reusable argument/return signatures with a libffi plan
//!
//! The libffi `ffi_cif` header points into its own argument-type array. Both
//! live in one boxed block that never moves while the interface exists, and
//! the header pointer is checked against the block's current array address
//! every time the raw cif is handed out.

use core::cell::UnsafeCell;
use core::fmt;
use std::sync::Arc;

use libffi::low;
use libffi::middle::Type;
use libffi::raw::{ffi_cif, ffi_type};

use crate::error::{FfiError, Result};
use crate::logging::log_interface_built;
use crate::types::{TypeDescriptor, TypeExpr, TypeResolver};

/// cif header plus the argument-type array it refers to
struct CifBlock {
    cif: UnsafeCell<ffi_cif>,
    arg_types: Box<[*mut ffi_type]>,
}

/// Immutable call signature
pub struct CallInterface {
    args: Vec<Arc<TypeDescriptor>>,
    ret: Arc<TypeDescriptor>,
    block: Box<CifBlock>,
    // Owners of the libffi type trees referenced from `block`.
    _ffi_args: Vec<Type>,
    _ffi_ret: Type,
}

// SAFETY: after construction the cif and the type trees it references are
// never written again; libffi only reads them during calls and closures.
unsafe impl Send for CallInterface {}
unsafe impl Sync for CallInterface {}

impl CallInterface {
    /// Build from resolved descriptors under the default calling convention
    pub fn new(args: Vec<Arc<TypeDescriptor>>, ret: Arc<TypeDescriptor>) -> Result<Self> {
        if let Some(void_arg) = args.iter().position(|a| a.is_void()) {
            return Err(FfiError::InterfaceConstruction {
                reason: format!("argument {} has type void", void_arg),
            });
        }

        let ffi_args: Vec<Type> = args.iter().map(|a| a.ffi_type()).collect();
        let ffi_ret = ret.ffi_type();
        let arg_types: Box<[*mut ffi_type]> = ffi_args.iter().map(Type::as_raw_ptr).collect();

        let mut block = Box::new(CifBlock {
            cif: UnsafeCell::new(Default::default()),
            arg_types,
        });

        let block_ref = &mut *block;
        // SAFETY: the cif, return type and argument array all outlive the
        // interface; libffi only stores pointers to them.
        unsafe {
            low::prep_cif(
                block_ref.cif.get(),
                low::ffi_abi_FFI_DEFAULT_ABI,
                block_ref.arg_types.len(),
                ffi_ret.as_raw_ptr(),
                block_ref.arg_types.as_mut_ptr(),
            )
        }
        .map_err(|e| FfiError::InterfaceConstruction {
            reason: format!("{:?}", e),
        })?;

        let interface = Self {
            args,
            ret,
            block,
            _ffi_args: ffi_args,
            _ffi_ret: ffi_ret,
        };
        log_interface_built(&interface.to_string(), interface.arity());
        Ok(interface)
    }

    /// Resolve expressions, then build
    pub fn from_exprs(resolver: &TypeResolver, args: &[TypeExpr], ret: &TypeExpr) -> Result<Self> {
        let ret = resolver.resolve(ret)?;
        let args = args
            .iter()
            .map(|a| resolver.resolve(a))
            .collect::<Result<Vec<_>>>()?;
        Self::new(args, ret)
    }

    /// Declared argument count
    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn arg_types(&self) -> &[Arc<TypeDescriptor>] {
        &self.args
    }

    #[inline]
    pub fn return_type(&self) -> &Arc<TypeDescriptor> {
        &self.ret
    }

    /// Raw cif for libffi
    ///
    /// The returned pointer is valid for as long as `self` is. libffi only
    /// reads through it.
    pub(crate) fn raw_cif(&self) -> *mut ffi_cif {
        let block = &*self.block;
        let cif = block.cif.get();
        // SAFETY: the cif was initialised by prep_cif and is never written
        // after construction.
        debug_assert_eq!(
            unsafe { (*cif).arg_types } as *const *mut ffi_type,
            block.arg_types.as_ptr(),
            "cif argument array detached from its block"
        );
        cif
    }
}

impl fmt::Display for CallInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

impl fmt::Debug for CallInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallInterface {}", self)
    }
}
