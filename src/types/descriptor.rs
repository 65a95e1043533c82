//! Resolved native type descriptors
//!
//! Size, alignment and struct element offsets always come from libffi.
//! Descriptors are immutable once built and shared through `Arc`.

use std::sync::Arc;

use libffi::middle::Type;
use libffi::raw;

use super::primitive::{Primitive, Scalar};
use crate::error::{FfiError, Result};

/// Primitive tag or ordered struct layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Primitive(Primitive),
    Struct {
        elements: Vec<Arc<TypeDescriptor>>,
        /// Byte offset of each element, as laid out by libffi
        offsets: Vec<usize>,
    },
}

/// Native type layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    shape: Shape,
    size: usize,
    align: usize,
}

impl TypeDescriptor {
    /// Descriptor for an atomic tag
    pub fn primitive(primitive: Primitive) -> Self {
        let (size, align) = primitive.layout();
        Self {
            shape: Shape::Primitive(primitive),
            size,
            align,
        }
    }

    /// Descriptor for `struct(elements...)`, laid out by libffi
    pub fn structure(elements: Vec<Arc<TypeDescriptor>>) -> Result<Self> {
        let layout_error = |elements: &[Arc<TypeDescriptor>]| FfiError::DescriptorResolution {
            expr: describe_struct(elements),
        };

        if elements.is_empty() || elements.iter().any(|e| e.is_void()) {
            return Err(layout_error(&elements));
        }

        let ffi_type = Type::structure(elements.iter().map(|e| e.ffi_type()));
        let raw_type = ffi_type.as_raw_ptr();
        let mut offsets = vec![0usize; elements.len()];

        // SAFETY: raw_type is a live struct type owned by ffi_type, and
        // offsets has exactly one slot per element.
        let status = unsafe {
            raw::ffi_get_struct_offsets(
                raw::ffi_abi_FFI_DEFAULT_ABI,
                raw_type,
                offsets.as_mut_ptr(),
            )
        };
        if status != raw::ffi_status_FFI_OK {
            return Err(layout_error(&elements));
        }

        // SAFETY: ffi_get_struct_offsets initialised size and alignment.
        let (size, align) = unsafe { ((*raw_type).size, (*raw_type).alignment as usize) };

        Ok(Self {
            shape: Shape::Struct { elements, offsets },
            size,
            align,
        })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Primitive tag, if this is not a struct
    #[inline]
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.shape {
            Shape::Primitive(p) => Some(p),
            Shape::Struct { .. } => None,
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(Primitive::Void)
    }

    /// Struct elements (empty for primitives)
    pub fn elements(&self) -> &[Arc<TypeDescriptor>] {
        match &self.shape {
            Shape::Struct { elements, .. } => elements,
            Shape::Primitive(_) => &[],
        }
    }

    /// Struct element offsets (empty for primitives)
    pub fn offsets(&self) -> &[usize] {
        match &self.shape {
            Shape::Struct { offsets, .. } => offsets,
            Shape::Primitive(_) => &[],
        }
    }

    /// Integral primitive narrower than a full return word
    pub(crate) fn is_narrow_integral(&self) -> bool {
        match self.as_primitive().map(Primitive::scalar) {
            Some(Scalar::Signed(w) | Scalar::Unsigned(w)) => {
                w < core::mem::size_of::<raw::ffi_arg>()
            }
            _ => false,
        }
    }

    /// Build a fresh libffi type tree mirroring this descriptor
    pub fn ffi_type(&self) -> Type {
        match &self.shape {
            Shape::Primitive(p) => p.ffi_type(),
            Shape::Struct { elements, .. } => {
                Type::structure(elements.iter().map(|e| e.ffi_type()))
            }
        }
    }
}

impl core::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.shape {
            Shape::Primitive(p) => write!(f, "{}", p),
            Shape::Struct { elements, .. } => f.write_str(&describe_struct(elements)),
        }
    }
}

fn describe_struct(elements: &[Arc<TypeDescriptor>]) -> String {
    let inner: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
    format!("struct({})", inner.join(", "))
}
