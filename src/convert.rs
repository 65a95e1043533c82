//! Boundary conversions for native addresses
//!
//! Both conversions accept anything [`Value::as_address`] understands, so a
//! pointer returned from a native call can be passed straight through.

use std::ffi::CStr;

use crate::error::{FfiError, Result};
use crate::value::Value;

/// Copy the NUL-terminated string at `addr` into a text value
///
/// A null address yields `Nil`.
///
/// # Safety
/// A non-null `addr` must point to a readable NUL-terminated string.
pub unsafe fn address_to_text(addr: usize) -> Value {
    if addr == 0 {
        return Value::Nil;
    }
    Value::Text(CStr::from_ptr(addr as *const core::ffi::c_char).to_owned())
}

/// The raw bytes of the address itself, in native byte order
///
/// Nothing is read from the memory the address points at.
pub fn address_to_bytes(addr: usize) -> Value {
    Value::Bytes(addr.to_ne_bytes().to_vec())
}

/// [`address_to_text`] for a dynamic value holding an address
///
/// # Safety
/// Same as [`address_to_text`].
pub unsafe fn value_to_text(value: &Value) -> Result<Value> {
    Ok(address_to_text(address_of(value)?))
}

/// [`address_to_bytes`] for a dynamic value holding an address
pub fn value_to_bytes(value: &Value) -> Result<Value> {
    Ok(address_to_bytes(address_of(value)?))
}

fn address_of(value: &Value) -> Result<usize> {
    value
        .as_address()
        .ok_or_else(|| FfiError::kind_mismatch("address", value.kind_name()))
}
