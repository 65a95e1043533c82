//! Type marshaling - dynamic values ↔ native memory
//!
//! Design: exhaustive dispatch over the resolved descriptor. Numeric values
//! are narrowed only by the explicit rules below; everything else that does
//! not match the declared type is a `TypeMismatch`.
//!
//! Integral narrowing fails closed: an N-bit slot accepts integers in
//! `[-2^(N-1), 2^N - 1]`, i.e. anything whose bit pattern fits once signed
//! and unsigned readings are both allowed.

pub mod longdouble;


use core::ptr;

use libffi::raw::ffi_arg;

use crate::error::{FfiError, Mismatch, Result};
use crate::types::{Primitive, Scalar, Shape, TypeDescriptor};
use crate::value::Value;
use longdouble::LongDoubleFormat;

/// Marshal a dynamic value into native memory
///
/// # Safety
/// `dst` must be valid for writes of `ty.size()` bytes. Pointers written for
/// `Bytes`/`Text` values borrow `value`'s storage and are only valid while
/// `value` is alive and unmodified.
pub unsafe fn to_native(ty: &TypeDescriptor, value: &Value, dst: *mut u8) -> Result<()> {
    match ty.shape() {
        Shape::Primitive(p) => write_primitive(*p, ty.size(), value, dst),
        Shape::Struct { elements, offsets } => {
            let items = match value {
                Value::Struct(items) => items,
                other => return Err(FfiError::kind_mismatch("struct", other.kind_name())),
            };
            if items.len() != elements.len() {
                return Err(FfiError::TypeMismatch(Mismatch::StructLength {
                    expected: elements.len(),
                    found: items.len(),
                }));
            }
            for ((element, offset), item) in elements.iter().zip(offsets).zip(items) {
                to_native(element, item, dst.add(*offset))?;
            }
            Ok(())
        }
    }
}

/// Convert native memory back into a dynamic value
///
/// # Safety
/// `src` must be valid for reads of `ty.size()` bytes.
pub unsafe fn from_native(ty: &TypeDescriptor, src: *const u8) -> Result<Value> {
    match ty.shape() {
        Shape::Primitive(p) => read_primitive(*p, ty.size(), src),
        Shape::Struct { elements, offsets } => elements
            .iter()
            .zip(offsets)
            .map(|(element, offset)| from_native(element, src.add(*offset)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Struct),
    }
}

/// Read a return value from a libffi return slot
///
/// libffi widens integral returns narrower than `ffi_arg` to a full word.
///
/// # Safety
/// `src` must be valid for reads of `max(ty.size(), size_of::<ffi_arg>())`
/// bytes and aligned for `ffi_arg`.
pub unsafe fn from_return_slot(ty: &TypeDescriptor, src: *const u8) -> Result<Value> {
    if !ty.is_narrow_integral() {
        return from_native(ty, src);
    }
    let word = ptr::read(src as *const ffi_arg) as u64;
    Ok(Value::Integer(match ty.as_primitive().map(Primitive::scalar) {
        Some(Scalar::Signed(1)) => word as u8 as i8 as i128,
        Some(Scalar::Signed(2)) => word as u16 as i16 as i128,
        Some(Scalar::Signed(4)) => word as u32 as i32 as i128,
        Some(Scalar::Unsigned(1)) => word as u8 as i128,
        Some(Scalar::Unsigned(2)) => word as u16 as i128,
        Some(Scalar::Unsigned(4)) => word as u32 as i128,
        _ => unreachable!("narrow integral without narrow width"),
    }))
}

/// Write a return value into a libffi return slot, widening narrow integrals
///
/// # Safety
/// Same requirements as [`from_return_slot`], for writes.
pub unsafe fn to_return_slot(ty: &TypeDescriptor, value: &Value, dst: *mut u8) -> Result<()> {
    let p = match ty.as_primitive() {
        Some(p) if ty.is_narrow_integral() => p,
        _ => return to_native(ty, value, dst),
    };
    let word = match p.scalar() {
        Scalar::Signed(width) => {
            let shift = 64 - width as u32 * 8;
            (((integral_bits(p, width, value)? << shift) as i64) >> shift) as u64
        }
        Scalar::Unsigned(width) => {
            integral_bits(p, width, value)? & (u64::MAX >> (64 - width as u32 * 8))
        }
        _ => unreachable!("narrow integral without integral scalar"),
    };
    ptr::write(dst as *mut ffi_arg, word as ffi_arg);
    Ok(())
}

/// Validate an integer for an integral slot and return its two's-complement bits
fn integral_bits(p: Primitive, width: usize, value: &Value) -> Result<u64> {
    let v = match value {
        Value::Integer(v) => *v,
        other => return Err(FfiError::kind_mismatch("integer", other.kind_name())),
    };
    let bits = width as u32 * 8;
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << bits) - 1;
    if v < min || v > max {
        return Err(FfiError::out_of_range(p.tag(), v));
    }
    Ok(v as u64)
}

fn float_value(value: &Value) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| FfiError::kind_mismatch("number", value.kind_name()))
}

fn pointer_value(value: &Value) -> Result<usize> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.as_ptr() as usize),
        Value::Text(text) => Ok(text.as_ptr() as usize),
        Value::Integer(v) => value
            .as_address()
            .ok_or_else(|| FfiError::out_of_range(Primitive::Pointer.tag(), v)),
        Value::Nil => Ok(0),
        Value::Address(addr) => Ok(*addr),
        other => Err(FfiError::kind_mismatch("pointer", other.kind_name())),
    }
}

unsafe fn write_primitive(p: Primitive, size: usize, value: &Value, dst: *mut u8) -> Result<()> {
    match p.scalar() {
        Scalar::Void => {}
        Scalar::Signed(width) | Scalar::Unsigned(width) => {
            let bits = integral_bits(p, width, value)?;
            match width {
                1 => ptr::write_unaligned(dst, bits as u8),
                2 => ptr::write_unaligned(dst as *mut u16, bits as u16),
                4 => ptr::write_unaligned(dst as *mut u32, bits as u32),
                8 => ptr::write_unaligned(dst as *mut u64, bits),
                _ => return Err(FfiError::UnsupportedType { ty: p.tag().into() }),
            }
        }
        Scalar::F32 => {
            let v = float_value(value)?;
            let narrowed = v as f32;
            if v.is_finite() && narrowed.is_infinite() {
                return Err(FfiError::out_of_range(p.tag(), v));
            }
            ptr::write_unaligned(dst as *mut f32, narrowed);
        }
        Scalar::F64 => ptr::write_unaligned(dst as *mut f64, float_value(value)?),
        Scalar::LongDouble => {
            let v = float_value(value)?;
            match longdouble::format_for_size(size) {
                Some(LongDoubleFormat::Double) => ptr::write_unaligned(dst as *mut f64, v),
                Some(LongDoubleFormat::X87Extended) => {
                    ptr::write_bytes(dst, 0, size);
                    ptr::copy_nonoverlapping(longdouble::to_x87(v).as_ptr(), dst, 10);
                }
                Some(LongDoubleFormat::Quad) => {
                    ptr::copy_nonoverlapping(longdouble::to_quad(v).as_ptr(), dst, 16);
                }
                None => return Err(FfiError::UnsupportedType { ty: p.tag().into() }),
            }
        }
        Scalar::Pointer => {
            ptr::write_unaligned(dst as *mut usize, pointer_value(value)?);
        }
    }
    Ok(())
}

unsafe fn read_primitive(p: Primitive, size: usize, src: *const u8) -> Result<Value> {
    Ok(match p.scalar() {
        Scalar::Void => Value::Nil,
        Scalar::Signed(1) => Value::Integer(ptr::read_unaligned(src as *const i8) as i128),
        Scalar::Signed(2) => Value::Integer(ptr::read_unaligned(src as *const i16) as i128),
        Scalar::Signed(4) => Value::Integer(ptr::read_unaligned(src as *const i32) as i128),
        Scalar::Signed(8) => Value::Integer(ptr::read_unaligned(src as *const i64) as i128),
        Scalar::Unsigned(1) => Value::Integer(ptr::read_unaligned(src) as i128),
        Scalar::Unsigned(2) => Value::Integer(ptr::read_unaligned(src as *const u16) as i128),
        Scalar::Unsigned(4) => Value::Integer(ptr::read_unaligned(src as *const u32) as i128),
        Scalar::Unsigned(8) => Value::Integer(ptr::read_unaligned(src as *const u64) as i128),
        Scalar::Signed(_) | Scalar::Unsigned(_) => {
            return Err(FfiError::UnsupportedType { ty: p.tag().into() })
        }
        Scalar::F32 => Value::Float(ptr::read_unaligned(src as *const f32) as f64),
        Scalar::F64 => Value::Float(ptr::read_unaligned(src as *const f64)),
        Scalar::LongDouble => match longdouble::format_for_size(size) {
            Some(LongDoubleFormat::Double) => Value::Float(ptr::read_unaligned(src as *const f64)),
            Some(LongDoubleFormat::X87Extended) => {
                Value::Float(longdouble::from_x87(&ptr::read_unaligned(src as *const [u8; 10])))
            }
            Some(LongDoubleFormat::Quad) => {
                Value::Float(longdouble::from_quad(&ptr::read_unaligned(src as *const [u8; 16])))
            }
            None => return Err(FfiError::UnsupportedType { ty: p.tag().into() }),
        },
        Scalar::Pointer => match ptr::read_unaligned(src as *const usize) {
            0 => Value::Nil,
            addr => Value::Address(addr),
        },
    })
}
