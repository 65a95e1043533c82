//! Primitive type vocabulary
//!
//! The closed set of atomic tags hosts use to describe native types. The
//! tag spelling is a stable interchange contract.

use core::ffi::{c_int, c_long, c_schar, c_short};
use core::mem::size_of;
use libffi::middle::Type;

/// Atomic native type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Primitive {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Char,
    Short,
    Int,
    Long,
    UChar,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    LongDouble,
    Pointer,
}

/// How a primitive's bits are interpreted when marshalling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Void,
    /// Two's-complement integer of the given byte width
    Signed(usize),
    /// Unsigned integer of the given byte width
    Unsigned(usize),
    F32,
    F64,
    LongDouble,
    Pointer,
}

impl Primitive {
    pub const ALL: [Primitive; 21] = [
        Self::Void,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::UChar,
        Self::UShort,
        Self::UInt,
        Self::ULong,
        Self::Float,
        Self::Double,
        Self::LongDouble,
        Self::Pointer,
    ];

    /// Look up an atomic tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "void" => Self::Void,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "char" => Self::Char,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "uchar" => Self::UChar,
            "ushort" => Self::UShort,
            "uint" => Self::UInt,
            "ulong" => Self::ULong,
            "float" => Self::Float,
            "double" => Self::Double,
            "longdouble" => Self::LongDouble,
            "pointer" => Self::Pointer,
            _ => return None,
        })
    }

    /// Tag spelling
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::UChar => "uchar",
            Self::UShort => "ushort",
            Self::UInt => "uint",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "longdouble",
            Self::Pointer => "pointer",
        }
    }

    /// Bit interpretation, with C widths taken from the target platform
    pub const fn scalar(self) -> Scalar {
        match self {
            Self::Void => Scalar::Void,
            Self::Int8 => Scalar::Signed(1),
            Self::Int16 => Scalar::Signed(2),
            Self::Int32 => Scalar::Signed(4),
            Self::Int64 => Scalar::Signed(8),
            Self::UInt8 => Scalar::Unsigned(1),
            Self::UInt16 => Scalar::Unsigned(2),
            Self::UInt32 => Scalar::Unsigned(4),
            Self::UInt64 => Scalar::Unsigned(8),
            Self::Char => Scalar::Signed(size_of::<c_schar>()),
            Self::Short => Scalar::Signed(size_of::<c_short>()),
            Self::Int => Scalar::Signed(size_of::<c_int>()),
            Self::Long => Scalar::Signed(size_of::<c_long>()),
            Self::UChar => Scalar::Unsigned(size_of::<c_schar>()),
            Self::UShort => Scalar::Unsigned(size_of::<c_short>()),
            Self::UInt => Scalar::Unsigned(size_of::<c_int>()),
            Self::ULong => Scalar::Unsigned(size_of::<c_long>()),
            Self::Float => Scalar::F32,
            Self::Double => Scalar::F64,
            Self::LongDouble => Scalar::LongDouble,
            Self::Pointer => Scalar::Pointer,
        }
    }

    /// Check if type is integral
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(self.scalar(), Scalar::Signed(_) | Scalar::Unsigned(_))
    }

    /// Check if type is floating point
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self.scalar(), Scalar::F32 | Scalar::F64 | Scalar::LongDouble)
    }

    /// libffi's type for this tag
    pub fn ffi_type(self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::Int8 => Type::i8(),
            Self::Int16 => Type::i16(),
            Self::Int32 => Type::i32(),
            Self::Int64 => Type::i64(),
            Self::UInt8 => Type::u8(),
            Self::UInt16 => Type::u16(),
            Self::UInt32 => Type::u32(),
            Self::UInt64 => Type::u64(),
            Self::Char => Type::c_schar(),
            Self::Short => Type::c_short(),
            Self::Int => Type::c_int(),
            Self::Long => Type::c_long(),
            Self::UChar => Type::c_uchar(),
            Self::UShort => Type::c_ushort(),
            Self::UInt => Type::c_uint(),
            Self::ULong => Type::c_ulong(),
            Self::Float => Type::f32(),
            Self::Double => Type::f64(),
            Self::LongDouble => Type::longdouble(),
            Self::Pointer => Type::pointer(),
        }
    }

    /// Size and alignment from the platform ABI table
    pub fn layout(self) -> (usize, usize) {
        if self == Self::Void {
            // libffi describes void as a one-byte type; it has no storage.
            return (0, 1);
        }
        let ty = self.ffi_type();
        // SAFETY: primitive libffi types point at static, fully initialised
        // ffi_type records.
        unsafe {
            let raw = &*ty.as_raw_ptr();
            (raw.size, raw.alignment as usize)
        }
    }
}

impl core::fmt::Display for Primitive {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}
