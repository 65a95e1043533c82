//! Dynamic values crossing the host/native boundary
//!
//! Design: a closed enum mirroring what the host runtime can hand us. Text
//! is kept NUL-terminated so its storage can be passed as `const char*`
//! without copying.

use std::ffi::CString;
use std::fmt;

/// Host-side dynamic value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Marshals to (and only to) a null pointer
    Nil,
    /// Integer wide enough for the full signed and unsigned 64-bit ranges
    Integer(i128),
    Float(f64),
    /// Raw byte buffer
    Bytes(Vec<u8>),
    /// NUL-terminated text
    Text(CString),
    /// Fixed-length ordered aggregate (struct representation)
    Struct(Vec<Value>),
    /// Opaque native address
    Address(usize),
}

impl Value {
    /// Build a text value, `None` if `s` holds an interior NUL
    pub fn text(s: impl Into<Vec<u8>>) -> Option<Self> {
        CString::new(s).ok().map(Self::Text)
    }

    /// Value kind name (for error messages)
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Struct(_) => "struct",
            Self::Address(_) => "address",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Native address a value designates, if it designates one
    pub fn as_address(&self) -> Option<usize> {
        match self {
            Self::Nil => Some(0),
            Self::Address(addr) => Some(*addr),
            Self::Integer(v) => isize::try_from(*v)
                .map(|v| v as usize)
                .or_else(|_| usize::try_from(*v))
                .ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bytes(b) => write!(f, "#<bytes {}>", b.len()),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Struct(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Address(addr) => write!(f, "#<address {:#x}>", addr),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            #[inline]
            fn from(v: $t) -> Self {
                Self::Integer(v as i128)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<CString> for Value {
    #[inline]
    fn from(v: CString) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(v: Vec<Value>) -> Self {
        Self::Struct(v)
    }
}
