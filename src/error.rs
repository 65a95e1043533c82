//! Error taxonomy for the foreign-call layer
//!
//! Every error is synchronous and reported to the immediate caller. Nothing
//! here is retried: a native call may already have had side effects by the
//! time a failure is observed.

use core::fmt;

/// Why a dynamic value could not be written into a native slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Value kind is incompatible with the declared native type
    Kind {
        expected: &'static str,
        found: &'static str,
    },
    /// Aggregate length differs from the struct descriptor's element count
    StructLength { expected: usize, found: usize },
    /// Numeric value does not fit the declared width
    OutOfRange { ty: &'static str, value: String },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            Self::StructLength { expected, found } => {
                write!(f, "struct element count mismatch: expected {}, found {}", expected, found)
            }
            Self::OutOfRange { ty, value } => {
                write!(f, "value {} out of range for {}", value, ty)
            }
        }
    }
}

/// Errors raised while describing, calling or exposing native functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfiError {
    /// Unknown or malformed type-description expression
    DescriptorResolution { expr: String },
    /// The ABI layer rejected the type sequence, or allocation failed
    InterfaceConstruction { reason: String },
    /// Declared and supplied argument counts differ
    ArityMismatch { expected: usize, found: usize },
    /// Dynamic value incompatible with its declared native type
    TypeMismatch(Mismatch),
    /// Native type with no dynamic representation in this position
    UnsupportedType { ty: String },
    /// Executable-memory allocation or closure preparation failed
    TrampolineConstruction { reason: String },
    /// A host callable reported failure
    HostCall { message: String },
}

impl FfiError {
    #[inline]
    pub(crate) fn kind_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch(Mismatch::Kind { expected, found })
    }

    #[inline]
    pub(crate) fn out_of_range(ty: &'static str, value: impl fmt::Display) -> Self {
        Self::TypeMismatch(Mismatch::OutOfRange {
            ty,
            value: value.to_string(),
        })
    }

    /// Stable category name, used as a structured log field
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DescriptorResolution { .. } => "descriptor_resolution",
            Self::InterfaceConstruction { .. } => "interface_construction",
            Self::ArityMismatch { .. } => "arity_mismatch",
            Self::TypeMismatch(_) => "type_mismatch",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::TrampolineConstruction { .. } => "trampoline_construction",
            Self::HostCall { .. } => "host_call",
        }
    }
}

impl fmt::Display for FfiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DescriptorResolution { expr } => write!(f, "unknown type {}", expr),
            Self::InterfaceConstruction { reason } => {
                write!(f, "cannot build call interface: {}", reason)
            }
            Self::ArityMismatch { expected, found } => {
                write!(f, "ffi arity mismatch: expected {}, got {}", expected, found)
            }
            Self::TypeMismatch(mismatch) => write!(f, "type mismatch: {}", mismatch),
            Self::UnsupportedType { ty } => write!(f, "unsupported native type {}", ty),
            Self::TrampolineConstruction { reason } => {
                write!(f, "cannot build trampoline: {}", reason)
            }
            Self::HostCall { message } => write!(f, "host callable failed: {}", message),
        }
    }
}

impl std::error::Error for FfiError {}

/// Result alias for foreign-call operations
pub type Result<T> = std::result::Result<T, FfiError>;
