//! Typthon FFI - foreign-function marshalling for the Typthon runtime
//!
//! This crate lets host code describe native signatures with a small type
//! vocabulary, call arbitrary native functions through them, and expose
//! host callables as native function pointers.
//!
//! Pipeline: [`TypeResolver`] turns type expressions into layouts,
//! [`CallInterface`] prepares a libffi call plan, [`marshal`] moves
//! [`Value`]s in and out of native memory, [`CallInterface::call`] performs
//! the call and [`Trampoline`] routes native call-ins back to the host.

pub mod call;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod interface;
pub mod library;
pub mod logging;
pub mod marshal;
pub mod stats;
pub mod trampoline;
pub mod types;
pub mod value;

// Re-export core types
pub use config::{DispatchPolicy, FfiConfig};
pub use context::{default_context, FfiContext};
pub use error::{FfiError, Mismatch, Result};
pub use interface::CallInterface;
pub use library::{lookup_global, Library, LoadError, SymbolError};
pub use stats::{stats, InteropStats};
pub use trampoline::{CallableRef, FunctionRegistry, HostCallable, Trampoline};
pub use types::{Primitive, TypeDescriptor, TypeExpr, TypeResolver};
pub use value::Value;

/// Initialize logging from `TYPTHON_FFI_*` environment variables
pub fn init() {
    logging::init();
}

/// Initialize logging from a loaded configuration
pub fn init_with_config(config: &FfiConfig) {
    logging::init_with_config(logging::LogConfig::from_settings(&config.log));
}

/// C entry point for embedding runtimes
#[no_mangle]
pub extern "C" fn typthon_ffi_init() {
    init();
}
