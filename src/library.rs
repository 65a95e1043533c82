//! Dynamic library loading and symbol resolution
//!
//! Platform-agnostic wrapper around dlopen/LoadLibrary. Symbols come back as
//! untyped code pointers ready for [`CallInterface::call`](crate::CallInterface::call).

use core::ffi::c_void;
use core::fmt;
use core::ptr::NonNull;
use std::ffi::CString;

use crate::logging::log_library_loaded;

/// Handle to dynamically loaded library
pub struct Library {
    handle: NonNull<c_void>,
    path: String,
}

// SAFETY: loader handles are process-global and usable from any thread.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    /// Load a library by name or path
    ///
    /// Bare names use the platform search path. All symbols are bound
    /// immediately and kept local to this handle.
    pub fn open(path: &str) -> Result<Self, LoadError> {
        let cpath = CString::new(path).map_err(|_| LoadError::InvalidName)?;
        let handle = os::open(&cpath)?;
        log_library_loaded(path);
        Ok(Self {
            handle,
            path: path.to_string(),
        })
    }

    /// Get function pointer by symbol name
    pub fn symbol(&self, name: &str) -> Result<*const c_void, SymbolError> {
        let cname = CString::new(name).map_err(|_| SymbolError::InvalidName)?;
        os::symbol(self.handle.as_ptr(), &cname)
            .ok_or_else(|| SymbolError::NotFound(name.to_string()))
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        os::close(self.handle);
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

/// Look a symbol up among everything already loaded into the process
pub fn lookup_global(name: &str) -> Result<*const c_void, SymbolError> {
    let cname = CString::new(name).map_err(|_| SymbolError::InvalidName)?;
    os::global_symbol(&cname).ok_or_else(|| SymbolError::NotFound(name.to_string()))
}

#[cfg(unix)]
mod os {
    use super::LoadError;
    use core::ffi::c_void;
    use core::ptr::NonNull;
    use std::ffi::{CStr, CString};

    pub fn open(path: &CString) -> Result<NonNull<c_void>, LoadError> {
        // SAFETY: path is NUL-terminated; dlerror is read on the same thread.
        unsafe {
            let handle = libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
            NonNull::new(handle).ok_or_else(|| {
                let err = libc::dlerror();
                let msg = if !err.is_null() {
                    CStr::from_ptr(err).to_string_lossy().into_owned()
                } else {
                    "Unknown error".into()
                };
                LoadError::LoadFailed(msg)
            })
        }
    }

    pub fn symbol(handle: *mut c_void, name: &CString) -> Option<*const c_void> {
        // SAFETY: handle came from dlopen and is still open.
        let ptr = unsafe { libc::dlsym(handle, name.as_ptr()) };
        (!ptr.is_null()).then_some(ptr as *const c_void)
    }

    pub fn global_symbol(name: &CString) -> Option<*const c_void> {
        symbol(libc::RTLD_DEFAULT, name)
    }

    pub fn close(handle: NonNull<c_void>) {
        // SAFETY: handle came from dlopen and is closed exactly once.
        unsafe {
            libc::dlclose(handle.as_ptr());
        }
    }
}

#[cfg(windows)]
mod os {
    use super::LoadError;
    use core::ffi::c_void;
    use core::ptr::NonNull;
    use std::ffi::{CString, OsStr};
    use std::os::windows::ffi::OsStrExt;
    use winapi::shared::minwindef::HMODULE;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::{FreeLibrary, GetModuleHandleW, GetProcAddress, LoadLibraryW};

    pub fn open(path: &CString) -> Result<NonNull<c_void>, LoadError> {
        let wide: Vec<u16> = OsStr::new(&*path.to_string_lossy())
            .encode_wide()
            .chain(Some(0))
            .collect();

        // SAFETY: wide is NUL-terminated.
        unsafe {
            let handle = LoadLibraryW(wide.as_ptr());
            NonNull::new(handle as *mut c_void).ok_or_else(|| {
                LoadError::LoadFailed(format!("Error code: {}", GetLastError()))
            })
        }
    }

    pub fn symbol(handle: *mut c_void, name: &CString) -> Option<*const c_void> {
        // SAFETY: handle came from LoadLibraryW or GetModuleHandleW.
        let ptr = unsafe { GetProcAddress(handle as HMODULE, name.as_ptr()) };
        (!ptr.is_null()).then_some(ptr as *const c_void)
    }

    pub fn global_symbol(name: &CString) -> Option<*const c_void> {
        // SAFETY: a null name yields the executable's own module handle.
        let module = unsafe { GetModuleHandleW(core::ptr::null()) };
        if module.is_null() {
            return None;
        }
        symbol(module as *mut c_void, name)
    }

    pub fn close(handle: NonNull<c_void>) {
        // SAFETY: handle came from LoadLibraryW and is freed exactly once.
        unsafe {
            FreeLibrary(handle.as_ptr() as HMODULE);
        }
    }
}

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    InvalidName,
    LoadFailed(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid library name"),
            Self::LoadFailed(msg) => write!(f, "Failed to load library: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

/// Symbol lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    InvalidName,
    NotFound(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid symbol name"),
            Self::NotFound(name) => write!(f, "Symbol not found: {}", name),
        }
    }
}

impl std::error::Error for SymbolError {}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_global_lookup_finds_libc() {
        let strlen = lookup_global("strlen").unwrap();
        assert!(!strlen.is_null());
    }

    #[test]
    fn test_open_and_resolve() {
        let libc = Library::open("libc.so.6").unwrap();
        assert_eq!(libc.path(), "libc.so.6");
        assert!(!libc.symbol("abs").unwrap().is_null());
        assert_eq!(
            libc.symbol("no_such_symbol_here"),
            Err(SymbolError::NotFound("no_such_symbol_here".into()))
        );
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Library::open("libdefinitely-not-here.so"),
            Err(LoadError::LoadFailed(_))
        ));
        assert_eq!(Library::open("bad\0name").unwrap_err(), LoadError::InvalidName);
        assert_eq!(lookup_global("bad\0name"), Err(SymbolError::InvalidName));
    }
}
