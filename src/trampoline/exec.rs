//! Executable memory regions
//!
//! A region is mapped writable, filled, then flipped to read+execute. It is
//! never writable and executable at the same time. Release flips it back to
//! writable before unmapping.

use core::ptr::NonNull;

/// Page-backed region holding generated code
pub struct ExecRegion {
    start: NonNull<u8>,
    len: usize,
    executable: bool,
}

// SAFETY: the region is plain memory owned by this value.
unsafe impl Send for ExecRegion {}
unsafe impl Sync for ExecRegion {}

impl ExecRegion {
    /// Map a zero-filled, writable region of at least `len` bytes
    pub fn map_writable(len: usize) -> Result<Self, String> {
        let len = round_to_page(len.max(1));
        let start = os::map(len)?;
        Ok(Self {
            start,
            len,
            executable: false,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.start.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Transition writable → read+execute
    pub fn make_executable(&mut self) -> Result<(), String> {
        os::protect_exec(self.start, self.len)?;
        self.executable = true;
        Ok(())
    }
}

impl Drop for ExecRegion {
    fn drop(&mut self) {
        if self.executable {
            // A failed flip still unmaps below; the mapping disappears either way.
            let _ = os::protect_write(self.start, self.len);
            self.executable = false;
        }
        os::unmap(self.start, self.len);
    }
}

fn round_to_page(len: usize) -> usize {
    let page = os::page_size();
    len.div_ceil(page) * page
}

#[cfg(unix)]
mod os {
    use core::ptr::NonNull;

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions.
        match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
            n if n > 0 => n as usize,
            _ => 4096,
        }
    }

    pub fn map(len: usize) -> Result<NonNull<u8>, String> {
        // SAFETY: anonymous private mapping, no existing memory is touched.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(format!("mmap failed: {}", std::io::Error::last_os_error()));
        }
        NonNull::new(ptr as *mut u8).ok_or_else(|| "mmap returned null".to_string())
    }

    fn protect(start: NonNull<u8>, len: usize, prot: libc::c_int) -> Result<(), String> {
        // SAFETY: start/len describe a mapping created by `map`.
        if unsafe { libc::mprotect(start.as_ptr() as *mut libc::c_void, len, prot) } != 0 {
            return Err(format!("mprotect failed: {}", std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn protect_exec(start: NonNull<u8>, len: usize) -> Result<(), String> {
        protect(start, len, libc::PROT_READ | libc::PROT_EXEC)
    }

    pub fn protect_write(start: NonNull<u8>, len: usize) -> Result<(), String> {
        protect(start, len, libc::PROT_READ | libc::PROT_WRITE)
    }

    pub fn unmap(start: NonNull<u8>, len: usize) {
        // SAFETY: start/len describe a mapping created by `map`.
        unsafe {
            libc::munmap(start.as_ptr() as *mut libc::c_void, len);
        }
    }
}

#[cfg(windows)]
mod os {
    use core::ptr::NonNull;
    use winapi::shared::minwindef::DWORD;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree, VirtualProtect};
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
    use winapi::um::winnt::{
        MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READ, PAGE_READWRITE,
    };

    pub fn page_size() -> usize {
        // SAFETY: GetSystemInfo fills the provided struct.
        unsafe {
            let mut info: SYSTEM_INFO = core::mem::zeroed();
            GetSystemInfo(&mut info);
            info.dwPageSize as usize
        }
    }

    pub fn map(len: usize) -> Result<NonNull<u8>, String> {
        // SAFETY: fresh reservation, no existing memory is touched.
        let ptr = unsafe {
            VirtualAlloc(core::ptr::null_mut(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE)
        };
        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| format!("VirtualAlloc failed: {}", std::io::Error::last_os_error()))
    }

    fn protect(start: NonNull<u8>, len: usize, prot: DWORD) -> Result<(), String> {
        let mut old: DWORD = 0;
        // SAFETY: start/len describe an allocation created by `map`.
        if unsafe { VirtualProtect(start.as_ptr() as *mut _, len, prot, &mut old) } == 0 {
            return Err(format!("VirtualProtect failed: {}", std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn protect_exec(start: NonNull<u8>, len: usize) -> Result<(), String> {
        protect(start, len, PAGE_EXECUTE_READ)
    }

    pub fn protect_write(start: NonNull<u8>, len: usize) -> Result<(), String> {
        protect(start, len, PAGE_READWRITE)
    }

    pub fn unmap(start: NonNull<u8>, _len: usize) {
        // SAFETY: start is the base of an allocation created by `map`.
        unsafe {
            VirtualFree(start.as_ptr() as *mut _, 0, MEM_RELEASE);
        }
    }
}
