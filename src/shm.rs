// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX shared-memory mapping (shm_open + mmap).
//
// Lifecycle is server-owned: `create` is exclusive and sizes the object,
// `open` attaches to an existing object, `Drop` only unmaps. Removal of the
// kernel object happens solely through `unlink`, driven by the facility's
// destroy path. Callers pass ready-made POSIX object names (leading '/',
// derived in the names module).

use std::ffi::CString;
use std::io;
use std::ptr;

/// A mapped POSIX shared-memory object.
pub struct SharedMem {
    mem: *mut u8,
    size: usize,
    name: String, // POSIX name (with leading '/')
}

// The mapping is process-shared by design; all access is synchronized by
// the facility's named semaphores.
unsafe impl Send for SharedMem {}
unsafe impl Sync for SharedMem {}

impl SharedMem {
    /// Exclusively create a named segment of `size` bytes and map it RW.
    ///
    /// The fresh object is zero-filled by the kernel after `ftruncate`.
    /// Fails with `EEXIST` (kind `AlreadyExists`) if the object exists.
    pub fn create(posix_name: &str, size: usize) -> io::Result<Self> {
        let c_name = c_name(posix_name)?;
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }

        let perms: libc::mode_t = 0o666;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                perms as libc::c_uint,
            )
        };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        unsafe { libc::fchmod(fd, perms) };

        let ret = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if ret != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        Self::mmap_and_finish(fd, size, posix_name.to_string())
    }

    /// Open an existing named segment of `size` bytes and map it RW.
    ///
    /// Fails with `ENOENT` (kind `NotFound`) if the object does not exist.
    pub fn open(posix_name: &str, size: usize) -> io::Result<Self> {
        let c_name = c_name(posix_name)?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666 as libc::c_uint) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }

        Self::mmap_and_finish(fd, size, posix_name.to_string())
    }

    fn mmap_and_finish(fd: i32, size: usize, posix_name: String) -> io::Result<Self> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            mem: mem as *mut u8,
            size,
            name: posix_name,
        })
    }

    /// Base pointer of the mapping.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// POSIX name (with leading '/').
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the kernel object. Existing mappings stay valid until unmapped.
    pub fn unlink(&self) {
        if let Ok(c_name) = CString::new(self.name.as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for SharedMem {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
    }
}

fn c_name(posix_name: &str) -> io::Result<CString> {
    CString::new(posix_name.as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}
