// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named POSIX counting semaphores (sem_open family).
//
// These are kernel-persistent objects shared across address spaces; they are
// the only blocking primitive in the facility. A pthread condition variable
// in private memory cannot wake a waiter in another process, so everything
// (per-queue mutex, not-full, not-empty, segment mutex) is a semaphore.

use std::ffi::CString;
use std::io;

/// A named, inter-process counting semaphore.
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String, // POSIX name (with leading '/')
}

// sem_t handles may be used from any thread of the opening process.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Exclusively create a named semaphore with `initial` tokens.
    ///
    /// Fails with `EEXIST` if the name is taken. Callers that must survive
    /// stale objects from a crashed peer unlink first (`create_fresh`).
    pub fn create(posix_name: &str, initial: u32) -> io::Result<Self> {
        Self::do_open(
            posix_name,
            libc::O_CREAT | libc::O_EXCL,
            initial,
        )
    }

    /// Unlink any stale object under this name, then create it anew.
    pub fn create_fresh(posix_name: &str, initial: u32) -> io::Result<Self> {
        Self::unlink_by_name(posix_name);
        Self::create(posix_name, initial)
    }

    /// Open an existing named semaphore.
    ///
    /// Fails with `ENOENT` if no such semaphore exists.
    pub fn open(posix_name: &str) -> io::Result<Self> {
        Self::do_open(posix_name, 0, 0)
    }

    fn do_open(posix_name: &str, oflag: libc::c_int, initial: u32) -> io::Result<Self> {
        let c_name = CString::new(posix_name.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                oflag,
                0o666 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            sem,
            name: posix_name.to_string(),
        })
    }

    /// POSIX name (with leading '/').
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take one token, blocking until available.
    ///
    /// With `timeout_ms` set, returns `Ok(false)` if the deadline passes
    /// before a token arrives. `EINTR` is retried.
    pub fn wait(&self, timeout_ms: Option<u64>) -> io::Result<bool> {
        match timeout_ms {
            None => loop {
                let ret = unsafe { libc::sem_wait(self.sem) };
                if ret == 0 {
                    return Ok(true);
                }
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EINTR) {
                    return Err(err);
                }
            },
            Some(ms) => self.wait_timeout(ms),
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn wait_timeout(&self, timeout_ms: u64) -> io::Result<bool> {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        let ns_total = ts.tv_nsec as u64 + (timeout_ms % 1000) * 1_000_000;
        ts.tv_sec +=
            (timeout_ms / 1000) as libc::time_t + (ns_total / 1_000_000_000) as libc::time_t;
        ts.tv_nsec = (ns_total % 1_000_000_000) as libc::c_long;
        loop {
            let ret = unsafe { libc::sem_timedwait(self.sem, &ts) };
            if ret == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn wait_timeout(&self, timeout_ms: u64) -> io::Result<bool> {
        // macOS lacks sem_timedwait — emulate via try_wait polling with
        // adaptive backoff (pause → yield → sleep).
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        let mut k = 0u32;
        loop {
            if self.try_wait()? {
                return Ok(true);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            backoff(&mut k);
        }
    }

    /// Take one token without blocking. Returns `Ok(false)` if none available.
    pub fn try_wait(&self) -> io::Result<bool> {
        let ret = unsafe { libc::sem_trywait(self.sem) };
        if ret == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(false),
            _ => Err(err),
        }
    }

    /// Release `count` tokens, waking up to that many waiters.
    pub fn post(&self, count: u32) -> io::Result<()> {
        for _ in 0..count {
            let ret = unsafe { libc::sem_post(self.sem) };
            if ret != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Remove the kernel object. Open handles stay usable until closed.
    pub fn unlink_by_name(posix_name: &str) {
        if let Ok(c_name) = CString::new(posix_name.as_bytes()) {
            unsafe { libc::sem_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_close(self.sem) };
    }
}

/// Adaptive backoff: busy spin → CPU pause → yield → sleep.
#[cfg(target_os = "macos")]
fn backoff(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}
