// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The message facility: public API over the segment, directory, arena and
// ring layers, plus the cross-process semaphore protocol.
//
// Locking model:
//   - segment mutex     guards the header table and info block
//     (attach/detach counters, create/remove/name lookups, status).
//   - per-queue mutex   guards one queue's header fields and body.
//   - not_full/not_empty are counting semaphores; a blocked sender or
//     receiver waits on them with no mutex held, then re-acquires and
//     re-checks (wakeups may be spurious in the sense that another peer
//     got there first).
//
// remove_queue nests the queue mutex inside the segment mutex; send and
// receive only ever take the queue mutex, so the nesting cannot deadlock.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::arena;
use crate::config::Config;
use crate::directory;
use crate::error::{Error, Result};
use crate::layout::{MAX_DATALEN, MAX_MQSIZE_KIB, MAX_NAME, MIN_DATALEN, MIN_MQSIZE_KIB};
use crate::names::{self, SemRole};
use crate::ring::{self, Pop, Push, RingCursor};
use crate::segment::{Segment, SegmentStatus};
use crate::sem::NamedSemaphore;

/// Which side of the deployment this handle plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Server,
    Client,
}

/// The three named semaphores of one queue.
struct SemTriple {
    mutex: NamedSemaphore,
    not_full: NamedSemaphore,
    not_empty: NamedSemaphore,
}

/// A handle to the message facility.
///
/// The server process creates the deployment with [`Facility::init`] and
/// tears it down with [`Facility::destroy`]; client processes join with
/// [`Facility::attach`] and leave with [`Facility::detach`]. All queue
/// operations are available on any handle. `send` and `receive` block until
/// they can succeed; receivers should pass a buffer of at least
/// [`MAX_DATALEN`] bytes, since longer messages are truncated to the buffer
/// and the remainder is dropped.
pub struct Facility {
    cfg: Config,
    seg: Segment,
    seg_sem: NamedSemaphore,
    role: Role,
    detached: AtomicBool,
    triples: Mutex<HashMap<u32, Arc<SemTriple>>>,
}

impl Facility {
    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Server only: create the segment, zero it, seed the info block, and
    /// create the segment mutex. Fails with `AlreadyInitialized` if a
    /// populated segment already exists under the configured name.
    pub fn init(cfg: Config) -> Result<Self> {
        let seg = Segment::create(&cfg)?;
        let seg_sem =
            match NamedSemaphore::create_fresh(&names::segment_sem_name(&cfg.shmem_name), 1) {
                Ok(sem) => sem,
                Err(e) => {
                    // Leave nothing behind on partial failure.
                    seg.unlink();
                    return Err(Error::Io(e));
                }
            };
        debug!(name = %cfg.shmem_name, "facility initialized");
        Ok(Self {
            cfg,
            seg,
            seg_sem,
            role: Role::Server,
            detached: AtomicBool::new(false),
            triples: Mutex::new(HashMap::new()),
        })
    }

    /// Client: map the existing segment and register in the attach counter.
    /// Fails with `NotInitialized` if no server has initialized the segment.
    pub fn attach(cfg: Config) -> Result<Self> {
        let seg = Segment::open_existing(&cfg)?;
        let seg_sem = NamedSemaphore::open(&names::segment_sem_name(&cfg.shmem_name))
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::NotInitialized
                } else {
                    Error::Io(e)
                }
            })?;

        let facility = Self {
            cfg,
            seg,
            seg_sem,
            role: Role::Client,
            detached: AtomicBool::new(false),
            triples: Mutex::new(HashMap::new()),
        };
        {
            let _lock = lock(&facility.seg_sem)?;
            // Safety: segment mutex held.
            let info = unsafe { facility.seg.info_mut() };
            info.set_attached_process_count(info.attached_process_count() + 1);
        }
        debug!(name = %facility.cfg.shmem_name, "attached");
        Ok(facility)
    }

    /// Leave the deployment: deregister from the attach counter and unmap.
    /// The segment itself is never removed here.
    pub fn detach(self) -> Result<()> {
        self.release_attachment()?;
        self.detached.store(true, Ordering::Release);
        Ok(())
    }

    fn release_attachment(&self) -> Result<()> {
        if self.role != Role::Client || self.detached.load(Ordering::Acquire) {
            return Ok(());
        }
        let _lock = lock(&self.seg_sem)?;
        // Safety: segment mutex held.
        let info = unsafe { self.seg.info_mut() };
        info.set_attached_process_count(info.attached_process_count().saturating_sub(1));
        debug!(name = %self.cfg.shmem_name, "detached");
        Ok(())
    }

    /// Server only: unlink every queue's semaphores, the segment mutex, and
    /// the segment itself. Attached clients keep their mappings until they
    /// exit, but the names are gone and a fresh `init` starts clean.
    pub fn destroy(self) -> Result<()> {
        let snapshot = {
            let _lock = lock(&self.seg_sem)?;
            // Safety: segment mutex held.
            unsafe { self.seg.snapshot() }
        };

        if snapshot.attached_process_count > 0 {
            warn!(
                attached = snapshot.attached_process_count,
                "destroying segment with processes still attached"
            );
        }

        for q in &snapshot.queues {
            self.unlink_queue_sems(q.qid);
        }
        self.triples.lock().unwrap().clear();

        NamedSemaphore::unlink_by_name(&names::segment_sem_name(&self.cfg.shmem_name));
        self.seg.unlink();
        self.detached.store(true, Ordering::Release);
        debug!(name = %self.cfg.shmem_name, "facility destroyed");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Queue directory
    // -----------------------------------------------------------------

    /// Create a queue named `name` with a body of `size_kib` KiB.
    ///
    /// An empty or over-long name and a size outside
    /// `[MIN_MQSIZE_KIB, MAX_MQSIZE_KIB]` fail with `BadConfig`.
    pub fn create_queue(&self, name: &str, size_kib: u32) -> Result<()> {
        validate_queue_name(name)?;
        if !(MIN_MQSIZE_KIB..=MAX_MQSIZE_KIB).contains(&size_kib) {
            return Err(Error::BadConfig(format!(
                "queue size {size_kib} KiB outside [{MIN_MQSIZE_KIB}, {MAX_MQSIZE_KIB}]"
            )));
        }
        let body_size = size_kib * 1024;

        let _lock = lock(&self.seg_sem)?;
        // Safety: segment mutex held for the rest of the scope.
        let headers = unsafe { self.seg.headers_mut() };
        let info = unsafe { self.seg.info_mut() };

        if directory::find_by_name(headers, name).is_some() {
            return Err(Error::NameInUse(name.to_string()));
        }
        if info.active_queue_count() >= self.cfg.max_queues {
            return Err(Error::TooManyQueues);
        }
        let slot = directory::free_slot(headers).ok_or(Error::TooManyQueues)?;
        let qid = directory::lowest_free_qid(headers, self.cfg.max_queues)
            .ok_or(Error::TooManyQueues)?;

        let arena_size = self.seg.layout().arena_size as u32;
        let extents = directory::live_extents(headers);
        let body_offset =
            arena::first_fit(&extents, arena_size, body_size).ok_or(Error::OutOfSpace)?;

        // Semaphores first, header slot last: a failure here leaves no
        // visible queue to roll back.
        let triple = self.create_queue_sems(qid)?;
        self.triples.lock().unwrap().insert(qid, Arc::new(triple));

        let h = &mut headers[slot];
        h.clear();
        h.set_name(name);
        h.set_body_size(body_size);
        h.set_body_offset(body_offset);
        h.set_head_offset(0);
        h.set_tail_offset(0);
        h.set_msg_count(0);
        h.set_ref_count(0);
        h.set_qid(qid);

        info.set_active_queue_count(info.active_queue_count() + 1);
        info.set_used_bytes(info.used_bytes() + body_size);
        info.set_free_bytes(info.free_bytes() - body_size);

        #[cfg(debug_assertions)]
        unsafe {
            self.seg.snapshot().check_invariants().expect("invariants");
        }

        debug!(name, qid, size_kib, offset = body_offset, "queue created");
        Ok(())
    }

    /// Remove a queue by name. Fails with `Busy` while opens are
    /// outstanding, `NotFound` if no such queue.
    pub fn remove_queue(&self, name: &str) -> Result<()> {
        let _lock = lock(&self.seg_sem)?;
        // Safety: segment mutex held for the rest of the scope.
        let headers = unsafe { self.seg.headers_mut() };
        let info = unsafe { self.seg.info_mut() };

        let slot = directory::find_by_name(headers, name).ok_or(Error::NotFound)?;
        let qid = headers[slot].qid();

        // The ref count is owned by the queue mutex; senders and receivers
        // never take the segment mutex, so this nesting cannot deadlock.
        let triple = self.sems_for(qid)?;
        {
            let _qlock = lock(&triple.mutex)?;
            let h = &mut headers[slot];
            if h.ref_count() > 0 {
                return Err(Error::Busy);
            }

            let (off, size) = (h.body_offset(), h.body_size());
            // Safety: queue mutex held, (off, size) is this queue's extent.
            let body = unsafe { self.seg.body_mut(off, size) };
            body.fill(0);
            h.clear();

            info.set_active_queue_count(info.active_queue_count() - 1);
            info.set_used_bytes(info.used_bytes() - size);
            info.set_free_bytes(info.free_bytes() + size);
        }

        self.unlink_queue_sems(qid);
        self.triples.lock().unwrap().remove(&qid);

        #[cfg(debug_assertions)]
        unsafe {
            self.seg.snapshot().check_invariants().expect("invariants");
        }

        debug!(name, qid, "queue removed");
        Ok(())
    }

    /// Open a queue by name, returning its qid and taking a reference.
    pub fn open(&self, name: &str) -> Result<u32> {
        let qid = {
            let _lock = lock(&self.seg_sem)?;
            // Safety: segment mutex held.
            let headers = unsafe { self.seg.headers_mut() };
            let slot = directory::find_by_name(headers, name).ok_or(Error::NotFound)?;
            headers[slot].qid()
        };

        let triple = self.sems_for(qid)?;
        let _qlock = lock(&triple.mutex)?;
        // Safety: this queue cannot be removed while its mutex is held.
        let headers = unsafe { self.seg.headers_mut() };
        let slot = match directory::find_by_qid(headers, qid) {
            Some(slot) => slot,
            None => {
                self.forget_triple(qid);
                return Err(Error::NotFound);
            }
        };
        let h = &mut headers[slot];
        if h.name() != name {
            // The qid was recycled between the lookup and the lock.
            return Err(Error::NotFound);
        }
        h.set_ref_count(h.ref_count() + 1);
        trace!(name, qid, refs = h.ref_count(), "queue opened");
        Ok(qid)
    }

    /// Release one reference taken by [`Facility::open`]. Never destroys.
    pub fn close(&self, qid: u32) -> Result<()> {
        let triple = self.sems_for(qid)?;
        let _qlock = lock(&triple.mutex)?;
        // Safety: this queue cannot be removed while its mutex is held.
        let headers = unsafe { self.seg.headers_mut() };
        let slot = match directory::find_by_qid(headers, qid) {
            Some(slot) => slot,
            None => {
                self.forget_triple(qid);
                return Err(Error::NotFound);
            }
        };
        let h = &mut headers[slot];
        if h.ref_count() == 0 {
            warn!(qid, "close without matching open");
        }
        h.set_ref_count(h.ref_count().saturating_sub(1));
        trace!(qid, refs = h.ref_count(), "queue closed");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Send / receive
    // -----------------------------------------------------------------

    /// Enqueue `buf` on queue `qid`, blocking while the queue is full.
    ///
    /// Fails immediately with `OutOfSpace` if the record can never fit the
    /// queue body, `BadLength` outside `[MIN_DATALEN, MAX_DATALEN]`, and
    /// `NotFound` if the qid is not (or no longer) live.
    pub fn send(&self, qid: u32, buf: &[u8]) -> Result<()> {
        if !(MIN_DATALEN..=MAX_DATALEN).contains(&buf.len()) {
            return Err(Error::BadLength(buf.len()));
        }
        let triple = self.sems_for(qid)?;

        loop {
            {
                let _qlock = lock(&triple.mutex)?;
                // Safety: queue mutex held.
                let headers = unsafe { self.seg.headers_mut() };
                let slot = match directory::find_by_qid(headers, qid) {
                    Some(slot) => slot,
                    None => {
                        self.forget_triple(qid);
                        return Err(Error::NotFound);
                    }
                };
                let h = &mut headers[slot];

                if ring::record_size(buf.len()) > h.body_size() {
                    return Err(Error::OutOfSpace);
                }

                let mut cur = RingCursor {
                    head: h.head_offset(),
                    tail: h.tail_offset(),
                    count: h.msg_count(),
                };
                let (off, size) = (h.body_offset(), h.body_size());
                // Safety: queue mutex held, (off, size) is this queue's extent.
                let body = unsafe { self.seg.body_mut(off, size) };

                if ring::push(body, &mut cur, self.cfg.max_msgs_per_queue, buf) == Push::Stored {
                    h.set_head_offset(cur.head);
                    h.set_tail_offset(cur.tail);
                    h.set_msg_count(cur.count);
                    trace!(qid, len = buf.len(), msgs = cur.count, "sent");
                    triple.not_empty.post(1)?;
                    return Ok(());
                }
                // Full: fall through to wait with the mutex released.
            }
            triple.not_full.wait(None)?;
        }
    }

    /// Dequeue the oldest message of queue `qid` into `buf`, blocking while
    /// the queue is empty. Returns the number of bytes copied; a message
    /// longer than `buf` is truncated and its remainder dropped.
    pub fn receive(&self, qid: u32, buf: &mut [u8]) -> Result<usize> {
        let triple = self.sems_for(qid)?;

        loop {
            {
                let _qlock = lock(&triple.mutex)?;
                // Safety: queue mutex held.
                let headers = unsafe { self.seg.headers_mut() };
                let slot = match directory::find_by_qid(headers, qid) {
                    Some(slot) => slot,
                    None => {
                        self.forget_triple(qid);
                        return Err(Error::NotFound);
                    }
                };
                let h = &mut headers[slot];

                let mut cur = RingCursor {
                    head: h.head_offset(),
                    tail: h.tail_offset(),
                    count: h.msg_count(),
                };
                let (off, size) = (h.body_offset(), h.body_size());
                // Safety: queue mutex held, (off, size) is this queue's extent.
                let body = unsafe { self.seg.body_mut(off, size) };

                if let Pop::Read { msg_len, copied } = ring::pop(body, &mut cur, buf) {
                    h.set_head_offset(cur.head);
                    h.set_tail_offset(cur.tail);
                    h.set_msg_count(cur.count);
                    trace!(qid, msg_len, copied, msgs = cur.count, "received");
                    triple.not_full.post(1)?;
                    return Ok(copied);
                }
                // Empty: fall through to wait with the mutex released.
            }
            triple.not_empty.wait(None)?;
        }
    }

    // -----------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------

    /// Owned snapshot of the directory and counters.
    pub fn status(&self) -> Result<SegmentStatus> {
        let _lock = lock(&self.seg_sem)?;
        // Safety: segment mutex held.
        Ok(unsafe { self.seg.snapshot() })
    }

    /// Dump the info block and all live queue headers to stdout.
    pub fn print_status(&self) -> Result<()> {
        let s = self.status()?;
        println!(
            "segment {:?}: {} queue(s), {}/{} arena bytes used, {} attached",
            self.cfg.shmem_name,
            s.active_queue_count,
            s.used_bytes,
            s.arena_size,
            s.attached_process_count,
        );
        println!(
            "  {:<4} {:<24} {:>10} {:>8} {:>6} {:>8} {:>8} {:>5}",
            "qid", "name", "offset", "size", "msgs", "head", "tail", "refs"
        );
        for q in &s.queues {
            println!(
                "  {:<4} {:<24} {:>10} {:>8} {:>6} {:>8} {:>8} {:>5}",
                q.qid,
                q.name,
                q.body_offset,
                q.body_size,
                q.msg_count,
                q.head_offset,
                q.tail_offset,
                q.ref_count,
            );
        }
        Ok(())
    }

    /// The configuration this handle was built from.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // -----------------------------------------------------------------
    // Semaphore plumbing
    // -----------------------------------------------------------------

    fn create_queue_sems(&self, qid: u32) -> Result<SemTriple> {
        let shm = &self.cfg.shmem_name;
        let mutex =
            NamedSemaphore::create_fresh(&names::queue_sem_name(shm, qid, SemRole::Mutex), 1)?;
        let not_full = NamedSemaphore::create_fresh(
            &names::queue_sem_name(shm, qid, SemRole::NotFull),
            self.cfg.max_msgs_per_queue,
        )
        .map_err(|e| {
            NamedSemaphore::unlink_by_name(mutex.name());
            e
        })?;
        let not_empty =
            NamedSemaphore::create_fresh(&names::queue_sem_name(shm, qid, SemRole::NotEmpty), 0)
                .map_err(|e| {
                    NamedSemaphore::unlink_by_name(mutex.name());
                    NamedSemaphore::unlink_by_name(not_full.name());
                    e
                })?;
        Ok(SemTriple {
            mutex,
            not_full,
            not_empty,
        })
    }

    fn unlink_queue_sems(&self, qid: u32) {
        let shm = &self.cfg.shmem_name;
        NamedSemaphore::unlink_by_name(&names::queue_sem_name(shm, qid, SemRole::Mutex));
        NamedSemaphore::unlink_by_name(&names::queue_sem_name(shm, qid, SemRole::NotFull));
        NamedSemaphore::unlink_by_name(&names::queue_sem_name(shm, qid, SemRole::NotEmpty));
    }

    /// The cached semaphore triple for `qid`, opening the named objects on
    /// first use. A missing object means the qid is not live: `NotFound`.
    fn sems_for(&self, qid: u32) -> Result<Arc<SemTriple>> {
        if qid == 0 {
            return Err(Error::NotFound);
        }
        let mut cache = self.triples.lock().unwrap();
        if let Some(triple) = cache.get(&qid) {
            return Ok(Arc::clone(triple));
        }
        let shm = &self.cfg.shmem_name;
        let open = |role| {
            NamedSemaphore::open(&names::queue_sem_name(shm, qid, role)).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })
        };
        let triple = Arc::new(SemTriple {
            mutex: open(SemRole::Mutex)?,
            not_full: open(SemRole::NotFull)?,
            not_empty: open(SemRole::NotEmpty)?,
        });
        cache.insert(qid, Arc::clone(&triple));
        Ok(triple)
    }

    /// Drop the cached triple for a qid that turned out to be dead, so a
    /// later reuse of the qid opens the fresh semaphores.
    fn forget_triple(&self, qid: u32) {
        self.triples.lock().unwrap().remove(&qid);
    }
}

impl Drop for Facility {
    fn drop(&mut self) {
        // A client handle dropped without an explicit detach still leaves
        // the attach counter balanced.
        let _ = self.release_attachment();
        if self.role == Role::Client {
            self.detached.store(true, Ordering::Release);
        }
    }
}

// ---------------------------------------------------------------------------
// Lock guard
// ---------------------------------------------------------------------------

/// RAII guard for a binary semaphore used as a mutex: waits on construction,
/// posts on drop.
struct SemGuard<'a> {
    sem: &'a NamedSemaphore,
}

fn lock(sem: &NamedSemaphore) -> Result<SemGuard<'_>> {
    sem.wait(None)?;
    Ok(SemGuard { sem })
}

impl Drop for SemGuard<'_> {
    fn drop(&mut self) {
        let _ = self.sem.post(1);
    }
}

fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_NAME || name.contains('\0') {
        return Err(Error::BadConfig(format!(
            "queue name {name:?} must be 1..{MAX_NAME} bytes without NUL"
        )));
    }
    Ok(())
}
