// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The shared segment: one mapped shm object partitioned into header table,
// info block, and data arena.
//
// All region accessors derive references from the raw mapping; callers must
// hold the semaphore that guards the region (segment mutex for the header
// table and info block, the owning queue's mutex for a queue body).

use bytemuck::Zeroable;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::layout::{InfoBlock, QueueHeader, SegmentLayout, INFO_SIZE};
use crate::names;
use crate::shm::SharedMem;

/// The mapped segment of one facility deployment.
pub struct Segment {
    shm: SharedMem,
    layout: SegmentLayout,
}

impl Segment {
    /// Server side: exclusively create and map the segment, then seed the
    /// info block. The fresh mapping is kernel-zeroed, so every header slot
    /// starts free.
    pub(crate) fn create(cfg: &Config) -> Result<Self> {
        let layout = SegmentLayout::compute(cfg.shmem_bytes(), cfg.max_queues)
            .ok_or_else(|| {
                Error::BadConfig(format!(
                    "SHMEM_SIZE {} KiB cannot hold {} queue headers",
                    cfg.shmem_kib, cfg.max_queues
                ))
            })?;

        let name = names::segment_name(&cfg.shmem_name);
        let shm = SharedMem::create(&name, layout.total_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyInitialized
            } else {
                Error::Io(e)
            }
        })?;

        let seg = Self { shm, layout };
        // Safety: the segment was just created; no other process can hold
        // the (not yet created) segment mutex.
        unsafe {
            let info = seg.info_mut();
            *info = InfoBlock::zeroed();
            info.set_free_bytes(layout.arena_size as u32);
        }
        debug!(
            segment = %seg.shm.name(),
            total = layout.total_bytes,
            arena = layout.arena_size,
            "segment created"
        );
        Ok(seg)
    }

    /// Client side: map the existing segment.
    pub(crate) fn open_existing(cfg: &Config) -> Result<Self> {
        let layout = SegmentLayout::compute(cfg.shmem_bytes(), cfg.max_queues)
            .ok_or_else(|| {
                Error::BadConfig(format!(
                    "SHMEM_SIZE {} KiB cannot hold {} queue headers",
                    cfg.shmem_kib, cfg.max_queues
                ))
            })?;

        let name = names::segment_name(&cfg.shmem_name);
        let shm = SharedMem::open(&name, layout.total_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotInitialized
            } else {
                Error::Io(e)
            }
        })?;
        debug!(segment = %shm.name(), "segment attached");
        Ok(Self { shm, layout })
    }

    pub(crate) fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Remove the kernel object backing this segment.
    pub(crate) fn unlink(&self) {
        self.shm.unlink();
    }

    /// Header-table view.
    ///
    /// # Safety
    /// The caller must hold the segment mutex, or otherwise guarantee no
    /// concurrent access to the header table.
    pub(crate) unsafe fn headers_mut(&self) -> &mut [QueueHeader] {
        let bytes = std::slice::from_raw_parts_mut(
            self.shm.as_mut_ptr(),
            self.layout.header_table_bytes,
        );
        bytemuck::cast_slice_mut(bytes)
    }

    /// Info-block view.
    ///
    /// # Safety
    /// The caller must hold the segment mutex.
    pub(crate) unsafe fn info_mut(&self) -> &mut InfoBlock {
        let bytes = std::slice::from_raw_parts_mut(
            self.shm.as_mut_ptr().add(self.layout.info_offset),
            INFO_SIZE,
        );
        bytemuck::from_bytes_mut(bytes)
    }

    /// One queue body inside the arena.
    ///
    /// # Safety
    /// The caller must hold the owning queue's mutex, and `(offset, size)`
    /// must be that queue's live extent.
    pub(crate) unsafe fn body_mut(&self, offset: u32, size: u32) -> &mut [u8] {
        debug_assert!(offset as usize + size as usize <= self.layout.arena_size);
        std::slice::from_raw_parts_mut(
            self.shm
                .as_mut_ptr()
                .add(self.layout.arena_offset + offset as usize),
            size as usize,
        )
    }

    /// Owned snapshot of the directory and counters.
    ///
    /// # Safety
    /// The caller must hold the segment mutex.
    pub(crate) unsafe fn snapshot(&self) -> SegmentStatus {
        let info = self.info_mut();
        let queues = self
            .headers_mut()
            .iter()
            .filter(|h| h.is_live())
            .map(|h| QueueStatus {
                name: h.name().to_string(),
                qid: h.qid(),
                body_offset: h.body_offset(),
                body_size: h.body_size(),
                msg_count: h.msg_count(),
                head_offset: h.head_offset(),
                tail_offset: h.tail_offset(),
                ref_count: h.ref_count(),
            })
            .collect();
        SegmentStatus {
            active_queue_count: info.active_queue_count(),
            used_bytes: info.used_bytes(),
            free_bytes: info.free_bytes(),
            attached_process_count: info.attached_process_count(),
            arena_size: self.layout.arena_size as u32,
            queues,
        }
    }
}

// ---------------------------------------------------------------------------
// Status snapshots
// ---------------------------------------------------------------------------

/// Owned copy of one live queue's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub name: String,
    pub qid: u32,
    pub body_offset: u32,
    pub body_size: u32,
    pub msg_count: u32,
    pub head_offset: u32,
    pub tail_offset: u32,
    pub ref_count: u32,
}

/// Owned copy of the segment's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStatus {
    pub active_queue_count: u32,
    pub used_bytes: u32,
    pub free_bytes: u32,
    pub attached_process_count: u32,
    pub arena_size: u32,
    pub queues: Vec<QueueStatus>,
}

impl SegmentStatus {
    /// Verify the segment-wide consistency rules. Returns a description of
    /// the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.active_queue_count as usize != self.queues.len() {
            return Err(format!(
                "active_queue_count {} != live slots {}",
                self.active_queue_count,
                self.queues.len()
            ));
        }

        let used: u32 = self.queues.iter().map(|q| q.body_size).sum();
        if self.used_bytes != used {
            return Err(format!(
                "used_bytes {} != sum of body sizes {used}",
                self.used_bytes
            ));
        }
        if self.arena_size.checked_sub(used) != Some(self.free_bytes) {
            return Err(format!(
                "free_bytes {} != arena {} - used {used}",
                self.free_bytes, self.arena_size
            ));
        }

        let mut extents: Vec<(u32, u32, u32)> = self
            .queues
            .iter()
            .map(|q| (q.body_offset, q.body_size, q.qid))
            .collect();
        extents.sort_unstable_by_key(|&(off, _, _)| off);
        for pair in extents.windows(2) {
            let (a_off, a_size, a_qid) = pair[0];
            let (b_off, _, b_qid) = pair[1];
            if a_off + a_size > b_off {
                return Err(format!("bodies of q{a_qid} and q{b_qid} overlap"));
            }
        }
        if let Some(&(off, size, qid)) = extents.last() {
            if off + size > self.arena_size {
                return Err(format!("body of q{qid} extends past the arena"));
            }
        }

        for (i, a) in self.queues.iter().enumerate() {
            for b in &self.queues[i + 1..] {
                if a.name == b.name {
                    return Err(format!("duplicate queue name {:?}", a.name));
                }
                if a.qid == b.qid {
                    return Err(format!("duplicate qid {}", a.qid));
                }
            }
        }

        for q in &self.queues {
            if q.qid == 0 {
                return Err(format!("live queue {:?} has qid 0", q.name));
            }
            if q.msg_count == 0 {
                if q.head_offset != 0 || q.tail_offset != 0 {
                    return Err(format!(
                        "empty q{} has head {} tail {}",
                        q.qid, q.head_offset, q.tail_offset
                    ));
                }
            } else if q.head_offset >= q.body_size || q.tail_offset >= q.body_size {
                return Err(format!(
                    "q{} cursors out of range: head {} tail {} body {}",
                    q.qid, q.head_offset, q.tail_offset, q.body_size
                ));
            }
        }

        Ok(())
    }
}
