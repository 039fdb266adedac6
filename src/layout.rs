// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// On-segment data layout.
//
// The segment is a single contiguous region:
//
//   0                                   header_table_bytes
//   |  header table: max_queues × QueueHeader  |
//   header_table_bytes                  header_table_bytes + INFO_SIZE
//   |  info block                              |
//   header_table_bytes + INFO_SIZE     shmem_bytes
//   |  data arena                              |
//
// Records are fixed-layout PODs; every integer field is stored little-endian
// so the layout is identical for all attachers regardless of mmap base.
// Cross-references are byte offsets, never pointers.

use bytemuck::{Pod, Zeroable};

/// Width of the queue-name slot inside a header (NUL-padded UTF-8).
pub const MAX_NAME: usize = 64;

/// Fixed size of one header-table record. Power of two ≥ `MAX_NAME + 7×4`.
pub const HEADER_SIZE: usize = 128;

/// Fixed size of the info block.
pub const INFO_SIZE: usize = 32;

/// Smallest payload a message may carry, in bytes.
pub const MIN_DATALEN: usize = 1;

/// Largest payload a message may carry, in bytes.
pub const MAX_DATALEN: usize = 4096;

/// Bytes of the length prefix stored in front of every message payload.
pub const MSG_PREFIX: usize = 4;

/// Smallest queue body a caller may request, in KiB.
pub const MIN_MQSIZE_KIB: u32 = 1;

/// Largest queue body a caller may request, in KiB (further capped by the
/// configured segment size at create time).
pub const MAX_MQSIZE_KIB: u32 = 16 * 1024;

/// Configuration bounds for `SHMEM_SIZE` (KiB).
pub const MIN_SHMEMSIZE_KIB: u32 = 64;
pub const MAX_SHMEMSIZE_KIB: u32 = 512 * 1024;

/// Hard upper bound for `MAX_QUEUES_IN_SHMEM`.
pub const MAX_QUEUES_LIMIT: u32 = 256;

// ---------------------------------------------------------------------------
// QueueHeader — one record per header-table slot
// ---------------------------------------------------------------------------

/// Per-queue metadata record stored in the header table.
///
/// A slot is free iff `qid == 0`. All integer fields are little-endian on
/// the segment; use the accessors, never the raw fields.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct QueueHeader {
    name: [u8; MAX_NAME],
    qid: u32,
    body_size: u32,
    msg_count: u32,
    body_offset: u32,
    head_offset: u32,
    tail_offset: u32,
    ref_count: u32,
    _reserved: [u8; HEADER_SIZE - MAX_NAME - 7 * 4],
}

const _: () = assert!(std::mem::size_of::<QueueHeader>() == HEADER_SIZE);
const _: () = assert!(HEADER_SIZE.is_power_of_two());

impl QueueHeader {
    /// Whether this slot holds a live queue.
    pub fn is_live(&self) -> bool {
        self.qid() != 0
    }

    /// Queue name, up to the first NUL.
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Store `name` NUL-padded. The caller validates length beforehand.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        debug_assert!(bytes.len() < MAX_NAME);
        self.name = [0; MAX_NAME];
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    pub fn qid(&self) -> u32 {
        u32::from_le(self.qid)
    }

    pub fn set_qid(&mut self, v: u32) {
        self.qid = v.to_le();
    }

    pub fn body_size(&self) -> u32 {
        u32::from_le(self.body_size)
    }

    pub fn set_body_size(&mut self, v: u32) {
        self.body_size = v.to_le();
    }

    pub fn msg_count(&self) -> u32 {
        u32::from_le(self.msg_count)
    }

    pub fn set_msg_count(&mut self, v: u32) {
        self.msg_count = v.to_le();
    }

    pub fn body_offset(&self) -> u32 {
        u32::from_le(self.body_offset)
    }

    pub fn set_body_offset(&mut self, v: u32) {
        self.body_offset = v.to_le();
    }

    pub fn head_offset(&self) -> u32 {
        u32::from_le(self.head_offset)
    }

    pub fn set_head_offset(&mut self, v: u32) {
        self.head_offset = v.to_le();
    }

    pub fn tail_offset(&self) -> u32 {
        u32::from_le(self.tail_offset)
    }

    pub fn set_tail_offset(&mut self, v: u32) {
        self.tail_offset = v.to_le();
    }

    pub fn ref_count(&self) -> u32 {
        u32::from_le(self.ref_count)
    }

    pub fn set_ref_count(&mut self, v: u32) {
        self.ref_count = v.to_le();
    }

    /// Zero the whole record, returning the slot to the free state.
    pub fn clear(&mut self) {
        *self = Zeroable::zeroed();
    }
}

// ---------------------------------------------------------------------------
// InfoBlock — segment-wide counters
// ---------------------------------------------------------------------------

/// Segment-wide bookkeeping, mutated only under the segment mutex.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct InfoBlock {
    active_queue_count: u32,
    used_bytes: u32,
    free_bytes: u32,
    attached_process_count: u32,
    _reserved: [u8; INFO_SIZE - 4 * 4],
}

const _: () = assert!(std::mem::size_of::<InfoBlock>() == INFO_SIZE);

impl InfoBlock {
    pub fn active_queue_count(&self) -> u32 {
        u32::from_le(self.active_queue_count)
    }

    pub fn set_active_queue_count(&mut self, v: u32) {
        self.active_queue_count = v.to_le();
    }

    pub fn used_bytes(&self) -> u32 {
        u32::from_le(self.used_bytes)
    }

    pub fn set_used_bytes(&mut self, v: u32) {
        self.used_bytes = v.to_le();
    }

    pub fn free_bytes(&self) -> u32 {
        u32::from_le(self.free_bytes)
    }

    pub fn set_free_bytes(&mut self, v: u32) {
        self.free_bytes = v.to_le();
    }

    pub fn attached_process_count(&self) -> u32 {
        u32::from_le(self.attached_process_count)
    }

    pub fn set_attached_process_count(&mut self, v: u32) {
        self.attached_process_count = v.to_le();
    }
}

// ---------------------------------------------------------------------------
// Region offset math
// ---------------------------------------------------------------------------

/// Byte offsets of the three regions for a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub header_table_bytes: usize,
    pub info_offset: usize,
    pub arena_offset: usize,
    pub arena_size: usize,
    pub total_bytes: usize,
}

impl SegmentLayout {
    /// Compute the layout. Fails (None) if the segment is too small to hold
    /// the header table and info block.
    pub fn compute(shmem_bytes: usize, max_queues: u32) -> Option<Self> {
        let header_table_bytes = max_queues as usize * HEADER_SIZE;
        let arena_offset = header_table_bytes + INFO_SIZE;
        let arena_size = shmem_bytes.checked_sub(arena_offset)?;
        if arena_size == 0 {
            return None;
        }
        Some(Self {
            header_table_bytes,
            info_offset: header_table_bytes,
            arena_offset,
            arena_size,
            total_bytes: shmem_bytes,
        })
    }
}
