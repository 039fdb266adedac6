// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Queue-directory scans over the header table.
//
// The table is small (tens to low hundreds of slots), so every lookup is a
// linear scan; slot index carries no meaning beyond position. Names and qids
// are unique among live slots, both zero exactly in free slots.

use crate::arena::Extent;
use crate::layout::QueueHeader;

/// Index of the first live slot whose name matches.
pub fn find_by_name(headers: &[QueueHeader], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.is_live() && h.name() == name)
}

/// Index of the live slot with this qid.
pub fn find_by_qid(headers: &[QueueHeader], qid: u32) -> Option<usize> {
    if qid == 0 {
        return None;
    }
    headers.iter().position(|h| h.qid() == qid)
}

/// Index of the first free slot.
pub fn free_slot(headers: &[QueueHeader]) -> Option<usize> {
    headers.iter().position(|h| !h.is_live())
}

/// Smallest unused qid in `1..=max_queues`.
pub fn lowest_free_qid(headers: &[QueueHeader], max_queues: u32) -> Option<u32> {
    (1..=max_queues).find(|&cand| headers.iter().all(|h| h.qid() != cand))
}

/// Body extents of all live queues, for the arena allocator.
pub fn live_extents(headers: &[QueueHeader]) -> Vec<Extent> {
    headers
        .iter()
        .filter(|h| h.is_live())
        .map(|h| (h.body_offset(), h.body_size()))
        .collect()
}

/// Number of live slots (cross-check for the info block's counter).
pub fn live_count(headers: &[QueueHeader]) -> u32 {
    headers.iter().filter(|h| h.is_live()).count() as u32
}
