// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Arena extent allocation.
//
// The allocator stores nothing: free space is derived on demand from the
// live queue extents in the header table. Sorting the extents by offset and
// walking the gaps gives the free list; releasing an extent is simply the
// header slot ceasing to be live, so adjacent gaps coalesce by construction.
// First-fit, no compaction: if no single gap fits, allocation fails even if
// the sum of gaps would suffice.

/// A queue-body extent inside the arena: (byte offset, byte size).
pub type Extent = (u32, u32);

/// Compute the free gaps of an arena of `arena_size` bytes occupied by
/// `live` extents. The input need not be sorted; the output is sorted by
/// offset and contains no empty gaps.
pub fn free_extents(live: &[Extent], arena_size: u32) -> Vec<Extent> {
    let mut occupied: Vec<Extent> = live.to_vec();
    occupied.sort_unstable_by_key(|&(off, _)| off);

    let mut gaps = Vec::with_capacity(occupied.len() + 1);
    let mut cursor = 0u32;
    for &(off, size) in &occupied {
        if off > cursor {
            gaps.push((cursor, off - cursor));
        }
        cursor = cursor.max(off + size);
    }
    if cursor < arena_size {
        gaps.push((cursor, arena_size - cursor));
    }
    gaps
}

/// First-fit: offset of the lowest gap of at least `want` bytes, if any.
pub fn first_fit(live: &[Extent], arena_size: u32, want: u32) -> Option<u32> {
    free_extents(live, arena_size)
        .into_iter()
        .find(|&(_, size)| size >= want)
        .map(|(off, _)| off)
}

/// Total free bytes (for cross-checking the info block).
pub fn total_free(live: &[Extent], arena_size: u32) -> u32 {
    free_extents(live, arena_size)
        .iter()
        .map(|&(_, size)| size)
        .sum()
}
