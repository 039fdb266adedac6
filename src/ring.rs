// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-place circular message buffer for one queue body.
//
// Layout: length-prefixed records, FIFO, no record ever straddles the body
// end. A sender that cannot fit a record in the upper region skips to offset
// 0, leaving a gap; when at least 4 bytes remain at the old tail it writes a
// zero length prefix there so the reader can recognize the skip. The reader
// also wraps unconditionally when fewer than 4 bytes remain before the end.
//
// These functions are pure over (body bytes, cursor); the caller owns
// locking and persists the cursor back to the queue header afterwards.

use crate::layout::MSG_PREFIX;

/// Head/tail/count triple of one queue, copied out of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    pub head: u32,
    pub tail: u32,
    pub count: u32,
}

/// Outcome of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// Record stored; cursor updated.
    Stored,
    /// Queue full (by count or by space); nothing changed.
    Full,
}

/// Outcome of a pop attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop {
    /// A message was consumed: (stored length, bytes copied to caller).
    Read { msg_len: u32, copied: usize },
    /// Queue empty; nothing changed.
    Empty,
}

/// On-wire size of a record carrying `payload_len` bytes.
pub fn record_size(payload_len: usize) -> u32 {
    (MSG_PREFIX + payload_len) as u32
}

/// Where the next record of `rec` bytes would be placed, or None if the
/// spatial rule rejects it. `(offset, wrapped)`.
fn placement(cur: &RingCursor, body_size: u32, rec: u32) -> Option<(u32, bool)> {
    if cur.count == 0 {
        // Empty queue: cursor resets to the body start.
        return if rec <= body_size { Some((0, false)) } else { None };
    }
    if cur.tail > cur.head {
        // Two candidate regions: [tail, body_size) then [0, head).
        if body_size - cur.tail >= rec {
            return Some((cur.tail, false));
        }
        if cur.head >= rec {
            return Some((0, true));
        }
        return None;
    }
    if cur.tail < cur.head {
        // Single region [tail, head) after a wrap.
        if cur.head - cur.tail >= rec {
            return Some((cur.tail, false));
        }
        return None;
    }
    // tail == head with messages present: full.
    None
}

/// Append a length-prefixed record. The caller has already enforced payload
/// length bounds; this enforces the count cap and the spatial rule.
pub fn push(body: &mut [u8], cur: &mut RingCursor, max_msgs: u32, payload: &[u8]) -> Push {
    let body_size = body.len() as u32;
    if cur.count >= max_msgs {
        return Push::Full;
    }
    let rec = record_size(payload.len());
    let Some((offset, wrapped)) = placement(cur, body_size, rec) else {
        return Push::Full;
    };

    if cur.count == 0 {
        cur.head = 0;
        cur.tail = 0;
    }
    if wrapped && body_size - cur.tail >= MSG_PREFIX as u32 {
        // Zero length prefix marks the skipped gap for the reader.
        let t = cur.tail as usize;
        body[t..t + MSG_PREFIX].copy_from_slice(&0u32.to_le_bytes());
    }

    let off = offset as usize;
    body[off..off + MSG_PREFIX].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    body[off + MSG_PREFIX..off + MSG_PREFIX + payload.len()].copy_from_slice(payload);

    cur.tail = offset + rec;
    if cur.tail == body_size {
        cur.tail = 0;
    }
    cur.count += 1;
    Push::Stored
}

/// Consume the oldest record, copying up to `out.len()` payload bytes.
/// Truncated tail bytes are dropped with the message.
pub fn pop(body: &[u8], cur: &mut RingCursor, out: &mut [u8]) -> Pop {
    let body_size = body.len() as u32;
    if cur.count == 0 {
        return Pop::Empty;
    }

    // Skip the gap a wrapping sender left behind.
    let mut head = cur.head;
    if body_size - head < MSG_PREFIX as u32 {
        head = 0;
    } else {
        let h = head as usize;
        let len = u32::from_le_bytes(body[h..h + MSG_PREFIX].try_into().unwrap());
        if len == 0 {
            head = 0;
        }
    }

    let h = head as usize;
    let msg_len = u32::from_le_bytes(body[h..h + MSG_PREFIX].try_into().unwrap());
    let copied = (msg_len as usize).min(out.len());
    out[..copied].copy_from_slice(&body[h + MSG_PREFIX..h + MSG_PREFIX + copied]);

    let mut new_head = head + MSG_PREFIX as u32 + msg_len;
    if new_head == body_size {
        new_head = 0;
    }
    cur.count -= 1;
    if cur.count == 0 {
        cur.head = 0;
        cur.tail = 0;
    } else {
        cur.head = new_head;
    }
    Pop::Read { msg_len, copied }
}
