// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Crate-wide error type. Syscall-level modules (shm, sem) stay on
// io::Result; everything above converts through `Error::Io`.

use std::io;

/// Errors reported by the message facility.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration file or caller-supplied parameter (config key,
    /// queue name, queue size) is missing, malformed, or out of range.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// Attach was called before a server initialized the segment.
    #[error("message facility not initialized (segment absent)")]
    NotInitialized,

    /// Init was called while a populated segment already exists.
    #[error("message facility already initialized")]
    AlreadyInitialized,

    /// Underlying syscall failure (shm_open, mmap, ftruncate, sem_open, ...).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A queue with this name already exists.
    #[error("queue name already in use: {0}")]
    NameInUse(String),

    /// No queue with that name or qid.
    #[error("queue not found")]
    NotFound,

    /// The header table is full.
    #[error("maximum number of queues reached")]
    TooManyQueues,

    /// No single free extent in the arena is large enough, or a message
    /// can never fit in its queue body.
    #[error("out of shared-memory space")]
    OutOfSpace,

    /// The queue still has outstanding opens.
    #[error("queue is busy (open handles remain)")]
    Busy,

    /// Send length outside [MIN_DATALEN, MAX_DATALEN].
    #[error("bad message length: {0}")]
    BadLength(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
