// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX object-name derivation for the segment and its semaphores.
//
// Scheme:
//   segment            /{shmem_name}
//   segment mutex      /mf_{shmem_name}_seg
//   per-queue triple   /mf_{shmem_name}_q{qid}_{mx|nf|ne}
//
// Names are deterministic functions of (shmem_name, qid) so any attached
// process derives the same kernel objects without coordination.
//
// Platforms with short object-name limits (macOS caps them at 31 bytes)
// get the shmem_name portion replaced by a fixed-width digest. The qid and
// role discriminators sit at the name tail, so shortening must never touch
// them; only the shared shmem_name part is compressed.

/// Maximum length for POSIX shm/sem names. 0 disables shortening.
///
/// On macOS `PSHMNAMLEN` is 31. On Linux the limit is typically 255.
#[cfg(target_os = "macos")]
pub const NAME_MAX: usize = 31;

#[cfg(not(target_os = "macos"))]
pub const NAME_MAX: usize = 0; // 0 = no shortening

/// Worst-case decoration around the shmem_name portion:
/// `/mf_` + `_q` + ten qid digits + `_` + two role chars.
const TAG_DECOR: usize = 19;

/// djb2 (xor variant) over the deployment name. 32 bits is plenty: the
/// digest only disambiguates deployments on one host, and a deployment
/// picks a single shmem_name for its lifetime.
fn digest32(data: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &b in data {
        hash = hash.wrapping_mul(33) ^ b as u32;
    }
    hash
}

/// The shmem_name portion used in every derived name: the name itself, or
/// its 8-hex digest when the composed names could overflow the platform
/// limit.
fn tag_with_budget(shmem_name: &str, budget: usize) -> String {
    if shmem_name.len() <= budget {
        shmem_name.to_string()
    } else {
        format!("{:08x}", digest32(shmem_name.as_bytes()))
    }
}

fn tag(shmem_name: &str) -> String {
    if NAME_MAX == 0 {
        return shmem_name.to_string();
    }
    tag_with_budget(shmem_name, NAME_MAX.saturating_sub(TAG_DECOR))
}

/// Name of the shared-memory segment itself.
pub fn segment_name(shmem_name: &str) -> String {
    format!("/{}", tag(shmem_name))
}

/// Name of the segment-wide mutex semaphore.
pub fn segment_sem_name(shmem_name: &str) -> String {
    format!("/mf_{}_seg", tag(shmem_name))
}

/// Role suffixes of the per-queue semaphore triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemRole {
    Mutex,
    NotFull,
    NotEmpty,
}

impl SemRole {
    fn suffix(self) -> &'static str {
        match self {
            SemRole::Mutex => "mx",
            SemRole::NotFull => "nf",
            SemRole::NotEmpty => "ne",
        }
    }
}

/// Name of one member of a queue's semaphore triple.
pub fn queue_sem_name(shmem_name: &str, qid: u32, role: SemRole) -> String {
    format!("/mf_{}_q{qid}_{}", tag(shmem_name), role.suffix())
}
