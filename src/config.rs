// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Line-oriented configuration file loader.
//
// Recognized keys (first two whitespace-separated tokens per line, lines
// starting with '#' are comments):
//   SHMEM_SIZE           segment size in KiB
//   MAX_QUEUES_IN_SHMEM  header-table capacity
//   MAX_MSGS_IN_QUEUE    per-queue message cap
//   SHMEM_NAME           POSIX shm object name (leading '/' optional)
//
// Every process of one deployment must load the same file; the layout
// derived from these values has to be identical across attachers.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::layout::{MAX_QUEUES_LIMIT, MAX_SHMEMSIZE_KIB, MIN_SHMEMSIZE_KIB};

/// Default configuration file path used by the sample binaries.
pub const DEFAULT_CONFIG_PATH: &str = "mf.cfg";

/// Immutable facility configuration, populated from a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total shared-segment size in KiB.
    pub shmem_kib: u32,
    /// Maximum number of concurrently live queues.
    pub max_queues: u32,
    /// Maximum number of messages a single queue may hold.
    pub max_msgs_per_queue: u32,
    /// POSIX shm object name, stored without the leading '/'.
    pub shmem_name: String,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::BadConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text. Missing keys and out-of-range values fail.
    pub fn parse(text: &str) -> Result<Self> {
        let mut shmem_kib = None;
        let mut max_queues = None;
        let mut max_msgs = None;
        let mut shmem_name = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let key = tokens.next().unwrap_or("");
            let Some(value) = tokens.next() else {
                return Err(Error::BadConfig(format!(
                    "line {}: key {key:?} has no value",
                    lineno + 1
                )));
            };
            // Only the first two tokens count; the rest of the line is ignored.
            match key {
                "SHMEM_SIZE" => shmem_kib = Some(parse_int(key, value)?),
                "MAX_QUEUES_IN_SHMEM" => max_queues = Some(parse_int(key, value)?),
                "MAX_MSGS_IN_QUEUE" => max_msgs = Some(parse_int(key, value)?),
                "SHMEM_NAME" => {
                    shmem_name = Some(value.trim_start_matches('/').to_string());
                }
                _ => {} // unknown keys are ignored
            }
        }

        let shmem_kib = shmem_kib
            .ok_or_else(|| Error::BadConfig("missing key SHMEM_SIZE".into()))?;
        let max_queues = max_queues
            .ok_or_else(|| Error::BadConfig("missing key MAX_QUEUES_IN_SHMEM".into()))?;
        let max_msgs_per_queue = max_msgs
            .ok_or_else(|| Error::BadConfig("missing key MAX_MSGS_IN_QUEUE".into()))?;
        let shmem_name = shmem_name
            .ok_or_else(|| Error::BadConfig("missing key SHMEM_NAME".into()))?;

        if !(MIN_SHMEMSIZE_KIB..=MAX_SHMEMSIZE_KIB).contains(&shmem_kib) {
            return Err(Error::BadConfig(format!(
                "SHMEM_SIZE {shmem_kib} outside [{MIN_SHMEMSIZE_KIB}, {MAX_SHMEMSIZE_KIB}] KiB"
            )));
        }
        if !(1..=MAX_QUEUES_LIMIT).contains(&max_queues) {
            return Err(Error::BadConfig(format!(
                "MAX_QUEUES_IN_SHMEM {max_queues} outside [1, {MAX_QUEUES_LIMIT}]"
            )));
        }
        if max_msgs_per_queue < 1 {
            return Err(Error::BadConfig(
                "MAX_MSGS_IN_QUEUE must be at least 1".into(),
            ));
        }
        if shmem_name.is_empty() {
            return Err(Error::BadConfig("SHMEM_NAME is empty".into()));
        }

        Ok(Self {
            shmem_kib,
            max_queues,
            max_msgs_per_queue,
            shmem_name,
        })
    }

    /// Total segment size in bytes.
    pub fn shmem_bytes(&self) -> usize {
        self.shmem_kib as usize * 1024
    }
}

fn parse_int(key: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| Error::BadConfig(format!("{key}: {value:?} is not a valid integer")))
}
