// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Configuration-file loading tests.

use std::io::Write;

use libmf::{Config, Error};

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(text.as_bytes()).expect("write config");
    file
}

#[test]
fn load_sample_file() {
    let file = write_config(
        "# deployment config\n\
         SHMEM_SIZE 256\n\
         MAX_QUEUES_IN_SHMEM 8\n\
         MAX_MSGS_IN_QUEUE 4\n\
         SHMEM_NAME /mf_cfg_test\n",
    );
    let cfg = Config::load(file.path()).expect("load");
    assert_eq!(cfg.shmem_kib, 256);
    assert_eq!(cfg.max_queues, 8);
    assert_eq!(cfg.max_msgs_per_queue, 4);
    assert_eq!(cfg.shmem_name, "mf_cfg_test");
    assert_eq!(cfg.shmem_bytes(), 256 * 1024);
}

#[test]
fn load_missing_file_is_bad_config() {
    let err = Config::load("/nonexistent/mf.cfg").unwrap_err();
    assert!(matches!(err, Error::BadConfig(_)));
}

#[test]
fn load_rejects_incomplete_file() {
    let file = write_config("SHMEM_SIZE 256\nSHMEM_NAME mf\n");
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::BadConfig(_))
    ));
}

#[test]
fn key_order_does_not_matter() {
    let file = write_config(
        "SHMEM_NAME mf_order\n\
         MAX_MSGS_IN_QUEUE 2\n\
         SHMEM_SIZE 128\n\
         MAX_QUEUES_IN_SHMEM 1\n",
    );
    let cfg = Config::load(file.path()).expect("load");
    assert_eq!(cfg.max_queues, 1);
    assert_eq!(cfg.shmem_kib, 128);
}
