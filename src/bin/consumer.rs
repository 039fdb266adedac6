// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Sample consumer: attaches to a running deployment, creates the shared
// queue, then drains it until the producer's end-of-data marker arrives.
// Run this before the producer.
//
// Usage:
//   mf-consumer [config-path]

use libmf::{Config, Facility, MAX_DATALEN};

const QUEUE_NAME: &str = "mq1";
const QUEUE_KIB: u32 = 16;

const TAG_END: u8 = 0xFF;

fn main() {
    tracing_subscriber::fmt().init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(libmf::config::DEFAULT_CONFIG_PATH);

    let cfg = Config::load(config_path).unwrap_or_else(|e| {
        eprintln!("mf-consumer: {e}");
        std::process::exit(1);
    });

    let facility = Facility::attach(cfg).unwrap_or_else(|e| {
        eprintln!("mf-consumer: attach failed: {e}");
        std::process::exit(1);
    });
    facility
        .create_queue(QUEUE_NAME, QUEUE_KIB)
        .unwrap_or_else(|e| {
            eprintln!("mf-consumer: create {QUEUE_NAME:?} failed: {e}");
            std::process::exit(1);
        });
    let qid = facility.open(QUEUE_NAME).unwrap_or_else(|e| {
        eprintln!("mf-consumer: open {QUEUE_NAME:?} failed: {e}");
        std::process::exit(1);
    });

    println!("mf-consumer pid={} waiting on {QUEUE_NAME:?}", std::process::id());

    let mut buf = vec![0u8; MAX_DATALEN];
    let mut received = 0usize;
    loop {
        let n = match facility.receive(qid, &mut buf) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("mf-consumer: receive failed: {e}");
                std::process::exit(1);
            }
        };
        if n >= 1 && buf[0] == TAG_END {
            println!("received end-of-data marker");
            break;
        }
        received += 1;
        println!("received data message {received} ({n} bytes)");
    }

    let _ = facility.close(qid);
    if let Err(e) = facility.remove_queue(QUEUE_NAME) {
        eprintln!("mf-consumer: remove {QUEUE_NAME:?} failed: {e}");
    }
    if let Err(e) = facility.detach() {
        eprintln!("mf-consumer: detach failed: {e}");
        std::process::exit(1);
    }
}
