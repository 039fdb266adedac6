// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Sample producer: attaches to a running deployment, opens the shared
// queue, sends N random-length data messages, then a one-byte end-of-data
// marker. Run the consumer first (it creates the queue).
//
// Usage:
//   mf-producer <message-count> [config-path]

use libmf::{Config, Facility};

const QUEUE_NAME: &str = "mq1";

/// First payload byte: 0x01 = data, 0xFF = end of data.
const TAG_DATA: u8 = 0x01;
const TAG_END: u8 = 0xFF;

fn main() {
    tracing_subscriber::fmt().init();

    let args: Vec<String> = std::env::args().collect();
    let Some(total) = args.get(1).and_then(|s| s.parse::<usize>().ok()) else {
        eprintln!("usage: mf-producer <message-count> [config-path]");
        std::process::exit(1);
    };
    let config_path = args
        .get(2)
        .map(String::as_str)
        .unwrap_or(libmf::config::DEFAULT_CONFIG_PATH);

    let cfg = Config::load(config_path).unwrap_or_else(|e| {
        eprintln!("mf-producer: {e}");
        std::process::exit(1);
    });

    let facility = Facility::attach(cfg).unwrap_or_else(|e| {
        eprintln!("mf-producer: attach failed: {e}");
        std::process::exit(1);
    });
    let qid = facility.open(QUEUE_NAME).unwrap_or_else(|e| {
        eprintln!("mf-producer: open {QUEUE_NAME:?} failed: {e}");
        std::process::exit(1);
    });

    // Simple LCG for random payload sizes without external deps.
    let mut rng_state: u64 = 0xdeadbeef_cafebabe ^ std::process::id() as u64;
    let mut buf = vec![0u8; 1024];
    buf[0] = TAG_DATA;
    for (i, b) in buf.iter_mut().enumerate().skip(1) {
        *b = b'a' + (i % 26) as u8;
    }

    for n in 0..total {
        rng_state = rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let len = 1 + (rng_state >> 33) as usize % (buf.len() - 1);

        if let Err(e) = facility.send(qid, &buf[..len]) {
            eprintln!("mf-producer: send failed: {e}");
            std::process::exit(1);
        }
        println!("sent data message {} ({len} bytes)", n + 1);
    }

    facility
        .send(qid, &[TAG_END])
        .unwrap_or_else(|e| {
            eprintln!("mf-producer: end marker failed: {e}");
            std::process::exit(1);
        });
    println!("sent end-of-data marker");

    let _ = facility.close(qid);
    if let Err(e) = facility.detach() {
        eprintln!("mf-producer: detach failed: {e}");
        std::process::exit(1);
    }
}
