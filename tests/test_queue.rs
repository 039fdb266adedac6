// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Send/receive behavior on a single queue.

use std::sync::atomic::{AtomicUsize, Ordering};

use libmf::{Config, Error, Facility, MAX_DATALEN};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn test_config(prefix: &str, max_msgs: u32) -> Config {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    Config {
        shmem_kib: 256,
        max_queues: 8,
        max_msgs_per_queue: max_msgs,
        shmem_name: format!("mf_q_{prefix}_{}_{n}", std::process::id()),
    }
}

#[test]
fn hello_world_roundtrip() {
    let server = Facility::init(test_config("hello", 8)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");
    assert_eq!(qid, 1);

    server.send(qid, b"Hello").expect("send Hello");
    server.send(qid, b"World").expect("send World");

    let mut buf = [0u8; 5];
    assert_eq!(server.receive(qid, &mut buf).expect("receive"), 5);
    assert_eq!(&buf, b"Hello");
    assert_eq!(server.receive(qid, &mut buf).expect("receive"), 5);
    assert_eq!(&buf, b"World");

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn fill_and_drain_counts() {
    let server = Facility::init(test_config("fill", 4)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");

    let msg_count = |f: &Facility| f.status().expect("status").queues[0].msg_count;

    assert_eq!(msg_count(&server), 0);
    for i in 1..=4u32 {
        server.send(qid, &[i as u8; 100]).expect("send");
        assert_eq!(msg_count(&server), i);
    }

    let mut buf = [0u8; 128];
    for i in (0..4u32).rev() {
        server.receive(qid, &mut buf).expect("receive");
        assert_eq!(msg_count(&server), i);
    }

    let q = &server.status().expect("status").queues[0];
    assert_eq!(q.head_offset, 0);
    assert_eq!(q.tail_offset, 0);

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn wrap_keeps_fifo_order() {
    let server = Facility::init(test_config("wrap", 16)).expect("init");
    server.create_queue("mq1", 1).expect("create"); // 1 KiB body
    let qid = server.open("mq1").expect("open");

    let mut buf = [0u8; 512];
    let mut next_send = 0u8;
    let mut next_recv = 0u8;

    // Fill: three 300-byte messages occupy 912 of 1024 bytes.
    for _ in 0..3 {
        server.send(qid, &[next_send; 300]).expect("send");
        next_send += 1;
    }

    let mut saw_wrapped_state = false;
    for _ in 0..24 {
        let n = server.receive(qid, &mut buf).expect("receive");
        assert_eq!(n, 300);
        assert_eq!(&buf[..n], &[next_recv; 300][..]);
        next_recv = next_recv.wrapping_add(1);

        let q = &server.status().expect("status").queues[0];
        if q.head_offset > q.tail_offset {
            saw_wrapped_state = true;
        }

        server.send(qid, &[next_send; 300]).expect("send");
        next_send = next_send.wrapping_add(1);
    }
    assert!(saw_wrapped_state, "ring never wrapped");

    // Drain: the oldest message still comes out first after every wrap.
    for _ in 0..3 {
        let n = server.receive(qid, &mut buf).expect("receive");
        assert_eq!(&buf[..n], &[next_recv; 300][..]);
        next_recv = next_recv.wrapping_add(1);
    }
    let q = &server.status().expect("status").queues[0];
    assert_eq!((q.msg_count, q.head_offset, q.tail_offset), (0, 0, 0));

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn payload_bytes_survive_roundtrip() {
    let server = Facility::init(test_config("bytes", 8)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");

    let mut rng: u64 = 0x0123456789abcdef;
    let mut next = move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (rng >> 33) as u32
    };

    let mut buf = vec![0u8; MAX_DATALEN];
    let sizes = [1usize, 2, 3, 4, 63, 64, 65, 1000, MAX_DATALEN];
    for &len in &sizes {
        let payload: Vec<u8> = (0..len).map(|_| next() as u8).collect();
        server.send(qid, &payload).expect("send");
        let n = server.receive(qid, &mut buf).expect("receive");
        assert_eq!(n, len);
        assert_eq!(&buf[..n], &payload[..]);
    }

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn short_buffer_truncates() {
    let server = Facility::init(test_config("trunc", 8)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");

    server.send(qid, b"0123456789").expect("send");
    server.send(qid, b"after").expect("send");

    let mut small = [0u8; 4];
    assert_eq!(server.receive(qid, &mut small).expect("receive"), 4);
    assert_eq!(&small, b"0123");

    // The truncated tail is gone; the next message is intact.
    let mut buf = [0u8; 64];
    let n = server.receive(qid, &mut buf).expect("receive");
    assert_eq!(&buf[..n], b"after");

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn length_bounds_enforced() {
    let server = Facility::init(test_config("len", 8)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");

    assert!(matches!(server.send(qid, &[]), Err(Error::BadLength(0))));
    let oversize = vec![0u8; MAX_DATALEN + 1];
    assert!(matches!(
        server.send(qid, &oversize),
        Err(Error::BadLength(_))
    ));

    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}

// A record that can never fit the queue body fails immediately instead of
// blocking forever.
#[test]
fn oversized_for_body_fails_fast() {
    let server = Facility::init(test_config("oversize", 8)).expect("init");
    server.create_queue("tiny", 1).expect("create"); // 1 KiB body
    let qid = server.open("tiny").expect("open");

    assert!(matches!(
        server.send(qid, &[0u8; 1021]),
        Err(Error::OutOfSpace)
    ));
    // The largest record that does fit goes through.
    server.send(qid, &[0u8; 1020]).expect("send exact fit");
    let mut buf = vec![0u8; 1024];
    assert_eq!(server.receive(qid, &mut buf).expect("receive"), 1020);

    server.close(qid).expect("close");
    server.remove_queue("tiny").expect("remove");
    server.destroy().expect("destroy");
}

#[test]
fn stale_qid_reports_not_found() {
    let server = Facility::init(test_config("stale", 8)).expect("init");
    server.create_queue("mq1", 16).expect("create");
    let qid = server.open("mq1").expect("open");
    server.send(qid, b"x").expect("send");
    server.close(qid).expect("close");
    server.remove_queue("mq1").expect("remove");

    let mut buf = [0u8; 8];
    assert!(matches!(server.send(qid, b"x"), Err(Error::NotFound)));
    assert!(matches!(
        server.receive(qid, &mut buf),
        Err(Error::NotFound)
    ));

    server.destroy().expect("destroy");
}

// A full queue never interferes with traffic on a different queue.
#[test]
fn queues_are_independent() {
    let server = Facility::init(test_config("indep", 2)).expect("init");
    server.create_queue("full", 4).expect("create full");
    server.create_queue("other", 4).expect("create other");
    let full = server.open("full").expect("open full");
    let other = server.open("other").expect("open other");

    server.send(full, b"a").expect("send");
    server.send(full, b"b").expect("send"); // queue "full" is now at its cap

    // Traffic on "other" proceeds without any blocking.
    let mut buf = [0u8; 16];
    for i in 0..8u8 {
        server.send(other, &[i; 3]).expect("send other");
        let n = server.receive(other, &mut buf).expect("receive other");
        assert_eq!(&buf[..n], &[i; 3]);
    }

    for qid in [full, other] {
        server.close(qid).expect("close");
    }
    let n = server.receive(full, &mut buf).expect("drain");
    assert_eq!(&buf[..n], b"a");
    let n = server.receive(full, &mut buf).expect("drain");
    assert_eq!(&buf[..n], b"b");
    server.remove_queue("full").expect("remove");
    server.remove_queue("other").expect("remove");
    server.destroy().expect("destroy");
}

// A successful send is observable through a different attached handle.
#[test]
fn send_visible_across_handles() {
    let cfg = test_config("shared", 8);
    let server = Facility::init(cfg.clone()).expect("init");
    server.create_queue("mq1", 16).expect("create");

    let sender_qid = server.open("mq1").expect("open server side");
    server.send(sender_qid, b"cross-process").expect("send");

    let client = Facility::attach(cfg).expect("attach");
    let qid = client.open("mq1").expect("open client side");
    let mut buf = [0u8; 64];
    let n = client.receive(qid, &mut buf).expect("receive");
    assert_eq!(&buf[..n], b"cross-process");

    client.close(qid).expect("close");
    client.detach().expect("detach");
    server.close(sender_qid).expect("close");
    server.remove_queue("mq1").expect("remove");
    server.destroy().expect("destroy");
}
