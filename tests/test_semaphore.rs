// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named-semaphore behavior tests.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use libmf::NamedSemaphore;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/mf_sem_{prefix}_{}_{n}", std::process::id())
}

#[test]
fn create_with_initial_count() {
    let name = unique_name("initial");
    let sem = NamedSemaphore::create_fresh(&name, 3).expect("create");

    for _ in 0..3 {
        assert!(sem.wait(Some(10)).expect("wait"));
    }
    assert!(!sem.wait(Some(10)).expect("wait timeout"));
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn wait_post_roundtrip() {
    let name = unique_name("wait_post");
    let sem = NamedSemaphore::create_fresh(&name, 1).expect("create");

    assert!(sem.wait(None).expect("wait"));
    sem.post(1).expect("post");
    assert!(sem.try_wait().expect("try_wait"));
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn post_multiple_tokens() {
    let name = unique_name("post_multi");
    let sem = NamedSemaphore::create_fresh(&name, 0).expect("create");

    sem.post(5).expect("post 5");
    for _ in 0..5 {
        assert!(sem.wait(Some(10)).expect("wait"));
    }
    assert!(!sem.wait(Some(10)).expect("wait empty"));
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn wait_timeout_elapses() {
    let name = unique_name("timeout");
    let sem = NamedSemaphore::create_fresh(&name, 0).expect("create");

    let start = Instant::now();
    let waited = sem.wait(Some(50)).expect("wait");
    let elapsed = start.elapsed();

    assert!(!waited, "should time out");
    assert!(
        elapsed.as_millis() >= 40,
        "should have waited ~50ms, got {}ms",
        elapsed.as_millis()
    );
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn open_missing_fails() {
    let name = unique_name("missing");
    NamedSemaphore::unlink_by_name(&name);
    assert!(NamedSemaphore::open(&name).is_err());
}

#[test]
fn open_shares_kernel_object() {
    let name = unique_name("sharing");
    let value = Arc::new(AtomicI32::new(0));
    let _holder = NamedSemaphore::create_fresh(&name, 0).expect("create");

    let name1 = name.clone();
    let val1 = Arc::clone(&value);
    let waiter = thread::spawn(move || {
        let sem = NamedSemaphore::open(&name1).expect("open waiter");
        sem.wait(None).expect("wait");
        val1.store(100, Ordering::SeqCst);
    });

    let name2 = name.clone();
    let poster = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let sem = NamedSemaphore::open(&name2).expect("open poster");
        sem.post(1).expect("post");
    });

    waiter.join().unwrap();
    poster.join().unwrap();
    assert_eq!(value.load(Ordering::SeqCst), 100);
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn blocked_wait_is_woken_by_post() {
    let name = unique_name("wake");
    let sem = Arc::new(NamedSemaphore::create_fresh(&name, 0).expect("create"));
    let started = Arc::new(AtomicBool::new(false));
    let woken = Arc::new(AtomicBool::new(false));

    let sem2 = Arc::clone(&sem);
    let s2 = Arc::clone(&started);
    let w2 = Arc::clone(&woken);
    let waiter = thread::spawn(move || {
        s2.store(true, Ordering::SeqCst);
        let ok = sem2.wait(None).expect("wait");
        w2.store(ok, Ordering::SeqCst);
    });

    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(50));
    sem.post(1).expect("post");

    waiter.join().unwrap();
    assert!(woken.load(Ordering::SeqCst));
    NamedSemaphore::unlink_by_name(&name);
}

#[test]
fn create_fresh_resets_stale_object() {
    let name = unique_name("stale");
    {
        let sem = NamedSemaphore::create_fresh(&name, 0).expect("create");
        sem.post(7).expect("post");
    }
    // A crashed peer would leave the tokens behind; create_fresh must not.
    let sem = NamedSemaphore::create_fresh(&name, 0).expect("recreate");
    assert!(!sem.wait(Some(10)).expect("wait"));
    NamedSemaphore::unlink_by_name(&name);
}
