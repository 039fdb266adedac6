// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Long-running facility server: initializes the shared segment, then waits.
// SIGINT / SIGHUP / SIGTERM tear the deployment down via destroy.
//
// Usage:
//   mfserver [config-path]     (default: mf.cfg)

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libmf::{Config, Facility};

static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: libc::c_int) {
    QUIT.store(true, Ordering::Release);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGHUP, on_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as *const () as libc::sighandler_t);
    }
}

fn main() {
    tracing_subscriber::fmt().init();
    install_signal_handlers();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(libmf::config::DEFAULT_CONFIG_PATH);

    let cfg = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("mfserver: {e}");
            std::process::exit(1);
        }
    };

    let facility = match Facility::init(cfg) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("mfserver: init failed: {e}");
            std::process::exit(1);
        }
    };

    println!("mfserver pid={} (signal to shut down)", std::process::id());

    while !QUIT.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(200));
    }

    println!("mfserver: caught signal, destroying facility");
    if let Err(e) = facility.destroy() {
        eprintln!("mfserver: destroy failed: {e}");
        std::process::exit(1);
    }
    println!("mfserver terminated");
}
