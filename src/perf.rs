//! Lightweight timing for load, edit and save phases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Reports its lifetime to stderr on drop when timing is enabled.
#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    start: Instant,
    bytes: Option<u64>,
}

impl Scope {
    /// Record how many bytes the phase moved, for a throughput figure.
    pub const fn set_bytes(&mut self, bytes: u64) {
        self.bytes = Some(bytes);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
        eprintln!("[perf] {}", report(self.name, self.elapsed(), self.bytes));
    }
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn scope(name: &'static str) -> Scope {
    Scope {
        name,
        start: Instant::now(),
        bytes: None,
    }
}

fn report(name: &str, elapsed: Duration, bytes: Option<u64>) -> String {
    let ms = elapsed.as_secs_f64() * 1000.0;
    match bytes {
        Some(bytes) if elapsed > Duration::ZERO => {
            let mib_s = bytes as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64();
            format!("{name}: {ms:.2} ms ({bytes} bytes, {mib_s:.1} MiB/s)")
        }
        Some(bytes) => format!("{name}: {ms:.2} ms ({bytes} bytes)"),
        None => format!("{name}: {ms:.2} ms"),
    }
}
