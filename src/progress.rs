//! # Progress: Atomic Search Progress Counters
//!
//! Thread-safe progress tracking shared between the coordinator and the
//! background status reporter. Counters are atomics updated as work units
//! complete; a Mutex guards only the label of the most recently dispatched
//! unit (written once per unit, read once per report).
//!
//! ## Background Reporter
//!
//! A dedicated thread logs progress every 30 seconds: completed units,
//! polynomials tested, polynomials found, test rate and the current unit.
//! Shuts down via the `shutdown` atomic flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const REPORT_INTERVAL: Duration = Duration::from_secs(30);
/// Shutdown latency of the reporter thread.
const TICK: Duration = Duration::from_millis(250);

pub struct Progress {
    pub units: AtomicU64,
    pub tested: AtomicU64,
    pub found: AtomicU64,
    pub current: Mutex<String>,
    start: Instant,
    shutdown: AtomicBool,
}

impl Progress {
    pub fn new() -> Arc<Self> {
        Arc::new(Progress {
            units: AtomicU64::new(0),
            tested: AtomicU64::new(0),
            found: AtomicU64::new(0),
            current: Mutex::new(String::new()),
            start: Instant::now(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn start_reporter(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let progress = Arc::clone(self);
        thread::spawn(move || {
            let mut last = Instant::now();
            while !progress.shutdown.load(Ordering::Relaxed) {
                thread::sleep(TICK);
                if last.elapsed() >= REPORT_INTERVAL {
                    progress.print_status();
                    last = Instant::now();
                }
            }
        })
    }

    pub fn set_current(&self, label: String) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = label;
    }

    pub fn current(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn print_status(&self) {
        let elapsed = self.start.elapsed();
        let units = self.units.load(Ordering::Relaxed);
        let tested = self.tested.load(Ordering::Relaxed);
        let found = self.found.load(Ordering::Relaxed);
        let current = self.current();
        let rate = if elapsed.as_secs() > 0 {
            tested as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let h = elapsed.as_secs() / 3600;
        let m = (elapsed.as_secs() % 3600) / 60;
        let s = elapsed.as_secs() % 60;
        info!(
            current = %current,
            units,
            tested,
            rate = format_args!("{:.2}", rate),
            found,
            elapsed = format_args!("{:02}:{:02}:{:02}", h, m, s),
            "search progress"
        );
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Initialization ──────────────────────────────────────────────

    /// Counters start at zero and no unit has been dispatched.
    #[test]
    fn counters_start_at_zero() {
        let p = Progress::new();
        assert_eq!(p.units.load(Ordering::Relaxed), 0);
        assert_eq!(p.tested.load(Ordering::Relaxed), 0);
        assert_eq!(p.found.load(Ordering::Relaxed), 0);
        assert_eq!(p.current(), "");
    }

    // ── Updates ─────────────────────────────────────────────────────

    #[test]
    fn current_label_updates() {
        let p = Progress::new();
        p.set_current("unit 7 [0, 1, -3]".to_string());
        assert_eq!(p.current(), "unit 7 [0, 1, -3]");
    }

    /// Worker results arrive on the coordinator thread, but the counters
    /// must stay exact if several threads ever report at once.
    #[test]
    fn concurrent_increments_are_accurate() {
        let p = Progress::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        p.tested.fetch_add(1, Ordering::Relaxed);
                        p.units.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(p.tested.load(Ordering::Relaxed), 8000);
        assert_eq!(p.units.load(Ordering::Relaxed), 8000);
    }

    /// A panic while holding the label lock must not take the reporter
    /// down with it.
    #[test]
    fn poisoned_label_is_still_readable() {
        let p = Progress::new();
        let p2 = Arc::clone(&p);
        let _ = thread::spawn(move || {
            let _guard = p2.current.lock().unwrap();
            panic!("poison");
        })
        .join();
        p.set_current("after".to_string());
        assert_eq!(p.current(), "after");
        p.print_status();
    }

    // ── Shutdown ────────────────────────────────────────────────────

    #[test]
    fn stop_is_visible_across_threads() {
        let p = Progress::new();
        let p2 = Arc::clone(&p);
        let handle = thread::spawn(move || {
            while !p2.shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
            true
        });
        thread::sleep(Duration::from_millis(10));
        p.stop();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn reporter_exits_promptly_after_stop() {
        let p = Progress::new();
        let handle = p.start_reporter();
        p.stop();
        let started = Instant::now();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// Rate computation must not divide by zero right after creation.
    #[test]
    fn print_status_with_zero_elapsed() {
        let p = Progress::new();
        p.print_status();
    }
}
