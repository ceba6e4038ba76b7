// Real-time pacing and cancellation for the run loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep, so a stop request is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(5);
/// Below this, spin instead of sleeping (sleep granularity is ~1ms).
const SPIN_THRESHOLD: Duration = Duration::from_micros(1500);

/// Shared stop request. Cloned into the signal handler; checked by the
/// monitor once per instruction.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for code that can only hold an `AtomicBool`
    /// (signal handlers).
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Converts consumed CPU cycles into wall-clock delay.
///
/// Time is tracked against a deadline rather than per instruction, so
/// sleep overshoot on one step is absorbed by the next ones.
pub struct Pacer {
    ns_per_cycle: f64,
    deadline: Option<Instant>,
}

impl Pacer {
    pub fn new(clock_hz: f64, realtime: bool) -> Self {
        let ns_per_cycle = if realtime && clock_hz > 0.0 {
            1e9 / clock_hz
        } else {
            0.0
        };
        Self {
            ns_per_cycle,
            deadline: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.ns_per_cycle > 0.0
    }

    pub fn ns_per_cycle(&self) -> f64 {
        self.ns_per_cycle
    }

    /// Forget accumulated time. Called when the machine starts running
    /// after a halt, so time spent at the prompt isn't "caught up".
    pub fn restart(&mut self) {
        self.deadline = None;
    }

    /// Account for `cycles` and wait until they are due. Returns early if
    /// `stop` is requested; that is not an error.
    pub fn pace(&mut self, cycles: u32, stop: &StopToken) {
        if !self.enabled() {
            return;
        }
        let delay = Duration::from_nanos((cycles as f64 * self.ns_per_cycle) as u64);
        let now = Instant::now();
        let deadline = self.deadline.map_or(now, |d| d.max(now)) + delay;
        self.deadline = Some(deadline);
        wait_until(deadline, stop);
    }
}

/// Sleep in slices for the bulk, spin the final stretch.
fn wait_until(deadline: Instant, stop: &StopToken) {
    loop {
        if stop.is_requested() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining <= SPIN_THRESHOLD {
            break;
        }
        thread::sleep((remaining - Duration::from_millis(1)).min(SLEEP_SLICE));
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}
