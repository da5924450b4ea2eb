//! Debounced flow-sensor pulse counter shared between the GPIO ISR and the
//! sampling task.
//!
//! The ISR is the only writer of the count and the last-pulse timestamp.
//! The sampling task reads the count with a single atomic swap, so a pulse
//! landing mid-sample is either in this window or the next one, never lost
//! and never counted twice.
//!
//! Timestamps are wrapping `u32` microseconds; `wrapping_sub` keeps the
//! debounce correct across the ~71 minute wrap.  Xtensa has no 64-bit
//! atomics, hence the narrow type.

use core::sync::atomic::{AtomicU32, Ordering};

/// Default minimum spacing between accepted edges (µs).
pub const DEFAULT_DEBOUNCE_US: u32 = 1_000;

pub struct PulseCounter {
    count: AtomicU32,
    last_pulse_us: AtomicU32,
    debounce_us: AtomicU32,
}

impl PulseCounter {
    pub const fn new(debounce_us: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            last_pulse_us: AtomicU32::new(0),
            debounce_us: AtomicU32::new(debounce_us),
        }
    }

    /// Register an edge seen at `now_us`.  Returns `true` if it was counted.
    ///
    /// Lock-free and bounded; safe to call from interrupt context.
    pub fn on_edge(&self, now_us: u32) -> bool {
        let last = self.last_pulse_us.load(Ordering::Relaxed);
        if now_us.wrapping_sub(last) <= self.debounce_us.load(Ordering::Relaxed) {
            return false;
        }
        self.last_pulse_us.store(now_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
        true
    }

    /// Atomically read and reset the pulse count.
    pub fn take(&self) -> u32 {
        self.count.swap(0, Ordering::Acquire)
    }

    /// Pulses accumulated since the last [`take`](Self::take).
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Timestamp of the last accepted edge (µs).
    pub fn last_pulse_us(&self) -> u32 {
        self.last_pulse_us.load(Ordering::Relaxed)
    }

    /// Change the debounce interval (boot-time configuration).
    pub fn set_debounce_us(&self, debounce_us: u32) {
        self.debounce_us.store(debounce_us, Ordering::Relaxed);
    }
}

/// Counter fed by the flow-sensor GPIO ISR.
/// `static` because ISR callbacks in ESP-IDF cannot capture closures.
pub static FLOW_PULSES: PulseCounter = PulseCounter::new(DEFAULT_DEBOUNCE_US);

/// Called from the GPIO ISR on each rising edge of the flow sensor.
pub fn flow_isr_handler(now_us: u32) {
    FLOW_PULSES.on_edge(now_us);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_spaced_edges() {
        let c = PulseCounter::new(1_000);
        assert!(c.on_edge(10_000));
        assert!(c.on_edge(12_000));
        assert!(c.on_edge(14_000));
        assert_eq!(c.take(), 3);
        assert_eq!(c.take(), 0);
    }

    #[test]
    fn rejects_bounce_inside_interval() {
        let c = PulseCounter::new(1_000);
        assert!(c.on_edge(10_000));
        assert!(!c.on_edge(10_300));
        assert!(!c.on_edge(11_000));
        assert!(c.on_edge(11_001));
        assert_eq!(c.take(), 2);
        assert_eq!(c.last_pulse_us(), 11_001);
    }

    #[test]
    fn debounce_survives_timestamp_wrap() {
        let c = PulseCounter::new(1_000);
        assert!(c.on_edge(u32::MAX - 100));
        // 400 µs later, across the wrap.
        assert!(!c.on_edge(299));
        assert!(c.on_edge(1_500));
        assert_eq!(c.take(), 2);
    }
}
