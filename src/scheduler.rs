//! Fixed-period cadence engine for the control task.
//!
//! The control task wakes every millisecond and polls a [`Cadence`].  Each
//! slot that has come due is handed to a [`SchedulerDelegate`], in slot
//! order, so the sampling slot (acquisition, safety, outer loop) always
//! completes before the inner slot consumes its output in the same tick.
//!
//! ```text
//!  t(ms)   0    1    2  …  9   10   11 …
//!  Sample  ●                    ●
//!  Inner   ●    ●    ●  …  ●    ●    ●
//! ```
//!
//! A slot that falls more than one period behind (the task was starved)
//! fires once and is re-phased to `now`; the missed periods are counted as
//! overruns, never replayed.  The warning is logged each time the overrun
//! total crosses a power of two.

use crate::app::ports::{SchedulerDelegate, SlotKind};
use log::warn;

/// One periodic slot.
#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: SlotKind,
    period_ms: u32,
    next_due_ms: u32,
}

/// Maximum number of slots (stack-allocated).
const MAX_SLOTS: usize = 2;

pub struct Cadence {
    slots: [Slot; MAX_SLOTS],
    started: bool,
    overruns: u32,
    reports: u32,
}

/// Going from `before` to `after` passed a power of two.
fn crosses_power_of_two(before: u32, after: u32) -> bool {
    after > before && (before == 0 || before.ilog2() != after.ilog2())
}

/// `now` is at or after `due` on the wrapping millisecond clock.
fn reached(now: u32, due: u32) -> bool {
    (now.wrapping_sub(due) as i32) >= 0
}

impl Cadence {
    pub fn new(sample_period_ms: u32, inner_period_ms: u32) -> Self {
        Self {
            slots: [
                Slot {
                    kind: SlotKind::Sample,
                    period_ms: sample_period_ms.max(1),
                    next_due_ms: 0,
                },
                Slot {
                    kind: SlotKind::Inner,
                    period_ms: inner_period_ms.max(1),
                    next_due_ms: 0,
                },
            ],
            started: false,
            overruns: 0,
            reports: 0,
        }
    }

    /// Fire every due slot.  Returns how many fired.
    pub fn poll(&mut self, now_ms: u32, delegate: &mut impl SchedulerDelegate) -> usize {
        if !self.started {
            for slot in &mut self.slots {
                slot.next_due_ms = now_ms;
            }
            self.started = true;
        }

        let mut fired = 0;
        for slot in &mut self.slots {
            if !reached(now_ms, slot.next_due_ms) {
                continue;
            }
            delegate.on_slot_due(slot.kind, now_ms);
            fired += 1;

            slot.next_due_ms = slot.next_due_ms.wrapping_add(slot.period_ms);
            if reached(now_ms, slot.next_due_ms) {
                let behind = now_ms.wrapping_sub(slot.next_due_ms) / slot.period_ms + 1;
                let total = self.overruns.saturating_add(behind);
                if crosses_power_of_two(self.overruns, total) {
                    self.reports += 1;
                    warn!(
                        "sched: {:?} slot overran by {} period(s), re-phasing ({} total)",
                        slot.kind, behind, total
                    );
                }
                self.overruns = total;
                slot.next_due_ms = now_ms.wrapping_add(slot.period_ms);
            }
        }
        fired
    }

    /// Periods skipped because the task was late.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}
