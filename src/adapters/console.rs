//! Serial console: one JSON message per line into [`PumpService`].
//!
//! A failing read (the UART VFS returns `EAGAIN` when no console is
//! attached) backs off before retrying, from [`Backoff::MIN`] doubling to
//! [`Backoff::MAX`], and resets after the next good line.

use std::io::BufRead;
use std::time::Duration;

use log::{info, warn};

use crate::app::service::PumpService;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub const MIN: Duration = Duration::from_millis(10);
    pub const MAX: Duration = Duration::from_secs(1);

    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            next: min,
        }
    }

    /// Delay to wait now; the following one doubles, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.min;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::MIN, Self::MAX)
    }
}

/// Serve until `reader` reaches end of input.  Returns the number of
/// read errors seen.
pub fn serve(reader: impl BufRead, service: &PumpService, mut backoff: Backoff) -> u32 {
    let mut errors = 0u32;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                let delay = backoff.next_delay();
                if errors == 0 || delay == backoff.max {
                    warn!("console: read failed: {}, retrying in {:?}", e, delay);
                }
                errors = errors.saturating_add(1);
                std::thread::sleep(delay);
                continue;
            }
        };
        backoff.reset();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match service.handle_message(line.as_bytes()) {
            Ok(()) => info!("console: ok"),
            Err(e) => warn!("console: {}", e),
        }
    }
    errors
}
