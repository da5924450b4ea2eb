//! Fixed-capacity moving average.
//!
//! Thin wrapper over [`heapless::HistoryBuffer`]: pushing into a full
//! buffer overwrites the oldest sample.  No allocation.

use heapless::HistoryBuffer;

pub struct RingAverage<const N: usize> {
    buf: HistoryBuffer<f32, N>,
}

impl<const N: usize> RingAverage<N> {
    pub const fn new() -> Self {
        Self {
            buf: HistoryBuffer::new(),
        }
    }

    /// Insert a sample.  Returns the evicted sample when the buffer was full.
    pub fn push(&mut self, sample: f32) -> Option<f32> {
        let evicted = if self.buf.len() == N {
            self.buf.oldest_ordered().next().copied()
        } else {
            None
        };
        self.buf.write(sample);
        evicted
    }

    /// Arithmetic mean of the stored samples; `0.0` when empty.
    pub fn mean(&self) -> f32 {
        let filled = self.buf.as_slice();
        if filled.is_empty() {
            return 0.0;
        }
        filled.iter().sum::<f32>() / filled.len() as f32
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == N
    }
}

impl<const N: usize> Default for RingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_buffer_averages_filled_slots() {
        let mut r: RingAverage<5> = RingAverage::new();
        assert_eq!(r.mean(), 0.0);
        r.push(2.0);
        r.push(4.0);
        assert_eq!(r.len(), 2);
        assert!((r.mean() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn sixth_insert_evicts_oldest() {
        let mut r: RingAverage<5> = RingAverage::new();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            assert_eq!(r.push(v), None);
        }
        assert!(r.is_full());
        assert!((r.mean() - 3.0).abs() < 1e-6);

        assert_eq!(r.push(11.0), Some(1.0));
        assert_eq!(r.len(), 5);
        // (2 + 3 + 4 + 5 + 11) / 5
        assert!((r.mean() - 5.0).abs() < 1e-6);
    }
}
