//! Scheduler tick telemetry for jitter monitoring.
//!
//! Collects tick durations into a fixed ring buffer, allocation-free so it
//! can run inside the audio control loop.

use std::time::Duration;

/// Number of tick samples kept for percentile math.
const WINDOW: usize = 256;

/// Rolling tick-duration statistics for the audio control thread.
///
/// Summaries are drained about once per second and forwarded to the UI as
/// `AudioFeedback::TelemetrySummary`.
pub struct TickTelemetry {
    /// Ring buffer of tick durations in microseconds
    samples_us: [u32; WINDOW],
    /// Next write slot in the ring
    next_slot: usize,
    /// Samples collected so far (saturates at WINDOW)
    filled: usize,
    /// Max tick duration in the current window
    max_us: u32,
    /// Cumulative count of ticks that ran past their budget
    overruns: u64,
}

impl TickTelemetry {
    pub fn new() -> Self {
        Self {
            samples_us: [0; WINDOW],
            next_slot: 0,
            filled: 0,
            max_us: 0,
            overruns: 0,
        }
    }

    /// Record one tick. `budget_us` is the nominal tick interval; anything
    /// longer counts as an overrun.
    #[inline]
    pub fn record(&mut self, duration: Duration, budget_us: u32) {
        let us = duration.as_micros().min(u32::MAX as u128) as u32;

        self.samples_us[self.next_slot] = us;
        self.next_slot = (self.next_slot + 1) % WINDOW;
        self.filled = (self.filled + 1).min(WINDOW);

        if us > self.max_us {
            self.max_us = us;
        }
        if us > budget_us {
            self.overruns += 1;
        }
    }

    /// Drain a summary as `(avg_us, max_us, p95_us, overruns)`.
    ///
    /// Resets the max watermark for the next window; the overrun count is
    /// cumulative for the lifetime of the thread.
    pub fn take_summary(&mut self) -> (u32, u32, u32, u64) {
        if self.filled == 0 {
            return (0, 0, 0, self.overruns);
        }

        let sum: u64 = self.samples_us[..self.filled].iter().map(|&x| x as u64).sum();
        let avg = (sum / self.filled as u64) as u32;

        let mut sorted = self.samples_us;
        sorted[..self.filled].sort_unstable();
        let p95_idx = ((self.filled * 95 / 100).max(1) - 1).min(self.filled - 1);
        let p95 = sorted[p95_idx];

        let max = self.max_us;
        self.max_us = 0;

        (avg, max, p95, self.overruns)
    }
}

impl Default for TickTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
