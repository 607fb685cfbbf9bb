//! Audio-related types shared across crates.

use serde::{Deserialize, Serialize};

use crate::PracticeMode;

/// Output device status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Error,
}

impl DeviceStatus {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceStatus::Stopped => "Stopped",
            DeviceStatus::Starting => "Starting",
            DeviceStatus::Running => "Running",
            DeviceStatus::Error => "Error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, DeviceStatus::Running)
    }
}

/// Feedback messages from the audio thread to the main thread.
#[derive(Debug, Clone)]
pub enum AudioFeedback {
    PlayingChanged {
        mode: PracticeMode,
        playing: bool,
    },
    /// A new sequence step began sounding (sent at schedule time, up to one
    /// lookahead window early).
    StepBegan {
        mode: PracticeMode,
        index: usize,
    },
    DeviceStatus {
        status: DeviceStatus,
        message: String,
    },
    /// Periodic telemetry summary from the audio thread.
    TelemetrySummary {
        /// Average tick duration in microseconds
        avg_tick_us: u32,
        /// Maximum tick duration in the window
        max_tick_us: u32,
        /// 95th percentile tick duration
        p95_tick_us: u32,
        /// Cumulative count of ticks exceeding budget
        overruns: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_status_default_is_stopped() {
        assert_eq!(DeviceStatus::default(), DeviceStatus::Stopped);
        assert!(!DeviceStatus::default().is_running());
    }

    #[test]
    fn device_status_running() {
        assert!(DeviceStatus::Running.is_running());
        assert_eq!(DeviceStatus::Running.name(), "Running");
    }
}
