//! Audio engine: owns the synth backend and voice bookkeeping.
//!
//! The engine lives on the audio control thread. Schedulers hand it
//! semantic operations (play this step at this clock time); it turns them
//! into backend voice spawns and keeps enough state to crossfade and stop
//! them later.

pub mod backend;
mod cpal_backend;
mod voices;

use solfa_types::DeviceStatus;

use self::backend::SynthBackend;
use self::voices::VoiceTracker;
use crate::devices::AudioConfig;

/// How far ahead of the audio clock the schedulers plan voices. Jitter in
/// the control loop stays inaudible as long as it never exceeds this.
pub const SCHEDULE_LOOKAHEAD_SECS: f64 = 0.1;

/// Lead given to a freshly (re)anchored scheduler so its first event is not
/// already in the past by the time the render thread picks it up.
pub const SCHEDULE_MARGIN_SECS: f64 = 0.015;

pub struct AudioEngine {
    backend: Option<Box<dyn SynthBackend>>,
    status: DeviceStatus,
    voices: VoiceTracker,
}

impl AudioEngine {
    pub fn new() -> Self {
        Self {
            backend: None,
            status: DeviceStatus::Stopped,
            voices: VoiceTracker::new(),
        }
    }

    /// Open the output device described by `config` and start rendering.
    pub fn start(&mut self, config: &AudioConfig) -> Result<(), String> {
        if self.backend.is_some() {
            self.shutdown();
        }
        self.status = DeviceStatus::Starting;
        match cpal_backend::CpalBackend::start(config) {
            Ok(backend) => {
                self.install_backend(Box::new(backend));
                Ok(())
            }
            Err(e) => {
                self.status = DeviceStatus::Error;
                Err(e.to_string())
            }
        }
    }

    /// Install a running backend (the cpal stream, or a mock in tests).
    pub fn install_backend(&mut self, backend: Box<dyn SynthBackend>) {
        self.backend = Some(backend);
        self.status = DeviceStatus::Running;
    }

    /// Fade out all voices and drop the backend, closing the stream.
    pub fn shutdown(&mut self) {
        self.stop_all_voices();
        self.backend = None;
        self.status = DeviceStatus::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.backend.is_some()
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Current time on the backend's audio clock; 0.0 with no device up.
    pub fn clock_now(&self) -> f64 {
        self.backend.as_ref().map_or(0.0, |b| b.clock_now())
    }

    /// Output sample rate, if a device is running.
    pub fn sample_rate(&self) -> Option<f64> {
        self.backend.as_ref().map(|b| b.sample_rate())
    }

    /// Take the latest render-side error, if any, marking the engine errored.
    pub fn poll_error(&mut self) -> Option<String> {
        let error = self.backend.as_ref().and_then(|b| b.take_error());
        if error.is_some() {
            self.status = DeviceStatus::Error;
        }
        error
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
