//! cpal-backed synth output: opens the output stream, hands the render-side
//! mixer to its callback, and implements [`SynthBackend`] on top of a
//! command channel into that callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{Sender, TrySendError};

use crate::devices::AudioConfig;
use crate::synth::{Mixer, RenderCmd};

use super::backend::{BackendError, BackendResult, SynthBackend, VoiceId, VoiceSpec, VoiceTag};

/// Render-command queue depth. Deep enough for a full lookahead window of
/// chord spawns plus their releases.
const RENDER_QUEUE_CAP: usize = 256;

/// Synth backend rendering through a cpal output stream.
///
/// The stream handle is not `Send`, which is why the backend (and the
/// engine that owns it) lives its whole life on the audio control thread.
/// Time is derived from frames rendered so far, shared with the callback
/// through an atomic counter, so the clock can never drift against what the
/// listener hears.
pub struct CpalBackend {
    cmd_tx: Sender<RenderCmd>,
    clock_frames: Arc<AtomicU64>,
    sample_rate: f64,
    error: Arc<Mutex<Option<String>>>,
    _stream: cpal::Stream,
}

impl CpalBackend {
    /// Open the configured output device and start the render stream.
    pub fn start(config: &AudioConfig) -> Result<CpalBackend, BackendError> {
        let host = cpal::default_host();

        let device = match &config.output_device {
            Some(name) => host
                .output_devices()
                .map_err(|e| BackendError(format!("Failed to enumerate output devices: {}", e)))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| BackendError(format!("Output device not found: {}", name)))?,
            None => host
                .default_output_device()
                .ok_or_else(|| BackendError("No default output device".to_string()))?,
        };

        let default_config = device
            .default_output_config()
            .map_err(|e| BackendError(format!("Failed to get output config: {}", e)))?;
        let channels = default_config.channels() as usize;

        let mut stream_config: StreamConfig = default_config.into();
        stream_config.buffer_size = cpal::BufferSize::Fixed(config.buffer_size.as_samples());
        if config.sample_rate > 0 {
            stream_config.sample_rate = cpal::SampleRate(config.sample_rate);
        }
        let sample_rate = stream_config.sample_rate.0 as f64;

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(RENDER_QUEUE_CAP);
        let clock_frames = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(sample_rate, channels, cmd_rx, Arc::clone(&clock_frames));

        let error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let error_slot = Arc::clone(&error);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.process(data);
                },
                move |err| {
                    log::error!(target: "audio", "Audio output error: {}", err);
                    if let Ok(mut slot) = error_slot.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| BackendError(format!("Failed to build output stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| BackendError(format!("Failed to start output stream: {}", e)))?;

        log::info!(
            target: "audio",
            "Output stream running: {} Hz, {} ch, {} frame buffer",
            sample_rate,
            channels,
            config.buffer_size.as_samples()
        );

        Ok(CpalBackend {
            cmd_tx,
            clock_frames,
            sample_rate,
            error,
            _stream: stream,
        })
    }

    /// Non-blocking push into the render queue. The control thread must
    /// never wait on the render thread.
    fn send(&self, cmd: RenderCmd) -> BackendResult {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => BackendError("Render queue full".to_string()),
            TrySendError::Disconnected(_) => BackendError("Render thread disconnected".to_string()),
        })
    }
}

impl SynthBackend for CpalBackend {
    fn clock_now(&self) -> f64 {
        self.clock_frames.load(Ordering::Relaxed) as f64 / self.sample_rate
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn spawn(&self, spec: VoiceSpec) -> BackendResult {
        self.send(RenderCmd::Spawn(spec))
    }

    fn release(&self, id: VoiceId, fade_secs: f64) -> BackendResult {
        self.send(RenderCmd::Release { id, fade_secs })
    }

    fn stop_tag(&self, tag: VoiceTag, fade_secs: f64) -> BackendResult {
        self.send(RenderCmd::StopTag { tag, fade_secs })
    }

    fn stop_all(&self, fade_secs: f64) -> BackendResult {
        self.send(RenderCmd::StopAll { fade_secs })
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|mut slot| slot.take())
    }
}
