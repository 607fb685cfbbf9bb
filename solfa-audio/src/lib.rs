//! # solfa-audio
//!
//! Real-time scheduling and synthesis for the practice engine. UI code
//! holds an [`AudioHandle`]; a dedicated audio thread owns the output
//! stream and walks each practice mode's look-ahead scheduler against the
//! device clock. Commands cross on priority/normal channels, feedback
//! comes back on a third.

pub mod audio_thread;
pub mod click_tick;
pub mod commands;
pub mod devices;
pub mod engine;
pub mod handle;
pub mod playback;
pub mod synth;
pub mod telemetry;

pub use commands::AudioCmd;
pub use devices::{load_config, output_device_names, save_config, AudioConfig, BufferSize};
pub use engine::backend::{BackendError, BackendResult, SynthBackend, VoiceId, VoiceSpec, VoiceTag};
pub use engine::{AudioEngine, SCHEDULE_LOOKAHEAD_SECS};
pub use handle::AudioHandle;
pub use solfa_types::{AudioFeedback, DeviceStatus};
