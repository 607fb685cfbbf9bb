//! Main-thread handle to the audio subsystem.
//!
//! Owns the command channels into the audio thread and a cache of the
//! feedback it has seen, so UI code can poll playback state without
//! blocking on the audio thread.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use solfa_types::{
    AudioFeedback, ClickSettings, DeviceStatus, Note, PracticeMode, SequenceStep, Subdivision,
    Timbre, Voicing,
};

use crate::audio_thread::AudioThread;
use crate::commands::AudioCmd;
use crate::devices::AudioConfig;

pub struct AudioHandle {
    /// Priority commands: transport, live parameter changes (time-critical)
    priority_tx: Sender<AudioCmd>,
    /// Normal commands: sequence swaps, device lifecycle
    normal_tx: Sender<AudioCmd>,
    feedback_rx: Receiver<AudioFeedback>,
    playing: [bool; PracticeMode::COUNT],
    step_indices: [usize; PracticeMode::COUNT],
    device_status: DeviceStatus,
    device_message: String,
    avg_tick_us: u32,
    max_tick_us: u32,
    p95_tick_us: u32,
    overruns: u64,
    join_handle: Option<JoinHandle<()>>,
}

impl AudioHandle {
    /// Spawn the audio thread and start the device described by `config`.
    pub fn new(config: AudioConfig) -> Self {
        let (priority_tx, priority_rx) = crossbeam_channel::unbounded();
        let (normal_tx, normal_rx) = crossbeam_channel::unbounded();
        let (feedback_tx, feedback_rx) = crossbeam_channel::unbounded();

        let join_handle = thread::spawn(move || {
            let thread = AudioThread::new(priority_rx, normal_rx, feedback_tx, config);
            thread.run();
        });

        Self {
            priority_tx,
            normal_tx,
            feedback_rx,
            playing: [false; PracticeMode::COUNT],
            step_indices: [0; PracticeMode::COUNT],
            device_status: DeviceStatus::default(),
            device_message: String::new(),
            avg_tick_us: 0,
            max_tick_us: 0,
            p95_tick_us: 0,
            overruns: 0,
            join_handle: Some(join_handle),
        }
    }

    fn send_cmd(&self, cmd: AudioCmd) -> Result<(), String> {
        let tx = if cmd.is_priority() {
            &self.priority_tx
        } else {
            &self.normal_tx
        };
        tx.send(cmd).map_err(|_| "Audio thread disconnected".to_string())
    }

    fn send(&self, cmd: AudioCmd) {
        if let Err(e) = self.send_cmd(cmd) {
            log::warn!(target: "audio", "Command dropped: {}", e);
        }
    }

    /// Pull all pending feedback, folding it into the cached state. Call
    /// once per UI frame.
    pub fn drain_feedback(&mut self) -> Vec<AudioFeedback> {
        let mut out = Vec::new();
        while let Ok(msg) = self.feedback_rx.try_recv() {
            self.apply_feedback(&msg);
            out.push(msg);
        }
        out
    }

    fn apply_feedback(&mut self, feedback: &AudioFeedback) {
        match feedback {
            AudioFeedback::PlayingChanged { mode, playing } => {
                self.playing[mode.index()] = *playing;
                if !*playing {
                    self.step_indices[mode.index()] = 0;
                }
            }
            AudioFeedback::StepBegan { mode, index } => {
                self.step_indices[mode.index()] = *index;
            }
            AudioFeedback::DeviceStatus { status, message } => {
                self.device_status = *status;
                self.device_message = message.clone();
            }
            AudioFeedback::TelemetrySummary {
                avg_tick_us,
                max_tick_us,
                p95_tick_us,
                overruns,
            } => {
                self.avg_tick_us = *avg_tick_us;
                self.max_tick_us = *max_tick_us;
                self.p95_tick_us = *p95_tick_us;
                self.overruns = *overruns;
            }
        }
    }

    pub fn set_playing(&mut self, mode: PracticeMode, playing: bool) {
        self.send(AudioCmd::SetPlaying { mode, playing });
    }

    /// Flip playback for one mode based on the last reported state.
    pub fn toggle_playing(&mut self, mode: PracticeMode) {
        let playing = !self.playing[mode.index()];
        self.set_playing(mode, playing);
    }

    pub fn stop_all(&mut self) {
        self.send(AudioCmd::StopAll);
    }

    pub fn set_bpm(&mut self, mode: PracticeMode, bpm: f32) {
        self.send(AudioCmd::SetBpm { mode, bpm });
    }

    pub fn set_subdivision(&mut self, mode: PracticeMode, subdivision: Subdivision) {
        self.send(AudioCmd::SetSubdivision { mode, subdivision });
    }

    pub fn set_swing(&mut self, mode: PracticeMode, swing: bool) {
        self.send(AudioCmd::SetSwing { mode, swing });
    }

    pub fn set_volume(&mut self, mode: PracticeMode, volume: u8) {
        self.send(AudioCmd::SetVolume { mode, volume });
    }

    pub fn set_voicing(&mut self, mode: PracticeMode, voicing: Voicing) {
        self.send(AudioCmd::SetVoicing { mode, voicing });
    }

    pub fn set_sequence(&mut self, mode: PracticeMode, steps: Vec<SequenceStep>) {
        self.send(AudioCmd::SetSequence { mode, steps });
    }

    pub fn set_active_mode(&mut self, mode: PracticeMode) {
        self.send(AudioCmd::SetActiveMode { mode });
    }

    pub fn set_timbre(&mut self, timbre: Timbre) {
        self.send(AudioCmd::SetTimbre { timbre });
    }

    pub fn set_click(&mut self, settings: ClickSettings) {
        self.send(AudioCmd::SetClick { settings });
    }

    pub fn preview_note(&mut self, note: Note) {
        self.send(AudioCmd::PreviewNote { note });
    }

    pub fn restart_device(&mut self, config: AudioConfig) {
        self.send(AudioCmd::RestartDevice { config });
    }

    // ── State accessors ───────────────────────────────────────────

    pub fn is_playing(&self, mode: PracticeMode) -> bool {
        self.playing[mode.index()]
    }

    pub fn any_playing(&self) -> bool {
        self.playing.iter().any(|p| *p)
    }

    /// Step the given mode's player most recently announced.
    pub fn step_index(&self, mode: PracticeMode) -> usize {
        self.step_indices[mode.index()]
    }

    pub fn device_status(&self) -> DeviceStatus {
        self.device_status
    }

    pub fn device_message(&self) -> &str {
        &self.device_message
    }

    /// Last telemetry summary: (avg, max, p95) tick µs and total overruns.
    pub fn tick_stats(&self) -> (u32, u32, u32, u64) {
        (self.avg_tick_us, self.max_tick_us, self.p95_tick_us, self.overruns)
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        let _ = self.send_cmd(AudioCmd::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for AudioHandle {
    fn default() -> Self {
        Self::new(AudioConfig::default())
    }
}
