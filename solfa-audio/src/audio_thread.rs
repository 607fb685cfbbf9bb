//! The audio control thread: owns the engine, runs the command loop, and
//! drives the per-mode schedulers.
//!
//! Commands arrive on two channels so transport and live parameter changes
//! (priority) are never stuck behind sequence swaps or device restarts
//! (normal). The loop ticks every 0.5ms, walking each player's look-ahead
//! scheduler and the click track against the device clock.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use solfa_types::{
    AudioFeedback, ClickSettings, DeviceStatus, Note, PracticeMode, SequenceStep, Timbre,
};

use crate::click_tick::{tick_click, ClickTicker};
use crate::commands::AudioCmd;
use crate::devices::AudioConfig;
use crate::engine::{AudioEngine, SCHEDULE_MARGIN_SECS};
use crate::playback::{tick_playback, PlayerState};
use crate::telemetry::TickTelemetry;

pub(crate) struct AudioThread {
    engine: AudioEngine,
    /// Priority commands: transport, live parameter changes (time-critical)
    priority_rx: Receiver<AudioCmd>,
    /// Normal commands: sequence swaps, device lifecycle
    normal_rx: Receiver<AudioCmd>,
    feedback_tx: Sender<AudioFeedback>,
    config: AudioConfig,
    /// One independent sequence player per practice mode.
    players: [PlayerState; PracticeMode::COUNT],
    /// Mode the UI currently shows; the click follows this player's tempo
    /// and previews borrow its volume.
    active_mode: PracticeMode,
    timbre: Timbre,
    /// Last previewed note, retriggered when the timbre changes mid-ring.
    last_preview: Option<Note>,
    click_settings: ClickSettings,
    click: ClickTicker,
    last_tick: Instant,
    /// Telemetry collector for tick duration metrics
    telemetry: TickTelemetry,
    /// Last time telemetry was emitted
    last_telemetry_emit: Instant,
    /// Last time voice cleanup was performed (rate-limited to reduce overhead)
    last_voice_cleanup: Instant,
}

impl AudioThread {
    pub(crate) fn new(
        priority_rx: Receiver<AudioCmd>,
        normal_rx: Receiver<AudioCmd>,
        feedback_tx: Sender<AudioFeedback>,
        config: AudioConfig,
    ) -> Self {
        Self {
            engine: AudioEngine::new(),
            priority_rx,
            normal_rx,
            feedback_tx,
            config,
            players: [
                PlayerState::new(PracticeMode::Random),
                PlayerState::new(PracticeMode::Progressions),
                PlayerState::new(PracticeMode::Patterns),
            ],
            active_mode: PracticeMode::Random,
            timbre: Timbre::default(),
            last_preview: None,
            click_settings: ClickSettings::default(),
            click: ClickTicker::new(),
            last_tick: Instant::now(),
            telemetry: TickTelemetry::new(),
            last_telemetry_emit: Instant::now(),
            last_voice_cleanup: Instant::now(),
        }
    }

    pub(crate) fn run(mut self) {
        // 0.5ms tick interval keeps scheduling jitter small next to the
        // 15ms anchor margin.
        const TICK_INTERVAL: Duration = Duration::from_micros(500);

        self.start_device();

        loop {
            // Use crossbeam select to prioritize time-critical commands.
            // Priority channel is always checked first before normal channel.
            let remaining = TICK_INTERVAL.saturating_sub(self.last_tick.elapsed());

            crossbeam_channel::select! {
                // Priority commands (transport, param changes) - always handled first
                recv(self.priority_rx) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => break, // Disconnected
                    }
                }
                // Normal commands - handled when no priority commands pending
                recv(self.normal_rx) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => break, // Disconnected
                    }
                }
                // Timeout - proceed with tick
                default(remaining) => {}
            }

            // Drain any additional priority commands first (critical path)
            if self.drain_priority_commands() {
                break;
            }
            // Then drain normal commands
            if self.drain_normal_commands() {
                break;
            }

            let now = Instant::now();
            let elapsed = now.duration_since(self.last_tick);
            if elapsed >= TICK_INTERVAL {
                self.last_tick = now;

                // Record tick timing for telemetry
                let tick_start = Instant::now();
                self.tick();
                self.telemetry
                    .record(tick_start.elapsed(), TICK_INTERVAL.as_micros() as u32);
            }

            self.poll_engine();
        }

        self.engine.shutdown();
        log::info!(target: "audio", "Audio thread exiting");
    }

    /// Drain priority commands first (transport, param changes)
    /// Uses time-budgeted draining: stops when time budget OR count limit is reached
    fn drain_priority_commands(&mut self) -> bool {
        const MAX_DURATION: Duration = Duration::from_micros(200);
        const MAX_COUNT: usize = 128;

        let start = Instant::now();
        for _ in 0..MAX_COUNT {
            // Check time budget before processing each command
            if start.elapsed() >= MAX_DURATION {
                break;
            }
            match self.priority_rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    /// Drain normal commands (sequence swaps, device lifecycle)
    /// Uses time-budgeted draining: stops when time budget OR count limit is reached
    fn drain_normal_commands(&mut self) -> bool {
        const MAX_DURATION: Duration = Duration::from_micros(100);
        const MAX_COUNT: usize = 64;

        let start = Instant::now();
        for _ in 0..MAX_COUNT {
            if start.elapsed() >= MAX_DURATION {
                break;
            }
            match self.normal_rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    /// Handle a command. Returns true if the thread should exit.
    fn handle_cmd(&mut self, cmd: AudioCmd) -> bool {
        match cmd {
            AudioCmd::SetPlaying { mode, playing } => self.set_playing(mode, playing),
            AudioCmd::StopAll => self.stop_all(),
            AudioCmd::SetBpm { mode, bpm } => self.players[mode.index()].settings.set_bpm(bpm),
            AudioCmd::SetSubdivision { mode, subdivision } => {
                self.players[mode.index()].settings.subdivision = subdivision;
            }
            AudioCmd::SetSwing { mode, swing } => {
                self.players[mode.index()].settings.swing = swing;
            }
            AudioCmd::SetVolume { mode, volume } => {
                self.players[mode.index()].settings.set_volume(volume);
            }
            AudioCmd::SetVoicing { mode, voicing } => {
                self.players[mode.index()].voicing = voicing;
            }
            AudioCmd::SetSequence { mode, steps } => self.set_sequence(mode, steps),
            AudioCmd::SetActiveMode { mode } => self.set_active_mode(mode),
            AudioCmd::SetTimbre { timbre } => self.set_timbre(timbre),
            AudioCmd::SetClick { settings } => self.set_click(settings),
            AudioCmd::PreviewNote { note } => self.preview_note(note),
            AudioCmd::RestartDevice { config } => self.restart_device(config),
            AudioCmd::Shutdown => return true,
        }
        false
    }

    fn set_playing(&mut self, mode: PracticeMode, playing: bool) {
        let now = self.engine.clock_now();
        let player = &mut self.players[mode.index()];
        if playing {
            player.settings.playing = true;
            player.reset_cursor();
            player.next_tick_secs = now + SCHEDULE_MARGIN_SECS;
            // Line the click's downbeat up with the first onset.
            if mode == self.active_mode {
                self.click.rewind(now + SCHEDULE_MARGIN_SECS);
            }
        } else {
            player.settings.playing = false;
            player.reset_cursor();
            self.engine.stop_player(mode);
            // The click follows this player; silence it with the player
            // rather than letting queued clicks ring on.
            if mode == self.active_mode {
                self.engine.stop_click();
            }
        }
        let _ = self
            .feedback_tx
            .send(AudioFeedback::PlayingChanged { mode, playing });
    }

    fn stop_all(&mut self) {
        for player in self.players.iter_mut() {
            if player.settings.playing {
                player.settings.playing = false;
                let _ = self.feedback_tx.send(AudioFeedback::PlayingChanged {
                    mode: player.mode,
                    playing: false,
                });
            }
            player.reset_cursor();
        }
        self.engine.stop_all_voices();
    }

    fn set_sequence(&mut self, mode: PracticeMode, steps: Vec<SequenceStep>) {
        let player = &mut self.players[mode.index()];
        player.steps = steps;
        // The cursor may point past the end of a shorter sequence.
        if player.step_index >= player.steps.len() {
            player.step_index = 0;
            player.ticks_into_step = 0;
        }
    }

    fn set_active_mode(&mut self, mode: PracticeMode) {
        if mode == self.active_mode {
            return;
        }
        self.active_mode = mode;
        // The click now follows a different player's grid; clicks queued on
        // the old grid must not bleed into it.
        self.engine.stop_click();
        self.click
            .rewind(self.engine.clock_now() + SCHEDULE_MARGIN_SECS);
    }

    fn set_click(&mut self, settings: ClickSettings) {
        let was_enabled = self.click_settings.enabled;
        self.click_settings = settings;
        if self.click_settings.enabled && !was_enabled {
            self.click
                .rewind(self.engine.clock_now() + SCHEDULE_MARGIN_SECS);
        } else if !self.click_settings.enabled && was_enabled {
            self.engine.stop_click();
        }
    }

    fn set_timbre(&mut self, timbre: Timbre) {
        self.timbre = timbre;
        // Let the user hear the change: crossfade a still-ringing preview
        // into the new timbre instead of waiting for the next trigger.
        if self.engine.preview_active() {
            if let Some(note) = self.last_preview {
                self.preview_note(note);
            }
        }
    }

    fn preview_note(&mut self, note: Note) {
        self.last_preview = Some(note);
        let gain = self.players[self.active_mode.index()].settings.gain();
        if let Err(e) = self.engine.preview_note(note, self.timbre, gain) {
            log::warn!(target: "audio", "Preview failed: {}", e);
        }
    }

    fn restart_device(&mut self, config: AudioConfig) {
        log::info!(target: "audio", "Restarting audio device");
        self.engine.shutdown();
        self.config = config;
        self.start_device();

        // The device clock restarted from zero; every grid anchor is now in
        // the future and must be pulled back or playback would stall.
        let anchor = self.engine.clock_now() + SCHEDULE_MARGIN_SECS;
        for player in self.players.iter_mut() {
            player.next_tick_secs = anchor;
        }
        self.click.rewind(anchor);
    }

    /// Advance every player's scheduler and the click track.
    fn tick(&mut self) {
        if !self.engine.is_running() {
            return;
        }
        for player in self.players.iter_mut() {
            tick_playback(player, &mut self.engine, self.timbre, &self.feedback_tx);
        }
        let active = &self.players[self.active_mode.index()];
        tick_click(&mut self.click, &self.click_settings, active, &mut self.engine);
    }

    fn poll_engine(&mut self) {
        if let Some(message) = self.engine.poll_error() {
            log::error!(target: "audio", "Audio device error: {}", message);
            self.send_device_status(DeviceStatus::Error, message);
        }

        // Rate-limit voice cleanup to every 100ms
        if self.last_voice_cleanup.elapsed() >= Duration::from_millis(100) {
            self.last_voice_cleanup = Instant::now();
            self.engine.cleanup_expired_voices();
        }

        // Emit telemetry summary every 1s
        if self.last_telemetry_emit.elapsed() >= Duration::from_secs(1) {
            self.last_telemetry_emit = Instant::now();
            let (avg_tick_us, max_tick_us, p95_tick_us, overruns) = self.telemetry.take_summary();
            let _ = self.feedback_tx.send(AudioFeedback::TelemetrySummary {
                avg_tick_us,
                max_tick_us,
                p95_tick_us,
                overruns,
            });
        }
    }

    fn start_device(&mut self) {
        self.send_device_status(DeviceStatus::Starting, "Starting audio device");
        match self.engine.start(&self.config) {
            Ok(()) => {
                let latency = self
                    .config
                    .buffer_size
                    .latency_ms(self.config.sample_rate);
                self.send_device_status(
                    DeviceStatus::Running,
                    format!("Audio running ({:.1} ms buffer)", latency),
                );
            }
            Err(e) => {
                log::error!(target: "audio", "Failed to start audio device: {}", e);
                self.send_device_status(DeviceStatus::Error, e);
            }
        }
    }

    fn send_device_status(&self, status: DeviceStatus, message: impl Into<String>) {
        let _ = self.feedback_tx.send(AudioFeedback::DeviceStatus {
            status,
            message: message.into(),
        });
    }
}
