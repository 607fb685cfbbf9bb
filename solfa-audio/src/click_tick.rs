//! Click track (metronome) tick logic.
//!
//! Schedules synthesized click sounds on beat boundaries while the active
//! mode's player is running, on the same look-ahead grid the players use.

use solfa_types::ClickSettings;

use crate::engine::{AudioEngine, SCHEDULE_LOOKAHEAD_SECS, SCHEDULE_MARGIN_SECS};
use crate::playback::PlayerState;

/// Beats per click bar. The accent pattern repeats over this span.
const CLICK_BEATS_PER_BAR: u32 = 4;

/// Grid cursor for the click track.
///
/// Follows the active player's tempo but keeps its own anchor, so the click
/// stays on quarter-note beats no matter which subdivision the player
/// schedules on.
#[derive(Debug)]
pub(crate) struct ClickTicker {
    /// Engine-clock time of the next unscheduled beat.
    next_secs: f64,
    /// Beat within the click bar; drives accents.
    beat: u32,
}

impl ClickTicker {
    pub fn new() -> Self {
        ClickTicker {
            next_secs: 0.0,
            beat: 0,
        }
    }

    /// Restart the beat cycle from `anchor`, accenting the first beat.
    /// Called when the transport starts and when the click is switched on
    /// or handed to a different mode mid-play.
    pub fn rewind(&mut self, anchor: f64) {
        self.next_secs = anchor;
        self.beat = 0;
    }
}

/// Schedule every click beat that falls inside the lookahead window.
///
/// The beat interval is read live from the player's settings, so tempo
/// changes reach the click on its next beat just as they reach the player
/// on its next tick.
pub(crate) fn tick_click(
    click: &mut ClickTicker,
    settings: &ClickSettings,
    player: &PlayerState,
    engine: &mut AudioEngine,
) {
    if !settings.enabled || !player.settings.playing {
        return;
    }

    let now = engine.clock_now();
    let horizon = now + SCHEDULE_LOOKAHEAD_SECS;

    if click.next_secs < now {
        click.next_secs = now + SCHEDULE_MARGIN_SECS;
    }

    while click.next_secs < horizon {
        let interval = player.settings.seconds_per_beat();
        let accent = click.beat % 2 == 0;
        if let Err(e) = engine.play_click(accent, click.next_secs, settings.gain()) {
            log::warn!(target: "audio::click", "failed to schedule click: {}", e);
        }
        click.beat = (click.beat + 1) % CLICK_BEATS_PER_BAR;
        click.next_secs += interval;
    }
}
