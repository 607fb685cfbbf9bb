//! Synth backend trait: a semantic-level abstraction over tone generation.
//!
//! `SynthBackend` captures what the engine *means* to do (start a tone at a
//! clock time, fade a voice out, silence a group) independently of how it's
//! done (mixing samples into a cpal output stream). This enables unit testing
//! of scheduling logic without opening an audio device.
//!
//! The trait is deliberately not `Send`: the cpal stream handle is bound to
//! the thread that built it, and the backend lives its whole life on the
//! audio control thread.

use std::fmt;

use solfa_types::{PracticeMode, Timbre};

/// Result type for backend operations.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Error from a backend operation.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Identifier for a single voice, unique for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Group tag for bulk operations (stop everything a player scheduled,
/// stop the metronome, retrigger the preview voice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceTag {
    /// Scheduled by the sequence player for this mode.
    Player(PracticeMode),
    /// Metronome click.
    Click,
    /// One-shot note preview (keyboard/mouse audition).
    Preview,
}

/// Everything the backend needs to sound one tone.
///
/// `start_secs` is on the backend's own clock (see [`SynthBackend::clock_now`]);
/// a value in the past starts the tone immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    pub id: VoiceId,
    pub tag: VoiceTag,
    /// Onset time in seconds on the backend clock.
    pub start_secs: f64,
    pub freq_hz: f64,
    /// Envelope length from onset to the decay floor.
    pub duration_secs: f64,
    pub timbre: Timbre,
    /// Peak amplitude in `0.0..=1.0`.
    pub gain: f32,
    /// Linear fade-in length. Zero means the synth's default attack.
    pub attack_secs: f64,
}

/// Semantic-level synth backend trait.
///
/// Each method represents a meaningful audio operation. Implementations
/// translate these into render-thread commands (cpal) or record them for
/// testing.
pub trait SynthBackend {
    /// Current time in seconds on the backend's monotonic audio clock.
    ///
    /// Derived from frames rendered so far, never from the wall clock, so it
    /// cannot drift against what the listener hears.
    fn clock_now(&self) -> f64;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> f64;

    /// Schedule one tone. The backend owns the voice from here; the caller
    /// keeps only the `VoiceId` for later release.
    fn spawn(&self, spec: VoiceSpec) -> BackendResult;

    /// Fade a single voice out from its current level over `fade_secs`.
    /// Unknown ids are a no-op.
    fn release(&self, id: VoiceId, fade_secs: f64) -> BackendResult;

    /// Drop every not-yet-started voice with this tag and fade every
    /// sounding one over `fade_secs`.
    fn stop_tag(&self, tag: VoiceTag, fade_secs: f64) -> BackendResult;

    /// `stop_tag` across all tags.
    fn stop_all(&self, fade_secs: f64) -> BackendResult;

    /// Take the latest render-thread error, if one occurred since the last
    /// call. Returns None for test backends.
    fn take_error(&self) -> Option<String> {
        None
    }
}

// ─── Mock Backend ───────────────────────────────────────────────────

use std::sync::{Arc, Mutex};

/// An operation recorded by `MockBackend` for assertion in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOp {
    Spawned(VoiceSpec),
    Released { id: VoiceId, fade_secs: f64 },
    StoppedTag { tag: VoiceTag, fade_secs: f64 },
    StoppedAll { fade_secs: f64 },
}

/// A test backend that records all operations into a vector for assertions
/// and exposes a manually-advanced clock. All operations succeed. Uses
/// `Mutex` for interior mutability so the backend can be shared as
/// `Arc<MockBackend>` between the engine and the test body.
pub struct MockBackend {
    clock_secs: Mutex<f64>,
    ops: Mutex<Vec<MockOp>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            clock_secs: Mutex::new(0.0),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Set the mock clock to an absolute time.
    pub fn set_clock(&self, secs: f64) {
        *self.clock_secs.lock().unwrap() = secs;
    }

    /// Advance the mock clock.
    pub fn advance_clock(&self, secs: f64) {
        *self.clock_secs.lock().unwrap() += secs;
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<MockOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&MockOp) -> bool>(&self, f: F) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| f(op)).count()
    }

    /// Find the first operation matching a predicate.
    pub fn find<F: Fn(&MockOp) -> bool>(&self, f: F) -> Option<MockOp> {
        self.ops.lock().unwrap().iter().find(|op| f(op)).cloned()
    }

    /// Return all spawned voice specs in schedule order.
    pub fn spawned(&self) -> Vec<VoiceSpec> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                MockOp::Spawned(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    /// Return the onset times of all spawned voices in schedule order.
    pub fn spawn_times(&self) -> Vec<f64> {
        self.spawned().iter().map(|s| s.start_secs).collect()
    }

    /// Return all released voice ids.
    pub fn released(&self) -> Vec<VoiceId> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                MockOp::Released { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl SynthBackend for MockBackend {
    fn clock_now(&self) -> f64 {
        *self.clock_secs.lock().unwrap()
    }

    fn sample_rate(&self) -> f64 {
        48_000.0
    }

    fn spawn(&self, spec: VoiceSpec) -> BackendResult {
        self.ops.lock().unwrap().push(MockOp::Spawned(spec));
        Ok(())
    }

    fn release(&self, id: VoiceId, fade_secs: f64) -> BackendResult {
        self.ops
            .lock()
            .unwrap()
            .push(MockOp::Released { id, fade_secs });
        Ok(())
    }

    fn stop_tag(&self, tag: VoiceTag, fade_secs: f64) -> BackendResult {
        self.ops
            .lock()
            .unwrap()
            .push(MockOp::StoppedTag { tag, fade_secs });
        Ok(())
    }

    fn stop_all(&self, fade_secs: f64) -> BackendResult {
        self.ops
            .lock()
            .unwrap()
            .push(MockOp::StoppedAll { fade_secs });
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `Arc<MockBackend>` to implement `SynthBackend` so the engine can
/// own a `Box<dyn SynthBackend>` while tests retain an `Arc` for assertions
/// and clock control.
pub struct SharedMockBackend(pub Arc<MockBackend>);

impl SynthBackend for SharedMockBackend {
    fn clock_now(&self) -> f64 {
        self.0.clock_now()
    }
    fn sample_rate(&self) -> f64 {
        self.0.sample_rate()
    }
    fn spawn(&self, spec: VoiceSpec) -> BackendResult {
        self.0.spawn(spec)
    }
    fn release(&self, id: VoiceId, fade_secs: f64) -> BackendResult {
        self.0.release(id, fade_secs)
    }
    fn stop_tag(&self, tag: VoiceTag, fade_secs: f64) -> BackendResult {
        self.0.stop_tag(tag, fade_secs)
    }
    fn stop_all(&self, fade_secs: f64) -> BackendResult {
        self.0.stop_all(fade_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_starts_at_zero_and_advances() {
        let backend = MockBackend::new();
        assert_eq!(backend.clock_now(), 0.0);
        backend.advance_clock(0.25);
        backend.advance_clock(0.25);
        assert_eq!(backend.clock_now(), 0.5);
        backend.set_clock(10.0);
        assert_eq!(backend.clock_now(), 10.0);
    }

    #[test]
    fn mock_records_operations_in_order() {
        let backend = MockBackend::new();
        let spec = VoiceSpec {
            id: VoiceId(1),
            tag: VoiceTag::Preview,
            start_secs: 0.1,
            freq_hz: 440.0,
            duration_secs: 1.0,
            timbre: Timbre::Sine,
            gain: 0.8,
            attack_secs: 0.0,
        };
        backend.spawn(spec.clone()).unwrap();
        backend.release(VoiceId(1), 0.05).unwrap();
        backend.stop_tag(VoiceTag::Click, 0.03).unwrap();
        backend.stop_all(0.03).unwrap();

        let ops = backend.operations();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], MockOp::Spawned(spec));
        assert_eq!(
            ops[1],
            MockOp::Released {
                id: VoiceId(1),
                fade_secs: 0.05
            }
        );
        assert!(matches!(ops[3], MockOp::StoppedAll { .. }));
    }

    #[test]
    fn mock_query_helpers() {
        let backend = MockBackend::new();
        for i in 0..3 {
            backend
                .spawn(VoiceSpec {
                    id: VoiceId(i),
                    tag: VoiceTag::Player(PracticeMode::Random),
                    start_secs: i as f64 * 0.5,
                    freq_hz: 440.0,
                    duration_secs: 0.5,
                    timbre: Timbre::Piano,
                    gain: 0.8,
                    attack_secs: 0.0,
                })
                .unwrap();
        }
        backend.release(VoiceId(1), 0.03).unwrap();

        assert_eq!(backend.spawned().len(), 3);
        assert_eq!(backend.spawn_times(), vec![0.0, 0.5, 1.0]);
        assert_eq!(backend.released(), vec![VoiceId(1)]);
        assert_eq!(
            backend.count(|op| matches!(op, MockOp::Spawned(_))),
            3
        );
        backend.clear();
        assert!(backend.operations().is_empty());
    }

    #[test]
    fn voice_id_display() {
        assert_eq!(VoiceId(7).to_string(), "v7");
    }

    #[test]
    fn backend_error_display() {
        let err = BackendError("device lost".to_string());
        assert_eq!(err.to_string(), "device lost");
        let from_string: BackendError = "stream closed".to_string().into();
        assert_eq!(from_string.0, "stream closed");
    }
}
