//! The `Generator` contract: the engine's seam for pluggable tone sources.
//!
//! A generator owns no knowledge of scheduling, envelopes, or voice
//! allocation. It only knows how to turn a [`VoiceState`] into stereo
//! samples, sample by sample, and how to reset its own internal clock.

use crate::frame::StereoFrame;

/// Per-voice parameters a [`Generator`] is driven with (pitch, timbre
/// parameters, whatever a concrete generator needs). Implementors only need
/// a stable identity for the note they represent.
pub trait VoiceState: Clone {
    /// Identifies the musical note/pitch-class this state represents, used
    /// by the scheduler to find retrigger matches. Two `NOTE_ON`s with the
    /// same `note_id` are considered the same note for retriggering.
    fn note_id(&self) -> u64;
}

/// A cloneable, resettable, stateful audio source.
///
/// # Purity
///
/// For any split `a + b = n`, a generator must produce identical output
/// whether driven with one call to `process(n)` or two calls
/// `process(a)` followed by `process(b)`: the split itself must not affect
/// the samples produced. This is what lets the scheduler interrupt a
/// generator mid-block to service an event without audible discontinuity
/// beyond what the event itself causes.
pub trait Generator: Clone {
    type State: VoiceState;

    /// Assign new per-voice parameters without resetting the generator's
    /// internal clock (e.g. phase). Used for soft retriggers.
    fn set_state(&mut self, state: Self::State);

    /// Reset all internal state (phase, history) to the generator's initial
    /// conditions. Used for hard retriggers and fresh voice allocation.
    fn reset(&mut self);

    /// Produce `n` stereo frames, advancing internal state by `n` samples.
    fn process(&mut self, n: usize) -> Vec<StereoFrame>;
}
