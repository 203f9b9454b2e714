//! A single polyphonic voice: one [`Generator`] paired with an optional
//! [`Envelope`].

use crate::envelope::Envelope;
use crate::frame::StereoFrame;
use crate::generator::{Generator, VoiceState};

/// Binds a tone source to its (optional) amplitude envelope and tracks the
/// bookkeeping the scheduler needs to allocate, retrigger, and steal
/// voices: whether it is currently sounding, which note it last played,
/// and the sample indices of its last `NOTE_ON`/`NOTE_OFF`.
#[derive(Clone)]
pub struct Voice<G: Generator, E: Envelope> {
    generator: G,
    envelope: Option<E>,
    running: bool,
    current_note_id: Option<u64>,
    last_on_index: u64,
    last_off_index: u64,
}

impl<G: Generator, E: Envelope> Voice<G, E> {
    pub fn new(generator: G, envelope: Option<E>) -> Self {
        Self {
            generator,
            envelope,
            running: false,
            current_note_id: None,
            last_on_index: 0,
            last_off_index: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_note_id(&self) -> Option<u64> {
        self.current_note_id
    }

    pub fn last_on_index(&self) -> u64 {
        self.last_on_index
    }

    pub fn last_off_index(&self) -> u64 {
        self.last_off_index
    }

    pub fn has_envelope(&self) -> bool {
        self.envelope.is_some()
    }

    /// `true` while the voice's envelope is in its release segment (always
    /// `false` for envelope-less voices — they have no sustained tail to
    /// prefer stealing).
    pub fn is_releasing(&self) -> bool {
        self.envelope
            .as_ref()
            .map(|e| e.stage() == crate::envelope::EnvelopeStage::Release)
            .unwrap_or(false)
    }

    /// Begin a new note.
    ///
    /// * `reset_generator` — hard-reset the generator's internal clock
    ///   (phase, history) back to its initial conditions.
    /// * `reset_envelope` — hard-reset the envelope to `Idle`/`0.0` before
    ///   triggering, rather than continuing from its current value.
    /// * `trigger_envelope` — call `note_on` on the envelope at all. Set to
    ///   `false` only by callers that want the generator restarted but the
    ///   envelope left exactly where it is (not part of the standard
    ///   retrigger modes, but kept available for the same reason the
    ///   Python original exposes the three flags independently).
    pub fn note_on(
        &mut self,
        note_id: u64,
        state: G::State,
        sample_index: u64,
        reset_generator: bool,
        reset_envelope: bool,
        trigger_envelope: bool,
    ) {
        self.generator.set_state(state);
        if reset_generator {
            self.generator.reset();
        }
        if let Some(envelope) = self.envelope.as_mut() {
            if reset_envelope {
                envelope.reset();
            }
            if trigger_envelope {
                envelope.note_on();
            }
        }
        self.running = true;
        self.current_note_id = Some(note_id);
        self.last_on_index = sample_index;
    }

    pub fn note_off(&mut self, sample_index: u64) {
        if let Some(envelope) = self.envelope.as_mut() {
            envelope.note_off();
        }
        self.last_off_index = sample_index;
        if self.envelope.is_none() {
            // No envelope to carry a tail: the voice stops the instant it
            // is released.
            self.running = false;
        }
    }

    /// Render `n` frames. If the voice's envelope reaches `Idle` partway
    /// through this call, the voice marks itself as no longer running —
    /// the caller is expected to check [`Voice::is_running`] afterwards
    /// and reclaim the voice on its next allocation pass.
    pub fn process(&mut self, n: usize) -> Vec<StereoFrame> {
        let frames = self.generator.process(n);
        match self.envelope.as_mut() {
            Some(envelope) => {
                let levels = envelope.generate(n);
                let out: Vec<StereoFrame> =
                    frames.into_iter().zip(levels.into_iter()).map(|(f, l)| f.scale(l)).collect();
                if envelope.stage() == crate::envelope::EnvelopeStage::Idle {
                    self.running = false;
                }
                out
            }
            None => frames,
        }
    }
}
